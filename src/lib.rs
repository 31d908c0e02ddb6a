//! Country Cache API Library
//!
//! Caches country metadata from a public countries API, enriches it with
//! USD exchange rates and a GDP estimate, and serves it over HTTP together
//! with a generated summary image.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `data`: Data access layer.
//! - `integrations`: External service integrations.
//! - `config`: Configuration management.
//! - `db`: Database connection and schema.
//! - `db_storage`: Country table operations.
//! - `errors`: Error handling types.
//! - `gdp`: GDP estimator.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `refresh`: Refresh orchestration.
//! - `routes`: Router construction.
//! - `services`: Upstream API clients.
//! - `summary_image`: Summary PNG rendering.

pub mod api;
pub mod core;
pub mod data;
pub mod integrations;

pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod gdp;
pub mod handlers;
pub mod models;
pub mod refresh;
pub mod routes;
pub mod services;
pub mod summary_image;
