use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// The two external data providers a refresh pass depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamSource {
    Countries,
    ExchangeRates,
}

impl fmt::Display for UpstreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamSource::Countries => write!(f, "Countries API"),
            UpstreamSource::ExchangeRates => write!(f, "Exchange Rates API"),
        }
    }
}

/// Why an upstream fetch did not produce a usable response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamFailure {
    /// The configured timeout elapsed.
    Timeout,
    /// Connection, TLS or body transfer error.
    Transport(String),
    /// The source answered with a non-success status.
    Status(u16),
    /// The source answered but reported a failure in its payload.
    Rejected(String),
}

impl fmt::Display for UpstreamFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamFailure::Timeout => write!(f, "request timed out"),
            UpstreamFailure::Transport(msg) => write!(f, "transport error: {}", msg),
            UpstreamFailure::Status(code) => write!(f, "returned HTTP {}", code),
            UpstreamFailure::Rejected(msg) => write!(f, "reported failure: {}", msg),
        }
    }
}

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// Database-related errors.
    DatabaseError(sqlx::Error),
    /// No country with the given name.
    NotFound(String),
    /// An external data source could not be reached or refused the request.
    UpstreamUnavailable {
        source: UpstreamSource,
        kind: UpstreamFailure,
    },
    /// Internal server error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    pub fn upstream(source: UpstreamSource, kind: UpstreamFailure) -> Self {
        AppError::UpstreamUnavailable { source, kind }
    }

    /// Maps a reqwest failure for `source`, keeping timeouts distinguishable.
    pub fn from_upstream(source: UpstreamSource, err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            UpstreamFailure::Timeout
        } else if let Some(status) = err.status() {
            UpstreamFailure::Status(status.as_u16())
        } else {
            UpstreamFailure::Transport(err.to_string())
        };
        AppError::UpstreamUnavailable { source, kind }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::NotFound(name) => write!(f, "Country not found: {}", name),
            AppError::UpstreamUnavailable { source, kind } => {
                write!(f, "{} unavailable: {}", source, kind)
            }
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Maps each error variant to an HTTP status code and JSON body.
    ///
    /// Database and internal failures are logged here and answered with an
    /// opaque body.
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
            AppError::NotFound(name) => (
                StatusCode::NOT_FOUND,
                json!({
                    "error": "Country not found",
                    "details": format!("No country named '{}'", name),
                }),
            ),
            AppError::UpstreamUnavailable { source, kind } => {
                tracing::error!("{} unavailable: {}", source, kind);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({
                        "error": "External data source unavailable",
                        "details": format!("Could not fetch data from {}", source),
                    }),
                )
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                return (*source).into_response();
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(format!("I/O error: {}", err))
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

/// Extension for sqlx::Error to add context
impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: f(),
        })
    }
}
