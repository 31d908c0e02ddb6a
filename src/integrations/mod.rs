//! External service integrations.

pub mod services {
    pub use crate::services::*;
}

pub mod summary_image {
    pub use crate::summary_image::*;
}
