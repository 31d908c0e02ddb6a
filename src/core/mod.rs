// Domain-layer modules and shared errors/models
pub mod refresh {
    pub use crate::refresh::*;
}

pub mod gdp {
    pub use crate::gdp::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
