//! ChurnGuard Core
//!
//! Types, validation and error handling shared across ChurnGuard components.
//!
//! This crate provides:
//! - The ten-field `CustomerRecord` and its mapping to the pipeline's column order
//! - Domain validation producing every violation of a record
//! - The prediction result types and the error taxonomy

pub mod error;
pub mod types;
pub mod validation;

pub use error::{Error, MissingArtifact, Result};
pub use types::{
    ChurnLabel, CustomerRecord, Gender, Geography, Prediction, PredictionOutcome, Value,
};
pub use validation::{validate, Field, Violation};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{ChurnLabel, CustomerRecord, Gender, Geography, PredictionOutcome};
    pub use crate::validation::{validate, Violation};
}
