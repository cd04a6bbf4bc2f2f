//! ChurnGuard Model
//!
//! Serving path for the churn classifier.
//!
//! Components, leaves first:
//! - `env`: thread-pool environment applied before the runtime starts
//! - `session`: the process-wide compute session
//! - `model_loader`: model location and cached pipeline loading
//! - `inference`: single-record prediction with normalized failures
//! - `service`: validation plus inference for one request
//!
//! Pipelines are read from a `metadata/pipeline.json` stage description and a
//! safetensors weights file; numeric stages run on Candle tensors.

pub mod config;
pub mod env;
pub mod frame;
pub mod inference;
pub mod model_loader;
pub mod pipeline;
pub mod service;
pub mod session;
pub mod stages;

pub use config::{DeviceSpec, ModelSettings, ServingConfig, SessionConfig};
pub use frame::{Frame, Row};
pub use inference::{predict, PipelinePredictor, Predictor};
pub use model_loader::{inspect, locate_model, resolve_path, ArtifactSummary, ModelRepository};
pub use pipeline::{Pipeline, PipelineMetadata, StageSpec};
pub use service::{ChurnService, RequestState, Submission, SubmissionResult};
pub use session::{get_session, Session, SessionBuilder, SessionId};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::ServingConfig;
    pub use crate::inference::{PipelinePredictor, Predictor};
    pub use crate::model_loader::{self, ModelRepository};
    pub use crate::service::{ChurnService, RequestState, Submission};
    pub use crate::session::{get_session, Session};
}
