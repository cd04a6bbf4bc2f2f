//! Request service
//!
//! Drives one customer record through validation and inference, recording
//! every state the request passes through.

use crate::config::ServingConfig;
use crate::inference::{PipelinePredictor, Predictor};
use crate::model_loader;
use crate::session;
use churnguard_core::{validate, CustomerRecord, PredictionOutcome, Result, Violation};
use std::fmt;
use std::sync::Arc;

/// Lifecycle of a single prediction request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    Idle,
    Validating,
    Rejected,
    Validated,
    Inferring,
    Succeeded,
    Failed,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Rejected => "rejected",
            Self::Validated => "validated",
            Self::Inferring => "inferring",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a request ended
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionResult {
    Rejected(Vec<Violation>),
    Completed(PredictionOutcome),
}

/// A finished request with the states it went through
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub history: Vec<RequestState>,
    pub result: SubmissionResult,
}

impl Submission {
    /// Final state
    pub fn state(&self) -> RequestState {
        self.history.last().copied().unwrap_or(RequestState::Idle)
    }

    pub fn violations(&self) -> &[Violation] {
        match &self.result {
            SubmissionResult::Rejected(violations) => violations,
            SubmissionResult::Completed(_) => &[],
        }
    }

    pub fn outcome(&self) -> Option<&PredictionOutcome> {
        match &self.result {
            SubmissionResult::Rejected(_) => None,
            SubmissionResult::Completed(outcome) => Some(outcome),
        }
    }
}

/// Validates records and hands admissible ones to a predictor
#[derive(Clone)]
pub struct ChurnService {
    predictor: Arc<dyn Predictor>,
}

impl ChurnService {
    pub fn new(predictor: Arc<dyn Predictor>) -> Self {
        Self { predictor }
    }

    /// Build the production service: global session, located model, pipeline
    /// predictor. Session and load failures are returned as-is.
    pub fn bootstrap(config: &ServingConfig) -> Result<Self> {
        let session = session::get_session(&config.session)?;
        let path = model_loader::locate_model(config.model.path.as_deref());
        let pipeline = model_loader::load(&session, &path)?;
        tracing::info!(
            "Serving {} from {} on {}",
            pipeline.uid(),
            pipeline.path().display(),
            session.id()
        );

        Ok(Self::new(Arc::new(PipelinePredictor::new(session, pipeline))))
    }

    pub fn predictor_name(&self) -> &str {
        self.predictor.name()
    }

    /// Run one request to a terminal state. Rejected records never reach the
    /// predictor.
    pub async fn submit(&self, record: &CustomerRecord) -> Submission {
        let mut history = vec![RequestState::Idle, RequestState::Validating];

        let violations = validate(record);
        if !violations.is_empty() {
            tracing::warn!("Rejected record with {} violation(s)", violations.len());
            history.push(RequestState::Rejected);
            return Submission {
                history,
                result: SubmissionResult::Rejected(violations),
            };
        }

        history.push(RequestState::Validated);
        history.push(RequestState::Inferring);

        let outcome = self.predictor.predict(record).await;
        history.push(if outcome.is_success() {
            RequestState::Succeeded
        } else {
            RequestState::Failed
        });

        Submission {
            history,
            result: SubmissionResult::Completed(outcome),
        }
    }
}
