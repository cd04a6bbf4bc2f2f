//! Single-record churn inference
//!
//! `predict` is the boundary where pipeline failures become a
//! [`PredictionOutcome::Failed`]; it never returns a raw error.

use crate::frame::Frame;
use crate::pipeline::Pipeline;
use crate::session::Session;
use async_trait::async_trait;
use churnguard_core::{ChurnLabel, CustomerRecord, Error, Prediction, PredictionOutcome, Result};
use std::sync::Arc;
use std::time::Instant;

/// Trait for anything that turns a validated record into a prediction
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Predict churn for one record
    async fn predict(&self, record: &CustomerRecord) -> PredictionOutcome;

    /// Get the predictor name
    fn name(&self) -> &str;
}

/// Predictor backed by a loaded pipeline
pub struct PipelinePredictor {
    session: Arc<Session>,
    pipeline: Arc<Pipeline>,
}

impl PipelinePredictor {
    pub fn new(session: Arc<Session>, pipeline: Arc<Pipeline>) -> Self {
        Self { session, pipeline }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }
}

#[async_trait]
impl Predictor for PipelinePredictor {
    async fn predict(&self, record: &CustomerRecord) -> PredictionOutcome {
        let _slot = match self.session.acquire_slot().await {
            Ok(slot) => slot,
            Err(e) => return PredictionOutcome::failed(e.to_string()),
        };
        predict(&self.session, &self.pipeline, record)
    }

    fn name(&self) -> &str {
        self.pipeline.uid()
    }
}

/// Run one record through the pipeline.
///
/// Builds a single row in `CustomerRecord::COLUMNS` order, transforms it and
/// reads back the predicted class with the probability at that class's index.
pub fn predict(session: &Session, pipeline: &Pipeline, record: &CustomerRecord) -> PredictionOutcome {
    let start = Instant::now();

    match run(session, pipeline, record) {
        Ok(prediction) => {
            tracing::debug!(
                label = prediction.label.index(),
                confidence = prediction.confidence,
                latency_us = start.elapsed().as_micros() as u64,
                "Prediction complete"
            );
            PredictionOutcome::Succeeded(prediction)
        }
        Err(e) => {
            tracing::error!("Prediction failed: {}", e);
            PredictionOutcome::failed(e.to_string())
        }
    }
}

fn run(session: &Session, pipeline: &Pipeline, record: &CustomerRecord) -> Result<Prediction> {
    let input = session.create_frame(&CustomerRecord::COLUMNS, record.to_row().to_vec())?;
    let output = pipeline.transform(session, input)?;
    extract(&output, pipeline.prediction_col(), pipeline.probability_col())
}

/// Read the label and its probability from the first output row
pub fn extract(frame: &Frame, prediction_col: &str, probability_col: &str) -> Result<Prediction> {
    let row = frame
        .first()
        .ok_or_else(|| Error::inference("Pipeline returned no rows"))?;

    let class = row
        .get(prediction_col)?
        .as_f64()
        .filter(|c| c.is_finite() && c.fract() == 0.0)
        .ok_or_else(|| Error::inference(format!("'{}' is not a discrete class", prediction_col)))?;

    let label = ChurnLabel::from_class(class as i64)
        .ok_or_else(|| Error::inference(format!("Unexpected class {}", class)))?;

    let probabilities = row
        .get(probability_col)?
        .as_vector()
        .ok_or_else(|| Error::inference(format!("'{}' is not a vector", probability_col)))?;

    let confidence = *probabilities.get(label.index()).ok_or_else(|| {
        Error::inference(format!(
            "Probability vector of length {} has no entry for class {}",
            probabilities.len(),
            label.index()
        ))
    })?;

    if !(0.0..=1.0).contains(&confidence) {
        return Err(Error::inference(format!(
            "Probability {} outside [0, 1]",
            confidence
        )));
    }

    Ok(Prediction { label, confidence })
}

#[cfg(test)]
mod tests {
    use super::*;
    use churnguard_core::Value;

    fn output(prediction: Value, probability: Value) -> Frame {
        Frame::new(
            vec!["prediction".to_string(), "probability".to_string()],
            vec![vec![prediction, probability]],
        )
        .unwrap()
    }

    #[test]
    fn test_extract_reads_probability_at_label_index() {
        // Label 1 chosen with a low threshold: confidence is not the max
        let frame = output(Value::Float(1.0), Value::Vector(vec![0.7, 0.3]));
        let prediction = extract(&frame, "prediction", "probability").unwrap();
        assert_eq!(prediction.label, ChurnLabel::Churned);
        assert_eq!(prediction.confidence, 0.3);

        let frame = output(Value::Float(0.0), Value::Vector(vec![0.9, 0.1]));
        let prediction = extract(&frame, "prediction", "probability").unwrap();
        assert_eq!(prediction.label, ChurnLabel::Retained);
        assert_eq!(prediction.confidence, 0.9);
    }

    #[test]
    fn test_extract_rejects_bad_output() {
        let cases = [
            output(Value::Float(0.5), Value::Vector(vec![0.5, 0.5])),
            output(Value::Float(2.0), Value::Vector(vec![0.1, 0.2, 0.7])),
            output(Value::Float(1.0), Value::Vector(vec![1.0])),
            output(Value::Float(0.0), Value::Float(1.0)),
            output(Value::Float(0.0), Value::Vector(vec![1.5, -0.5])),
            output(Value::Str("1".into()), Value::Vector(vec![0.5, 0.5])),
        ];

        for frame in cases {
            assert!(matches!(
                extract(&frame, "prediction", "probability"),
                Err(Error::Inference(_))
            ));
        }
    }

    #[test]
    fn test_extract_requires_a_row() {
        let frame = Frame::new(vec!["prediction".to_string()], vec![]).unwrap();
        assert!(extract(&frame, "prediction", "probability").is_err());
    }

    #[test]
    fn test_extract_missing_columns() {
        let frame = output(Value::Float(1.0), Value::Vector(vec![0.2, 0.8]));
        assert!(extract(&frame, "label", "probability").is_err());
        assert!(extract(&frame, "prediction", "scores").is_err());
    }
}
