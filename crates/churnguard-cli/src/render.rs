//! Turning a finished submission into terminal output

use churnguard_core::{ChurnLabel, PredictionOutcome, Violation};
use churnguard_model::{RequestState, Submission, SubmissionResult};
use serde::Serialize;

/// Machine-readable view of a submission
#[derive(Debug, Serialize)]
pub struct Report {
    pub state: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<ChurnLabel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Submission> for Report {
    fn from(submission: &Submission) -> Self {
        let (label, confidence, error) = submission
            .outcome()
            .cloned()
            .map(PredictionOutcome::into_parts)
            .unwrap_or((None, None, None));

        Self {
            state: submission.state().to_string(),
            violations: submission.violations().to_vec(),
            label,
            confidence,
            error,
        }
    }
}

pub fn render_json(submission: &Submission) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&Report::from(submission))
}

pub fn render_text(submission: &Submission) -> String {
    match &submission.result {
        SubmissionResult::Rejected(violations) => {
            let mut out = String::from("Invalid input:\n");
            for violation in violations {
                out.push_str(&format!("  - {}\n", violation));
            }
            out
        }
        SubmissionResult::Completed(PredictionOutcome::Succeeded(prediction)) => {
            let verdict = if prediction.label.is_churn() {
                "High risk: this customer is likely to churn"
            } else {
                "Loyal customer: this customer is likely to stay"
            };
            format!(
                "{}\nPrediction: {}\nConfidence: {:.2}%\n",
                verdict,
                prediction.label.index(),
                prediction.confidence * 100.0
            )
        }
        SubmissionResult::Completed(PredictionOutcome::Failed { error }) => {
            format!("Prediction failed: {}\n", error)
        }
    }
}

/// Process exit code for a finished submission
pub fn exit_code(submission: &Submission) -> u8 {
    match submission.state() {
        RequestState::Succeeded => 0,
        RequestState::Rejected => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use churnguard_core::{Field, Prediction};

    fn completed(outcome: PredictionOutcome) -> Submission {
        let last = if outcome.is_success() {
            RequestState::Succeeded
        } else {
            RequestState::Failed
        };
        Submission {
            history: vec![
                RequestState::Idle,
                RequestState::Validating,
                RequestState::Validated,
                RequestState::Inferring,
                last,
            ],
            result: SubmissionResult::Completed(outcome),
        }
    }

    #[test]
    fn test_render_churn() {
        let submission = completed(PredictionOutcome::Succeeded(Prediction {
            label: ChurnLabel::Churned,
            confidence: 0.8123,
        }));

        let text = render_text(&submission);
        assert!(text.starts_with("High risk"));
        assert!(text.contains("81.23%"));
        assert_eq!(exit_code(&submission), 0);
    }

    #[test]
    fn test_render_loyal() {
        let submission = completed(PredictionOutcome::Succeeded(Prediction {
            label: ChurnLabel::Retained,
            confidence: 0.95,
        }));

        assert!(render_text(&submission).starts_with("Loyal customer"));

        let json: serde_json::Value =
            serde_json::from_str(&render_json(&submission).unwrap()).unwrap();
        assert_eq!(json["state"], "succeeded");
        assert_eq!(json["label"], 0);
        assert_eq!(json["confidence"], 0.95);
        assert!(json.get("violations").is_none());
    }

    #[test]
    fn test_render_rejection() {
        let submission = Submission {
            history: vec![
                RequestState::Idle,
                RequestState::Validating,
                RequestState::Rejected,
            ],
            result: SubmissionResult::Rejected(vec![Violation::new(
                Field::Balance,
                "Balance (Balance) must be a finite number >= 0, got -1",
            )]),
        };

        assert!(render_text(&submission).contains("finite number >= 0"));
        assert_eq!(exit_code(&submission), 2);

        let json: serde_json::Value =
            serde_json::from_str(&render_json(&submission).unwrap()).unwrap();
        assert_eq!(json["state"], "rejected");
        assert_eq!(json["violations"][0]["field"], "Balance");
        assert!(json.get("label").is_none());
    }

    #[test]
    fn test_render_failure() {
        let submission = completed(PredictionOutcome::failed("inference error: bad row"));

        assert_eq!(
            render_text(&submission),
            "Prediction failed: inference error: bad row\n"
        );
        assert_eq!(exit_code(&submission), 1);
    }
}
