//! Core types for ChurnGuard

use crate::error::{Error, Result};
use crate::validation::{Field, Violation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One customer's submitted attributes
///
/// Serializes with the literal column names the trained pipeline expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomerRecord {
    pub credit_score: i32,
    pub age: i32,
    pub tenure: i32,
    pub balance: f64,
    pub num_of_products: i32,
    #[serde(with = "flag")]
    pub has_cr_card: bool,
    #[serde(with = "flag")]
    pub is_active_member: bool,
    pub estimated_salary: f64,
    pub gender: Gender,
    pub geography: Geography,
}

impl CustomerRecord {
    /// Column order of the single-row input frame.
    ///
    /// Must match the schema the pipeline was trained with; `to_row` emits
    /// values in this order.
    pub const COLUMNS: [&'static str; 10] = [
        "CreditScore",
        "Age",
        "Tenure",
        "Balance",
        "NumOfProducts",
        "HasCrCard",
        "IsActiveMember",
        "EstimatedSalary",
        "Gender",
        "Geography",
    ];

    /// Values in `COLUMNS` order, booleans as 0/1 integers
    pub fn to_row(&self) -> [Value; 10] {
        [
            Value::Int(i64::from(self.credit_score)),
            Value::Int(i64::from(self.age)),
            Value::Int(i64::from(self.tenure)),
            Value::Float(self.balance),
            Value::Int(i64::from(self.num_of_products)),
            Value::Int(i64::from(self.has_cr_card)),
            Value::Int(i64::from(self.is_active_member)),
            Value::Float(self.estimated_salary),
            Value::Str(self.gender.as_str().to_string()),
            Value::Str(self.geography.as_str().to_string()),
        ]
    }
}

impl Default for CustomerRecord {
    /// The interactive form's initial values
    fn default() -> Self {
        Self {
            credit_score: 650,
            age: 35,
            tenure: 3,
            balance: 50_000.0,
            num_of_products: 2,
            has_cr_card: true,
            is_active_member: true,
            estimated_salary: 50_000.0,
            gender: Gender::Male,
            geography: Geography::France,
        }
    }
}

/// A single cell of a structured row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Vector(Vec<f64>),
}

impl Value {
    /// Numeric view of a scalar cell
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            Self::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "double",
            Self::Str(_) => "string",
            Self::Vector(_) => "vector",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Male, Gender::Female];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::Validation(vec![Violation::new(
                    Field::Gender,
                    format!("Gender must be one of Male, Female (got '{}')", s),
                )])
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Geography {
    France,
    Germany,
    Spain,
}

impl Geography {
    pub const ALL: [Geography; 3] = [Geography::France, Geography::Germany, Geography::Spain];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::France => "France",
            Self::Germany => "Germany",
            Self::Spain => "Spain",
        }
    }
}

impl fmt::Display for Geography {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Geography {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::Validation(vec![Violation::new(
                    Field::Geography,
                    format!("Geography must be one of France, Germany, Spain (got '{}')", s),
                )])
            })
    }
}

/// Predicted churn class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ChurnLabel {
    /// Class 0: customer stays
    Retained = 0,
    /// Class 1: customer leaves
    Churned = 1,
}

impl ChurnLabel {
    /// Label from the pipeline's discrete class value
    pub fn from_class(class: i64) -> Option<Self> {
        match class {
            0 => Some(Self::Retained),
            1 => Some(Self::Churned),
            _ => None,
        }
    }

    /// Position of this label in the probability vector
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn is_churn(&self) -> bool {
        matches!(self, Self::Churned)
    }
}

impl From<ChurnLabel> for u8 {
    fn from(label: ChurnLabel) -> Self {
        label as u8
    }
}

impl TryFrom<u8> for ChurnLabel {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Self::from_class(i64::from(value)).ok_or_else(|| format!("invalid churn label {}", value))
    }
}

/// A successful single-record prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: ChurnLabel,

    /// Probability of `label` (0.0-1.0)
    pub confidence: f64,
}

/// Result of one inference call: success or a normalized failure, never both
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PredictionOutcome {
    Succeeded(Prediction),
    Failed { error: String },
}

impl PredictionOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    pub fn prediction(&self) -> Option<&Prediction> {
        match self {
            Self::Succeeded(p) => Some(p),
            Self::Failed { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    /// `(label, confidence, error)` triple for callers that expect the flat shape
    pub fn into_parts(self) -> (Option<ChurnLabel>, Option<f64>, Option<String>) {
        match self {
            Self::Succeeded(p) => (Some(p.label), Some(p.confidence), None),
            Self::Failed { error } => (None, None, Some(error)),
        }
    }
}

impl From<Result<Prediction>> for PredictionOutcome {
    fn from(result: Result<Prediction>) -> Self {
        match result {
            Ok(prediction) => Self::Succeeded(prediction),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

/// Serde adapter for booleans carried as 0/1 integers
mod flag {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(D::Error::custom(format!("expected 0 or 1, got {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_follows_column_order() {
        let record = CustomerRecord {
            has_cr_card: false,
            gender: Gender::Female,
            geography: Geography::Spain,
            ..Default::default()
        };
        let row = record.to_row();

        assert_eq!(row.len(), CustomerRecord::COLUMNS.len());
        assert_eq!(row[0], Value::Int(650));
        assert_eq!(row[3], Value::Float(50_000.0));
        assert_eq!(row[5], Value::Int(0));
        assert_eq!(row[6], Value::Int(1));
        assert_eq!(row[8], Value::Str("Female".to_string()));
        assert_eq!(row[9], Value::Str("Spain".to_string()));
    }

    #[test]
    fn test_record_uses_literal_field_names() {
        let json = serde_json::to_value(CustomerRecord::default()).unwrap();
        let obj = json.as_object().unwrap();
        for column in CustomerRecord::COLUMNS {
            assert!(obj.contains_key(column), "missing {}", column);
        }
        assert_eq!(obj["HasCrCard"], serde_json::json!(1));
    }

    #[test]
    fn test_flag_rejects_non_binary() {
        let mut json = serde_json::to_value(CustomerRecord::default()).unwrap();
        json["IsActiveMember"] = serde_json::json!(2);
        assert!(serde_json::from_value::<CustomerRecord>(json).is_err());
    }

    #[test]
    fn test_categorical_parsing() {
        assert_eq!("male".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!(" Germany ".parse::<Geography>().unwrap(), Geography::Germany);

        match "Italy".parse::<Geography>() {
            Err(Error::Validation(v)) => assert_eq!(v[0].field, Field::Geography),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_outcome_parts_are_exclusive() {
        let ok = PredictionOutcome::Succeeded(Prediction {
            label: ChurnLabel::Churned,
            confidence: 0.8,
        });
        assert_eq!(ok.into_parts(), (Some(ChurnLabel::Churned), Some(0.8), None));

        let failed = PredictionOutcome::failed("boom");
        assert_eq!(failed.into_parts(), (None, None, Some("boom".to_string())));
    }

    #[test]
    fn test_label_from_class() {
        assert_eq!(ChurnLabel::from_class(0), Some(ChurnLabel::Retained));
        assert_eq!(ChurnLabel::from_class(1).map(|l| l.index()), Some(1));
        assert_eq!(ChurnLabel::from_class(2), None);
    }
}
