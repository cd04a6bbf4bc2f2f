//! Domain validation for customer records
//!
//! Every rule is evaluated so a caller can report all problems at once.
//! Ranges are inclusive.

use crate::types::CustomerRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

pub const CREDIT_SCORE_RANGE: RangeInclusive<i32> = 300..=900;
pub const AGE_RANGE: RangeInclusive<i32> = 18..=100;
pub const TENURE_RANGE: RangeInclusive<i32> = 0..=10;
pub const NUM_OF_PRODUCTS_RANGE: RangeInclusive<i32> = 1..=5;

/// Record field a violation refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    CreditScore,
    Age,
    Tenure,
    Balance,
    NumOfProducts,
    HasCrCard,
    IsActiveMember,
    EstimatedSalary,
    Gender,
    Geography,
}

impl Field {
    /// Literal column name
    pub fn column(&self) -> &'static str {
        match self {
            Self::CreditScore => "CreditScore",
            Self::Age => "Age",
            Self::Tenure => "Tenure",
            Self::Balance => "Balance",
            Self::NumOfProducts => "NumOfProducts",
            Self::HasCrCard => "HasCrCard",
            Self::IsActiveMember => "IsActiveMember",
            Self::EstimatedSalary => "EstimatedSalary",
            Self::Gender => "Gender",
            Self::Geography => "Geography",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// One field failing its domain constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: Field,
    pub message: String,
}

impl Violation {
    pub fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Check a record against the domain rules.
///
/// An empty result means the record is admissible for inference.
pub fn validate(record: &CustomerRecord) -> Vec<Violation> {
    let mut violations = Vec::new();

    check_range(
        &mut violations,
        Field::CreditScore,
        "Credit score",
        record.credit_score,
        CREDIT_SCORE_RANGE,
    );
    check_range(&mut violations, Field::Age, "Age", record.age, AGE_RANGE);
    check_range(
        &mut violations,
        Field::Tenure,
        "Tenure",
        record.tenure,
        TENURE_RANGE,
    );
    check_non_negative(&mut violations, Field::Balance, "Balance", record.balance);
    check_range(
        &mut violations,
        Field::NumOfProducts,
        "Number of products",
        record.num_of_products,
        NUM_OF_PRODUCTS_RANGE,
    );
    check_non_negative(
        &mut violations,
        Field::EstimatedSalary,
        "Estimated salary",
        record.estimated_salary,
    );

    violations
}

fn check_range(
    violations: &mut Vec<Violation>,
    field: Field,
    label: &str,
    value: i32,
    range: RangeInclusive<i32>,
) {
    if !range.contains(&value) {
        violations.push(Violation::new(
            field,
            format!(
                "{} ({}) must be between {} and {}, got {}",
                label,
                field,
                range.start(),
                range.end(),
                value
            ),
        ));
    }
}

// NaN and infinities are rejected along with negatives
fn check_non_negative(violations: &mut Vec<Violation>, field: Field, label: &str, value: f64) {
    if !value.is_finite() || value < 0.0 {
        violations.push(Violation::new(
            field,
            format!("{} ({}) must be a finite number >= 0, got {}", label, field, value),
        ));
    }
}
