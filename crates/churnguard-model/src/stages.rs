//! Pipeline stages
//!
//! Each stage reads named columns of a [`Frame`] and appends one or more
//! output columns. Scaling and classification run on Candle tensors.

use crate::frame::Frame;
use candle_core::{DType, Device, Tensor, D};
use churnguard_core::{Error, Result, Value};
use serde::{Deserialize, Serialize};

/// A fitted transformation applied to every row of a frame
pub trait Transformer: Send + Sync {
    /// Stage kind, for logs and errors
    fn name(&self) -> &str;

    fn transform(&self, frame: Frame, device: &Device) -> Result<Frame>;
}

fn tensor_err(stage: &str) -> impl Fn(candle_core::Error) -> Error + '_ {
    move |e| Error::inference(format!("{} failed: {}", stage, e))
}

/// What a string indexer does with labels it was not fitted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HandleInvalid {
    /// Fail the transform
    #[default]
    Error,
    /// Map to an extra index after the known labels
    Keep,
}

/// Maps a string column to the index of its value in `labels`
pub struct StringIndexer {
    pub input_col: String,
    pub output_col: String,
    pub labels: Vec<String>,
    pub handle_invalid: HandleInvalid,
}

impl Transformer for StringIndexer {
    fn name(&self) -> &str {
        "string_indexer"
    }

    fn transform(&self, frame: Frame, _device: &Device) -> Result<Frame> {
        let values = frame
            .column(&self.input_col)?
            .map(|value| {
                let s = value.as_str().ok_or_else(|| {
                    Error::inference(format!(
                        "{} expects a string in '{}', got {}",
                        self.name(),
                        self.input_col,
                        value.type_name()
                    ))
                })?;

                match self.labels.iter().position(|l| l == s) {
                    Some(idx) => Ok(Value::Float(idx as f64)),
                    None if self.handle_invalid == HandleInvalid::Keep => {
                        Ok(Value::Float(self.labels.len() as f64))
                    }
                    None => Err(Error::inference(format!(
                        "Unseen label '{}' in column '{}'",
                        s, self.input_col
                    ))),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        frame.with_column(self.output_col.clone(), values)
    }
}

/// Expands a category index into a one-hot vector
pub struct OneHotEncoder {
    pub input_col: String,
    pub output_col: String,
    /// Number of categories
    pub size: usize,
    /// Drop the last category, which then encodes as all zeros
    pub drop_last: bool,
}

impl Transformer for OneHotEncoder {
    fn name(&self) -> &str {
        "one_hot_encoder"
    }

    fn transform(&self, frame: Frame, _device: &Device) -> Result<Frame> {
        let width = if self.drop_last { self.size.saturating_sub(1) } else { self.size };

        let values = frame
            .column(&self.input_col)?
            .map(|value| {
                let idx = value
                    .as_f64()
                    .filter(|v| v.fract() == 0.0 && *v >= 0.0 && *v < self.size as f64)
                    .ok_or_else(|| {
                        Error::inference(format!(
                            "{} expects a category index below {} in '{}', got {:?}",
                            self.name(),
                            self.size,
                            self.input_col,
                            value
                        ))
                    })? as usize;

                let mut encoded = vec![0.0; width];
                if idx < width {
                    encoded[idx] = 1.0;
                }
                Ok(Value::Vector(encoded))
            })
            .collect::<Result<Vec<_>>>()?;

        frame.with_column(self.output_col.clone(), values)
    }
}

/// Concatenates numeric and vector columns into one feature vector
pub struct VectorAssembler {
    pub input_cols: Vec<String>,
    pub output_col: String,
}

impl Transformer for VectorAssembler {
    fn name(&self) -> &str {
        "vector_assembler"
    }

    fn transform(&self, frame: Frame, _device: &Device) -> Result<Frame> {
        let mut values = Vec::with_capacity(frame.num_rows());

        for idx in 0..frame.num_rows() {
            let row = frame
                .row(idx)
                .ok_or_else(|| Error::inference(format!("Row {} vanished", idx)))?;
            let mut features = Vec::new();

            for col in &self.input_cols {
                match row.get(col)? {
                    Value::Vector(v) => features.extend_from_slice(v),
                    other => features.push(other.as_f64().ok_or_else(|| {
                        Error::inference(format!(
                            "{} cannot assemble {} column '{}'",
                            self.name(),
                            other.type_name(),
                            col
                        ))
                    })?),
                }
            }

            if features.iter().any(|f| f.is_nan()) {
                return Err(Error::inference(format!(
                    "{} encountered NaN in row {}",
                    self.name(),
                    idx
                )));
            }
            values.push(Value::Vector(features));
        }

        frame.with_column(self.output_col.clone(), values)
    }
}

/// Reads a vector column into a `(rows, width)` tensor
fn features_tensor(frame: &Frame, col: &str, width: usize, device: &Device) -> Result<Tensor> {
    let mut data = Vec::with_capacity(frame.num_rows() * width);

    for value in frame.column(col)? {
        let v = value.as_vector().ok_or_else(|| {
            Error::inference(format!(
                "Column '{}' must be a vector, got {}",
                col,
                value.type_name()
            ))
        })?;
        if v.len() != width {
            return Err(Error::inference(format!(
                "Column '{}' has {} features, model expects {}",
                col,
                v.len(),
                width
            )));
        }
        data.extend_from_slice(v);
    }

    Tensor::from_vec(data, (frame.num_rows(), width), device)
        .map_err(|e| Error::inference(format!("Failed to build feature tensor: {}", e)))
}

fn tensor_rows(tensor: &Tensor, stage: &str) -> Result<Vec<Vec<f64>>> {
    tensor
        .to_dtype(DType::F64)
        .and_then(|t| t.to_vec2::<f64>())
        .map_err(tensor_err(stage))
}

/// Standardizes features: `(x - mean) / std`
///
/// A zero standard deviation maps the component to 0.
pub struct StandardScaler {
    pub input_col: String,
    pub output_col: String,
    /// `(1, width)` row to subtract, all zeros when centering is off
    mean: Tensor,
    /// `(1, width)` row of `1 / std`, all ones when scaling is off
    inv_std: Tensor,
    width: usize,
}

impl StandardScaler {
    pub fn new(
        input_col: String,
        output_col: String,
        mean: Option<Tensor>,
        std: Option<Tensor>,
        device: &Device,
    ) -> candle_core::Result<Self> {
        let width = match (&mean, &std) {
            (Some(t), _) | (None, Some(t)) => t.dims1()?,
            (None, None) => candle_core::bail!("standard_scaler needs a mean or a std tensor"),
        };

        let mean = match mean {
            Some(m) => m.to_dtype(DType::F64)?.reshape((1, width))?,
            None => Tensor::zeros((1, width), DType::F64, device)?,
        };

        let inv_std = match std {
            Some(s) => {
                let s = s.to_dtype(DType::F64)?;
                if s.dims1()? != width {
                    candle_core::bail!("standard_scaler mean and std widths differ");
                }
                let inv: Vec<f64> = s
                    .to_vec1::<f64>()?
                    .into_iter()
                    .map(|v| if v == 0.0 { 0.0 } else { 1.0 / v })
                    .collect();
                Tensor::from_vec(inv, (1, width), device)?
            }
            None => Tensor::ones((1, width), DType::F64, device)?,
        };

        Ok(Self {
            input_col,
            output_col,
            mean,
            inv_std,
            width,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

impl Transformer for StandardScaler {
    fn name(&self) -> &str {
        "standard_scaler"
    }

    fn transform(&self, frame: Frame, device: &Device) -> Result<Frame> {
        let x = features_tensor(&frame, &self.input_col, self.width, device)?;

        let scaled = x
            .broadcast_sub(&self.mean)
            .and_then(|t| t.broadcast_mul(&self.inv_std))
            .map_err(tensor_err(self.name()))?;

        let values = tensor_rows(&scaled, self.name())?
            .into_iter()
            .map(Value::Vector)
            .collect();
        frame.with_column(self.output_col.clone(), values)
    }
}

/// Output column names of a classifier stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierColumns {
    #[serde(default = "default_raw_prediction_col")]
    pub raw_prediction_col: String,
    #[serde(default = "default_probability_col")]
    pub probability_col: String,
    #[serde(default = "default_prediction_col")]
    pub prediction_col: String,
}

impl Default for ClassifierColumns {
    fn default() -> Self {
        Self {
            raw_prediction_col: default_raw_prediction_col(),
            probability_col: default_probability_col(),
            prediction_col: default_prediction_col(),
        }
    }
}

fn default_raw_prediction_col() -> String {
    "rawPrediction".to_string()
}

fn default_probability_col() -> String {
    "probability".to_string()
}

fn default_prediction_col() -> String {
    "prediction".to_string()
}

/// Fitted logistic regression
///
/// One coefficient row is binomial: classes `[0, 1]`, class 1 is predicted
/// when its probability exceeds `threshold`. More rows are multinomial with a
/// softmax and argmax prediction. Probability vectors are ordered by class
/// index.
pub struct LogisticRegression {
    pub features_col: String,
    pub columns: ClassifierColumns,
    pub threshold: f64,
    /// `(width, k)`, already transposed for the matmul
    coefficients_t: Tensor,
    /// `(1, k)`
    intercept: Tensor,
    width: usize,
    num_classes: usize,
    binomial: bool,
}

impl LogisticRegression {
    pub fn new(
        features_col: String,
        columns: ClassifierColumns,
        threshold: f64,
        coefficients: Tensor,
        intercept: Tensor,
    ) -> candle_core::Result<Self> {
        let coefficients = coefficients.to_dtype(DType::F64)?;
        let (rows, width) = coefficients.dims2()?;
        let intercept = intercept.to_dtype(DType::F64)?;
        if intercept.dims1()? != rows {
            candle_core::bail!(
                "logistic_regression has {} coefficient rows but {} intercepts",
                rows,
                intercept.dims1()?
            );
        }
        if !(0.0..=1.0).contains(&threshold) {
            candle_core::bail!("logistic_regression threshold {} outside [0, 1]", threshold);
        }

        Ok(Self {
            features_col,
            columns,
            threshold,
            coefficients_t: coefficients.t()?.contiguous()?,
            intercept: intercept.reshape((1, rows))?,
            width,
            num_classes: if rows == 1 { 2 } else { rows },
            binomial: rows == 1,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns (raw scores, probabilities) per row
    fn score(&self, x: &Tensor) -> candle_core::Result<(Vec<Vec<f64>>, Vec<Vec<f64>>)> {
        let margins = x
            .matmul(&self.coefficients_t)?
            .broadcast_add(&self.intercept)?;

        if self.binomial {
            let p1 = (margins.neg()?.exp()? + 1.0)?.recip()?;
            let z = margins.to_vec2::<f64>()?;
            let p1 = p1.to_vec2::<f64>()?;
            let raw = z.iter().map(|r| vec![-r[0], r[0]]).collect();
            let prob = p1.iter().map(|r| vec![1.0 - r[0], r[0]]).collect();
            Ok((raw, prob))
        } else {
            let prob = candle_nn::ops::softmax(&margins, D::Minus1)?;
            Ok((margins.to_vec2::<f64>()?, prob.to_vec2::<f64>()?))
        }
    }

    fn predict_class(&self, probability: &[f64]) -> usize {
        if self.binomial {
            usize::from(probability[1] > self.threshold)
        } else {
            probability
                .iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |best, (i, p)| {
                    if *p > best.1 {
                        (i, *p)
                    } else {
                        best
                    }
                })
                .0
        }
    }
}

impl Transformer for LogisticRegression {
    fn name(&self) -> &str {
        "logistic_regression"
    }

    fn transform(&self, frame: Frame, device: &Device) -> Result<Frame> {
        let x = features_tensor(&frame, &self.features_col, self.width, device)?;
        let (raw, probabilities) = self.score(&x).map_err(tensor_err(self.name()))?;

        let predictions = probabilities
            .iter()
            .map(|p| Value::Float(self.predict_class(p) as f64))
            .collect();

        frame
            .with_column(
                self.columns.raw_prediction_col.clone(),
                raw.into_iter().map(Value::Vector).collect(),
            )?
            .with_column(
                self.columns.probability_col.clone(),
                probabilities.into_iter().map(Value::Vector).collect(),
            )?
            .with_column(self.columns.prediction_col.clone(), predictions)
    }
}
