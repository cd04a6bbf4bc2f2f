//! In-memory inference pipeline
//!
//! A pipeline directory holds a `metadata/pipeline.json` describing the stage
//! chain and a safetensors file with the fitted tensors:
//!
//! ```text
//! best_pipeline_model/
//!   metadata/
//!     pipeline.json
//!   weights.safetensors
//! ```
//!
//! The layout is produced by the training side and read here as-is.

use crate::frame::Frame;
use crate::session::{Session, SessionId};
use crate::stages::{
    ClassifierColumns, HandleInvalid, LogisticRegression, OneHotEncoder, StandardScaler,
    StringIndexer, Transformer, VectorAssembler,
};
use candle_core::{Device, Tensor};
use churnguard_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Marker sub-path every model directory must contain
pub const METADATA_MARKER: &str = "metadata";

/// Stage description inside the marker directory
pub const METADATA_FILE: &str = "pipeline.json";

pub const SUPPORTED_FORMAT_VERSION: u32 = 1;

/// Serialized pipeline description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineMetadata {
    /// Unique id assigned at training time
    pub uid: String,

    /// Model version
    #[serde(default)]
    pub version: String,

    /// Layout version of this description
    pub format_version: u32,

    /// Weights file, relative to the model directory
    #[serde(default)]
    pub weights: Option<String>,

    /// Class values in probability-vector order
    pub class_labels: Vec<i64>,

    pub stages: Vec<StageSpec>,
}

/// Stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageSpec {
    StringIndexer {
        input_col: String,
        output_col: String,
        labels: Vec<String>,
        #[serde(default)]
        handle_invalid: HandleInvalid,
    },

    OneHotEncoder {
        input_col: String,
        output_col: String,
        size: usize,
        #[serde(default = "default_true")]
        drop_last: bool,
    },

    VectorAssembler {
        input_cols: Vec<String>,
        output_col: String,
    },

    /// `mean` and `std` name tensors in the weights file
    StandardScaler {
        input_col: String,
        output_col: String,
        #[serde(default)]
        mean: Option<String>,
        #[serde(default)]
        std: Option<String>,
    },

    /// `coefficients` and `intercept` name tensors in the weights file
    LogisticRegression {
        features_col: String,
        coefficients: String,
        intercept: String,
        #[serde(default = "default_threshold")]
        threshold: f64,
        #[serde(default)]
        columns: ClassifierColumns,
    },
}

fn default_true() -> bool {
    true
}

fn default_threshold() -> f64 {
    0.5
}

impl PipelineMetadata {
    /// Read `metadata/pipeline.json` under a model directory
    pub fn from_dir(model_dir: &Path) -> Result<Self> {
        let file = model_dir.join(METADATA_MARKER).join(METADATA_FILE);
        let content =
            std::fs::read_to_string(&file).map_err(|e| Error::artifact(file.clone(), e))?;
        serde_json::from_str(&content).map_err(|e| Error::artifact(file, e))
    }
}

/// Loaded, immutable pipeline bound to the session it was loaded with
pub struct Pipeline {
    uid: String,
    version: String,
    path: PathBuf,
    session_id: SessionId,
    device: Device,
    class_labels: Vec<i64>,
    stages: Vec<Box<dyn Transformer>>,
    columns: ClassifierColumns,
    weights_bytes: u64,
}

impl Pipeline {
    /// Deserialize the pipeline stored in `path`.
    ///
    /// The caller has already checked that the directory and its marker exist.
    pub(crate) fn load(session: &Session, path: &Path) -> Result<Self> {
        let metadata = PipelineMetadata::from_dir(path)?;

        if metadata.format_version != SUPPORTED_FORMAT_VERSION {
            return Err(Error::artifact(
                path,
                format!(
                    "unsupported format version {} (expected {})",
                    metadata.format_version, SUPPORTED_FORMAT_VERSION
                ),
            ));
        }
        check_class_labels(&metadata.class_labels).map_err(|msg| Error::artifact(path, msg))?;

        let (tensors, weights_bytes) = match &metadata.weights {
            Some(name) => {
                let weights_path = path.join(name);
                let bytes = std::fs::metadata(&weights_path)
                    .map_err(|e| Error::artifact(weights_path.clone(), e))?
                    .len();
                let tensors = candle_core::safetensors::load(&weights_path, session.device())
                    .map_err(|e| Error::artifact(weights_path.clone(), e))?;
                (tensors, bytes)
            }
            None => (HashMap::new(), 0),
        };

        let (stages, columns) = build_stages(&metadata, &tensors, session.device())
            .map_err(|msg| Error::artifact(path, msg))?;

        session.reserve_memory(weights_bytes)?;

        tracing::debug!(
            "Pipeline {} has {} stages, {} tensors ({} bytes)",
            metadata.uid,
            stages.len(),
            tensors.len(),
            weights_bytes
        );

        Ok(Self {
            uid: metadata.uid,
            version: metadata.version,
            path: path.to_path_buf(),
            session_id: session.id(),
            device: session.device().clone(),
            class_labels: metadata.class_labels,
            stages,
            columns,
            weights_bytes,
        })
    }

    /// Run a frame through every stage.
    ///
    /// The output keeps the input columns and appends the classifier's
    /// prediction and probability columns.
    pub fn transform(&self, session: &Session, frame: Frame) -> Result<Frame> {
        if session.id() != self.session_id {
            return Err(Error::inference(format!(
                "Pipeline {} is bound to {}, not {}",
                self.uid,
                self.session_id,
                session.id()
            )));
        }

        self.stages.iter().try_fold(frame, |frame, stage| {
            tracing::trace!("Applying stage {}", stage.name());
            stage.transform(frame, &self.device)
        })
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Class values, ascending, in probability-vector order
    pub fn class_labels(&self) -> &[i64] {
        &self.class_labels
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn prediction_col(&self) -> &str {
        &self.columns.prediction_col
    }

    pub fn probability_col(&self) -> &str {
        &self.columns.probability_col
    }

    pub fn weights_bytes(&self) -> u64 {
        self.weights_bytes
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("uid", &self.uid)
            .field("version", &self.version)
            .field("path", &self.path)
            .field("session_id", &self.session_id)
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Class values must be 0, 1, ... so a label doubles as its probability index
fn check_class_labels(labels: &[i64]) -> std::result::Result<(), String> {
    if labels.len() < 2 {
        return Err(format!("expected at least 2 class labels, got {:?}", labels));
    }
    if labels.iter().enumerate().any(|(i, l)| *l != i as i64) {
        return Err(format!(
            "class labels must be ascending from 0 to match probability order, got {:?}",
            labels
        ));
    }
    Ok(())
}

type BuiltStages = (Vec<Box<dyn Transformer>>, ClassifierColumns);

fn build_stages(
    metadata: &PipelineMetadata,
    tensors: &HashMap<String, Tensor>,
    device: &Device,
) -> std::result::Result<BuiltStages, String> {
    let tensor = |name: &str| {
        tensors
            .get(name)
            .cloned()
            .ok_or_else(|| format!("tensor '{}' not found in weights", name))
    };

    let mut stages: Vec<Box<dyn Transformer>> = Vec::with_capacity(metadata.stages.len());
    let mut classifier: Option<(ClassifierColumns, usize)> = None;
    let mut scaled_width: HashMap<String, usize> = HashMap::new();

    for (idx, spec) in metadata.stages.iter().enumerate() {
        if classifier.is_some() {
            return Err(format!("stage {} follows the classifier stage", idx));
        }

        match spec {
            StageSpec::StringIndexer {
                input_col,
                output_col,
                labels,
                handle_invalid,
            } => {
                if labels.is_empty() {
                    return Err(format!("string_indexer '{}' has no labels", input_col));
                }
                stages.push(Box::new(StringIndexer {
                    input_col: input_col.clone(),
                    output_col: output_col.clone(),
                    labels: labels.clone(),
                    handle_invalid: *handle_invalid,
                }));
            }

            StageSpec::OneHotEncoder {
                input_col,
                output_col,
                size,
                drop_last,
            } => {
                if *size == 0 || (*drop_last && *size < 2) {
                    return Err(format!(
                        "one_hot_encoder '{}' has invalid size {}",
                        input_col, size
                    ));
                }
                stages.push(Box::new(OneHotEncoder {
                    input_col: input_col.clone(),
                    output_col: output_col.clone(),
                    size: *size,
                    drop_last: *drop_last,
                }));
            }

            StageSpec::VectorAssembler {
                input_cols,
                output_col,
            } => {
                stages.push(Box::new(VectorAssembler {
                    input_cols: input_cols.clone(),
                    output_col: output_col.clone(),
                }));
            }

            StageSpec::StandardScaler {
                input_col,
                output_col,
                mean,
                std,
            } => {
                let mean = mean.as_deref().map(tensor).transpose()?;
                let std = std.as_deref().map(tensor).transpose()?;
                let scaler =
                    StandardScaler::new(input_col.clone(), output_col.clone(), mean, std, device)
                        .map_err(|e| format!("standard_scaler '{}': {}", input_col, e))?;
                scaled_width.insert(output_col.clone(), scaler.width());
                stages.push(Box::new(scaler));
            }

            StageSpec::LogisticRegression {
                features_col,
                coefficients,
                intercept,
                threshold,
                columns,
            } => {
                let lr = LogisticRegression::new(
                    features_col.clone(),
                    columns.clone(),
                    *threshold,
                    tensor(coefficients)?,
                    tensor(intercept)?,
                )
                .map_err(|e| format!("logistic_regression: {}", e))?;

                if let Some(width) = scaled_width.get(features_col) {
                    if *width != lr.width() {
                        return Err(format!(
                            "logistic_regression expects {} features but '{}' has {}",
                            lr.width(),
                            features_col,
                            width
                        ));
                    }
                }

                classifier = Some((columns.clone(), lr.num_classes()));
                stages.push(Box::new(lr));
            }
        }
    }

    let (columns, num_classes) =
        classifier.ok_or_else(|| "pipeline has no classifier stage".to_string())?;

    if num_classes != metadata.class_labels.len() {
        return Err(format!(
            "classifier produces {} classes but metadata lists {:?}",
            num_classes, metadata.class_labels
        ));
    }

    Ok((stages, columns))
}
