//! Model artifact fixtures
//!
//! Writes small pipeline directories into a temp dir so loader and inference
//! tests do not depend on the bundled model.

#![allow(dead_code)]

use candle_core::{Device, Tensor};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builder for a `metadata/pipeline.json` + `weights.safetensors` directory.
///
/// The default pipeline indexes Gender and Geography, assembles all ten
/// fields, scales with identity statistics and scores with zero coefficients,
/// so every record gets `p1 = sigmoid(intercept)`.
pub struct ArtifactBuilder {
    intercept: f64,
    threshold: f64,
    class_labels: Vec<i64>,
    with_marker: bool,
    format_version: u32,
}

impl Default for ArtifactBuilder {
    fn default() -> Self {
        Self {
            intercept: 0.0,
            threshold: 0.5,
            class_labels: vec![0, 1],
            with_marker: true,
            format_version: 1,
        }
    }
}

/// Width of the assembled feature vector: eight numeric fields, the gender
/// index and a two-wide geography one-hot
pub const FEATURE_WIDTH: usize = 11;

impl ArtifactBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_intercept(mut self, intercept: f64) -> Self {
        self.intercept = intercept;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_class_labels(mut self, labels: Vec<i64>) -> Self {
        self.class_labels = labels;
        self
    }

    pub fn with_format_version(mut self, version: u32) -> Self {
        self.format_version = version;
        self
    }

    /// Leave out the `metadata` marker (and everything in it)
    pub fn without_marker(mut self) -> Self {
        self.with_marker = false;
        self
    }

    /// Write the artifact into `dir/name` and return its path
    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        let model_dir = dir.join(name);
        std::fs::create_dir_all(&model_dir).unwrap();

        let device = Device::Cpu;
        let mut tensors = HashMap::new();
        tensors.insert(
            "scaler.mean".to_string(),
            Tensor::zeros(FEATURE_WIDTH, candle_core::DType::F64, &device).unwrap(),
        );
        tensors.insert(
            "scaler.std".to_string(),
            Tensor::ones(FEATURE_WIDTH, candle_core::DType::F64, &device).unwrap(),
        );
        tensors.insert(
            "lr.coefficients".to_string(),
            Tensor::zeros((1, FEATURE_WIDTH), candle_core::DType::F64, &device).unwrap(),
        );
        tensors.insert(
            "lr.intercept".to_string(),
            Tensor::new(&[self.intercept], &device).unwrap(),
        );
        candle_core::safetensors::save(&tensors, model_dir.join("weights.safetensors")).unwrap();

        if self.with_marker {
            let metadata_dir = model_dir.join("metadata");
            std::fs::create_dir_all(&metadata_dir).unwrap();
            std::fs::write(
                metadata_dir.join("pipeline.json"),
                serde_json::to_string_pretty(&self.metadata()).unwrap(),
            )
            .unwrap();
        }

        model_dir
    }

    /// Write the artifact into a fresh temp dir
    pub fn build(&self) -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = self.write_to(dir.path(), "best_pipeline_model");
        (dir, path)
    }

    fn metadata(&self) -> serde_json::Value {
        json!({
            "uid": "PipelineModel_fixture",
            "version": "0.0.1",
            "format_version": self.format_version,
            "weights": "weights.safetensors",
            "class_labels": self.class_labels,
            "stages": [
                {"type": "string_indexer", "input_col": "Gender", "output_col": "GenderIndex",
                 "labels": ["Male", "Female"]},
                {"type": "string_indexer", "input_col": "Geography", "output_col": "GeographyIndex",
                 "labels": ["France", "Germany", "Spain"]},
                {"type": "one_hot_encoder", "input_col": "GeographyIndex",
                 "output_col": "GeographyVec", "size": 3},
                {"type": "vector_assembler",
                 "input_cols": ["CreditScore", "Age", "Tenure", "Balance", "NumOfProducts",
                                "HasCrCard", "IsActiveMember", "EstimatedSalary",
                                "GenderIndex", "GeographyVec"],
                 "output_col": "features"},
                {"type": "standard_scaler", "input_col": "features", "output_col": "scaledFeatures",
                 "mean": "scaler.mean", "std": "scaler.std"},
                {"type": "logistic_regression", "features_col": "scaledFeatures",
                 "coefficients": "lr.coefficients", "intercept": "lr.intercept",
                 "threshold": self.threshold}
            ]
        })
    }
}

pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
