//! Model resolution and loading
//!
//! Pipelines are cached per `(session, path)`: once a key loads successfully
//! the same `Arc<Pipeline>` is handed out until the process exits. Failed
//! loads are never cached.

use crate::pipeline::{Pipeline, METADATA_MARKER};
use crate::session::{Session, SessionId};
use churnguard_core::{Error, MissingArtifact, Result};
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Model directory relative to this crate's installed location
pub const MODEL_DIR_OFFSET: &str = "../../models/best_pipeline_model";

/// Environment variable overriding the model directory
pub const MODEL_PATH_ENV: &str = "CHURNGUARD_MODEL_PATH";

static REPOSITORY: Lazy<ModelRepository> = Lazy::new(ModelRepository::new);

/// Absolute location of the bundled model.
///
/// Derived from the crate's own directory, so it does not depend on the
/// current working directory.
pub fn resolve_path() -> PathBuf {
    normalize(&Path::new(env!("CARGO_MANIFEST_DIR")).join(MODEL_DIR_OFFSET))
}

/// Pick the model directory: explicit override, then `CHURNGUARD_MODEL_PATH`,
/// then the bundled location
pub fn locate_model(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Some(path) = std::env::var_os(MODEL_PATH_ENV).filter(|p| !p.is_empty()) {
        tracing::info!("Using model path from {}", MODEL_PATH_ENV);
        return PathBuf::from(path);
    }
    resolve_path()
}

/// Lexically resolve `.` and `..` components
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Load a pipeline through the process-wide repository
pub fn load(session: &Session, path: &Path) -> Result<Arc<Pipeline>> {
    REPOSITORY.load(session, path)
}

type CacheKey = (SessionId, PathBuf);

/// Cache of loaded pipelines keyed by session identity and path
#[derive(Default)]
pub struct ModelRepository {
    entries: Mutex<HashMap<CacheKey, Arc<OnceCell<Arc<Pipeline>>>>>,
}

impl ModelRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the pipeline at `path`, or return the cached instance.
    ///
    /// Checks that the directory exists, then that its metadata marker
    /// exists; each is reported separately. Concurrent first loads of one key
    /// read storage once.
    pub fn load(&self, session: &Session, path: &Path) -> Result<Arc<Pipeline>> {
        let cell = {
            let mut entries = self.entries.lock();
            Arc::clone(
                entries
                    .entry((session.id(), path.to_path_buf()))
                    .or_default(),
            )
        };

        let result = cell
            .get_or_try_init(|| load_uncached(session, path))
            .map(Arc::clone);

        if result.is_err() {
            self.evict_failed(session.id(), path, &cell);
        }
        result
    }

    /// Drop the entry for a key whose load failed, unless another caller has
    /// since filled or replaced it
    fn evict_failed(
        &self,
        session_id: SessionId,
        path: &Path,
        cell: &Arc<OnceCell<Arc<Pipeline>>>,
    ) {
        let mut entries = self.entries.lock();
        let key = (session_id, path.to_path_buf());
        if entries
            .get(&key)
            .is_some_and(|current| Arc::ptr_eq(current, cell) && current.get().is_none())
        {
            entries.remove(&key);
        }
    }

    /// Whether a pipeline for this key has been loaded
    pub fn is_cached(&self, session_id: SessionId, path: &Path) -> bool {
        self.entries
            .lock()
            .get(&(session_id, path.to_path_buf()))
            .is_some_and(|cell| cell.get().is_some())
    }

    /// Number of successfully loaded pipelines
    pub fn cached_count(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|cell| cell.get().is_some())
            .count()
    }
}

fn load_uncached(session: &Session, path: &Path) -> Result<Arc<Pipeline>> {
    check_artifact(path).map_err(|e| {
        tracing::error!("Model load failed: {}", e);
        e
    })?;

    match Pipeline::load(session, path) {
        Ok(pipeline) => {
            tracing::info!(
                "Model {} (version {}) loaded from {}",
                pipeline.uid(),
                pipeline.version(),
                path.display()
            );
            Ok(Arc::new(pipeline))
        }
        Err(e) => {
            tracing::error!("Model load failed: {}", e);
            Err(e)
        }
    }
}

fn check_artifact(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::artifact_missing(MissingArtifact::ModelDirectory, path));
    }

    let marker = path.join(METADATA_MARKER);
    if !marker.exists() {
        return Err(Error::artifact_missing(MissingArtifact::MetadataMarker, marker));
    }

    Ok(())
}

/// What is on disk at a model location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSummary {
    pub path: PathBuf,
    pub exists: bool,
    pub has_metadata: bool,
    /// Entries directly inside the model directory
    pub entry_count: usize,
}

/// Describe a model location without loading it
pub fn inspect(path: &Path) -> Result<ArtifactSummary> {
    let exists = path.is_dir();
    let entry_count = if exists {
        std::fs::read_dir(path)?.count()
    } else {
        0
    };

    Ok(ArtifactSummary {
        path: path.to_path_buf(),
        exists,
        has_metadata: path.join(METADATA_MARKER).exists(),
        entry_count,
    })
}
