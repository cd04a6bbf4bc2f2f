//! Runtime session management
//!
//! A `Session` owns the compute device, a fixed number of execution slots and
//! the memory budget pipelines are loaded against. `get_session` hands out one
//! process-wide session, built on first use and kept until exit.

use crate::config::{DeviceSpec, SessionConfig};
use crate::env;
use crate::frame::Frame;
use candle_core::Device;
use churnguard_core::{Error, Result, Value};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

static GLOBAL_SESSION: OnceCell<Arc<Session>> = OnceCell::new();

/// Identity of a session, unique within the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Get the process-wide session, creating it on first call.
///
/// Later calls return the same instance whatever `config` says. A failed
/// construction leaves nothing cached; concurrent first callers block until
/// the single winner finishes.
pub fn get_session(config: &SessionConfig) -> Result<Arc<Session>> {
    GLOBAL_SESSION
        .get_or_try_init(|| {
            for (var, value) in env::configure_environment(config) {
                tracing::info!("Set {}={}", var, value);
            }

            let session = Session::builder()
                .app_name(config.app_name.clone())
                .worker_threads(config.worker_threads)
                .memory_limit(config.memory_limit_bytes())
                .device(config.device)
                .build()
                .map_err(|e| {
                    tracing::error!("Session construction failed: {}", e);
                    e
                })?;

            tracing::info!(
                "Runtime session {} initialized ({} worker(s), {} MB)",
                session.id(),
                session.worker_threads(),
                session.memory_limit() / (1024 * 1024)
            );
            Ok(Arc::new(session))
        })
        .map(Arc::clone)
}

/// Handle to the compute runtime
pub struct Session {
    id: SessionId,
    app_name: String,
    device: Device,
    worker_threads: usize,
    slots: Semaphore,
    memory_limit: u64,
    memory_reserved: AtomicU64,
}

impl Session {
    /// Start building a standalone (non-global) session
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    /// Memory budget in bytes
    pub fn memory_limit(&self) -> u64 {
        self.memory_limit
    }

    /// Bytes already reserved by loaded pipelines
    pub fn memory_reserved(&self) -> u64 {
        self.memory_reserved.load(Ordering::Acquire)
    }

    /// Reserve part of the memory budget
    pub fn reserve_memory(&self, bytes: u64) -> Result<()> {
        self.memory_reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |reserved| {
                reserved
                    .checked_add(bytes)
                    .filter(|total| *total <= self.memory_limit)
            })
            .map(|_| ())
            .map_err(|reserved| {
                Error::config(format!(
                    "{} bytes requested but only {} of {} bytes remain in {}",
                    bytes,
                    self.memory_limit.saturating_sub(reserved),
                    self.memory_limit,
                    self.id
                ))
            })
    }

    /// Wait for one of the session's execution slots
    pub async fn acquire_slot(&self) -> Result<SemaphorePermit<'_>> {
        self.slots
            .acquire()
            .await
            .map_err(|_| Error::inference(format!("{} is closed", self.id)))
    }

    /// Build a single-row frame from named columns
    pub fn create_frame(&self, columns: &[&str], row: Vec<Value>) -> Result<Frame> {
        Frame::new(columns.iter().map(|c| c.to_string()).collect(), vec![row])
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("app_name", &self.app_name)
            .field("worker_threads", &self.worker_threads)
            .field("memory_limit", &self.memory_limit)
            .field("memory_reserved", &self.memory_reserved())
            .finish()
    }
}

/// Builder for [`Session`]
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    app_name: String,
    worker_threads: usize,
    memory_limit: u64,
    device: DeviceSpec,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        let config = SessionConfig::default();
        Self {
            memory_limit: config.memory_limit_bytes(),
            app_name: config.app_name,
            worker_threads: config.worker_threads,
            device: config.device,
        }
    }
}

impl SessionBuilder {
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Memory budget in bytes
    pub fn memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit = bytes;
        self
    }

    pub fn device(mut self, device: DeviceSpec) -> Self {
        self.device = device;
        self
    }

    pub fn build(self) -> Result<Session> {
        if self.app_name.trim().is_empty() {
            return Err(Error::config("Session app name must not be empty"));
        }
        if self.worker_threads == 0 {
            return Err(Error::config("Session needs at least one worker thread"));
        }
        if self.memory_limit == 0 {
            return Err(Error::config("Session memory limit must be greater than zero"));
        }

        let device = create_device(self.device)?;

        Ok(Session {
            id: SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)),
            app_name: self.app_name,
            device,
            worker_threads: self.worker_threads,
            slots: Semaphore::new(self.worker_threads),
            memory_limit: self.memory_limit,
            memory_reserved: AtomicU64::new(0),
        })
    }
}

/// Create Candle device from device spec
fn create_device(spec: DeviceSpec) -> Result<Device> {
    match spec {
        DeviceSpec::Cpu => Ok(Device::Cpu),
        DeviceSpec::Cuda { index } => Device::new_cuda(index.unwrap_or(0))
            .map_err(|e| Error::config(format!("Failed to create CUDA device: {}", e))),
        DeviceSpec::Metal { index } => Device::new_metal(index.unwrap_or(0))
            .map_err(|e| Error::config(format!("Failed to create Metal device: {}", e))),
    }
}
