//! ONNX Runtime session construction shared by the face models.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;

use crate::CapabilityError;

/// An `ort` session behind a mutex so one loaded model can serve
/// concurrent requests (`Session::run` needs exclusive access).
pub struct SharedSession {
    session: Mutex<Session>,
}

impl SharedSession {
    /// Loads `model_path` with full graph optimization, one inter-op thread
    /// and all cores for intra-op work, on the platform's preferred provider.
    pub fn load(model_path: &Path) -> Result<Self, CapabilityError> {
        let intra_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let session = Session::builder()
            .map_err(ort_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(ort_error)?
            .with_inter_threads(1)
            .map_err(ort_error)?
            .with_intra_threads(intra_threads)
            .map_err(ort_error)?
            .with_execution_providers(preferred_execution_providers())
            .map_err(ort_error)?
            .commit_from_file(model_path)
            .map_err(ort_error)?;
        log::debug!("Loaded ONNX model {}", model_path.display());
        Ok(Self {
            session: Mutex::new(session),
        })
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, Session>, CapabilityError> {
        self.session
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}").into())
    }
}

/// Flattens an `ort` error into its message.
pub fn ort_error<E: std::fmt::Display>(e: E) -> CapabilityError {
    e.to_string().into()
}

/// Preferred ONNX execution providers for the current platform.
///
/// ONNX Runtime falls back to CPU when a listed provider is unavailable.
fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}
