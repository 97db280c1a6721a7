//! Host-provided capabilities: progress reporting and cooperative
//! cancellation.
//!
//! The core never owns scheduling. The host hands in two plain callables;
//! every page-granular loop polls the cancellation probe and emits progress
//! through the same bundle.

use std::sync::Arc;

/// Progress callback: `(current, total, stage, message)`.
pub type ProgressFn = dyn Fn(u32, u32, &str, &str) + Send + Sync;

/// Cancellation probe: returns `true` once the host requested an abort.
/// Must be cheap; it is polled at least once per page.
pub type CancelFn = dyn Fn() -> bool + Send + Sync;

/// Bundle of host callbacks shared by every stage of a single document run.
///
/// Cloning is cheap; both callables sit behind `Arc`s.
#[derive(Clone, Default)]
pub struct HostHooks {
    progress: Option<Arc<ProgressFn>>,
    cancel: Option<Arc<CancelFn>>,
}

impl HostHooks {
    /// Hooks that report nothing and never cancel.
    pub fn none() -> Self {
        Self::default()
    }

    /// Attach a progress callback.
    pub fn with_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, u32, &str, &str) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(f));
        self
    }

    /// Attach a cancellation probe.
    pub fn with_cancel<F>(mut self, f: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.cancel = Some(Arc::new(f));
        self
    }

    /// Emit a progress event. Idempotent and informational only.
    pub fn progress(&self, current: u32, total: u32, stage: &str, message: &str) {
        if let Some(f) = &self.progress {
            f(current, total, stage, message);
        }
    }

    /// Poll the cancellation probe.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|f| f()).unwrap_or(false)
    }
}

impl std::fmt::Debug for HostHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostHooks")
            .field("progress", &self.progress.is_some())
            .field("cancel", &self.cancel.is_some())
            .finish()
    }
}
