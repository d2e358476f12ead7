//! Lifecycle of backend initialization.
//!
//! The gate starts in `Initializing` and moves exactly once, either to
//! `Ready` (publishing the backend) or to the terminal `Failed`. Requests
//! that arrive before `Ready` are rejected, never queued.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use crate::backend::Backend;
use crate::errors::Error;

const INITIALIZING: u8 = 0;
const READY: u8 = 1;
const FAILED: u8 = 2;

/// Observable state of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    Initializing,
    Ready,
    Failed,
}

/// Shared readiness gate holding the backend once it exists.
#[derive(Debug, Default)]
pub struct ReadinessGate {
    state: AtomicU8,
    backend: OnceLock<Arc<Backend>>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ReadinessState {
        match self.state.load(Ordering::Acquire) {
            READY => ReadinessState::Ready,
            FAILED => ReadinessState::Failed,
            _ => ReadinessState::Initializing,
        }
    }

    /// Publish the backend and open the gate.
    ///
    /// Returns false if the gate already left `Initializing`.
    pub fn mark_ready(&self, backend: Backend) -> bool {
        if self.state() != ReadinessState::Initializing {
            return false;
        }
        if self.backend.set(Arc::new(backend)).is_err() {
            return false;
        }
        self.state
            .compare_exchange(INITIALIZING, READY, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Move to the terminal failed state.
    ///
    /// Returns false if the gate already left `Initializing`.
    pub fn mark_failed(&self) -> bool {
        self.state
            .compare_exchange(INITIALIZING, FAILED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// The active backend, or the reason requests cannot be served yet.
    pub fn backend(&self) -> Result<Arc<Backend>, Error> {
        match self.state() {
            ReadinessState::Ready => self.backend.get().cloned().ok_or(Error::NotReady),
            ReadinessState::Initializing => Err(Error::NotReady),
            ReadinessState::Failed => Err(Error::InitializationFailed),
        }
    }
}
