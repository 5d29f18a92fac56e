//! Cooperative cancellation.
//!
//! One token is created per run (or per process, via
//! [`install_signal_handler`]) and cloned into every component that needs to
//! observe it. Nothing reads cancellation from global state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{ImportError, Result};

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals cancellation to every clone of this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(ImportError::Cancelled)` once the token has fired.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ImportError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Registers a SIGINT/SIGTERM handler that cancels the returned token.
///
/// The handler can only be installed once per process; a second call fails.
pub fn install_signal_handler() -> Result<CancellationToken> {
    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        log::warn!("Termination signal received, cancelling import...");
        handler_token.cancel();
    })?;
    Ok(token)
}
