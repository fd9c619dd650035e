//! Cooperative pause and cancel for long-running phases

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use triage_core::retry::sleep_or_cancel;

use crate::error::{EngineError, Result};

/// Cloneable handle shared by the running phase and whoever controls it
#[derive(Debug, Clone)]
pub struct RunControl {
    cancel: CancellationToken,
    paused: Arc<watch::Sender<bool>>,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RunControl {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            cancel: CancellationToken::new(),
            paused: Arc::new(paused),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Fail if cancelled, otherwise block while paused
    pub async fn checkpoint(&self) -> Result<()> {
        let mut paused = self.paused.subscribe();
        loop {
            if self.cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let is_paused = *paused.borrow_and_update();
            if !is_paused {
                return Ok(());
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(EngineError::Cancelled),
                changed = paused.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Wait `delay` unless cancelled first
    pub async fn sleep(&self, delay: Duration) -> Result<()> {
        if sleep_or_cancel(&self.cancel, delay).await {
            Ok(())
        } else {
            Err(EngineError::Cancelled)
        }
    }
}
