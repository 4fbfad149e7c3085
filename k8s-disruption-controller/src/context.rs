use std::future;

use tokio::sync::watch;

use super::*;

/// Request-scoped inputs for one reconciliation: the settings resolved for
/// this invocation and a cancellation signal.
///
#[derive(Clone, Debug)]
pub struct ReconcileContext {
    settings: Settings,
    cancel: watch::Receiver<bool>,
}

impl ReconcileContext {
    /// Context that is never cancelled
    ///
    pub fn new(settings: Settings) -> Self {
        let (_, cancel) = watch::channel(false);
        Self { settings, cancel }
    }

    /// Context cancelled once `cancel` observes `true`
    ///
    pub fn with_cancellation(settings: Settings, cancel: watch::Receiver<bool>) -> Self {
        Self { settings, cancel }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Resolves once the context is cancelled; pends forever if the sender
    /// went away without cancelling.
    ///
    pub async fn cancelled(&self) {
        let mut cancel = self.cancel.clone();
        let closed = cancel.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            future::pending::<()>().await;
        }
    }
}
