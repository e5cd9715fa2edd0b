//! External cancellation of a run

use std::sync::Arc;

use tokio::sync::watch;

/// Signal that stops a run from launching further tasks
///
/// Clones share the same underlying flag. Raising it is permanent.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    /// Create a signal that has not been raised
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Raise the signal
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Whether the signal has been raised
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Wait until the signal is raised
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this only returns once raised
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}
