//! Cancellation handle shared by every retrieval operation.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// External cancellation signal with an optional deadline.
///
/// Clones observe the same flag, so cancelling any clone cancels all of them.
#[derive(Debug, Clone)]
pub struct Cancel {
    flag: Arc<watch::Sender<bool>>,
    deadline: Option<Instant>,
}

impl Default for Cancel {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancel {
    /// A handle that only ends when [`Cancel::cancel`] is called.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            flag: Arc::new(tx),
            deadline: None,
        }
    }

    /// A handle that also ends once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            ..Self::new()
        }
    }

    /// A clone sharing this handle's flag, with a deadline no later than `timeout` from now.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            flag: Arc::clone(&self.flag),
            deadline: Some(self.deadline.map_or(deadline, |d| d.min(deadline))),
        }
    }

    pub fn cancel(&self) {
        self.flag.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.flag.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves once the handle is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        let mut rx = self.flag.subscribe();
        let flagged = async move {
            // The sender lives as long as `self`, so this only returns on cancel.
            let _ = rx.wait_for(|cancelled| *cancelled).await;
        };
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = flagged => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => flagged.await,
        }
    }
}
