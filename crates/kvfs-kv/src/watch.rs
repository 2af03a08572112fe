//! Per-key change streams.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::types::KvEvent;

/// Stream of changes to a single key.
///
/// Wraps a bucket-wide broadcast receiver and filters it down to one key.
/// A watcher only reports changes made after it was created.
#[derive(Debug)]
pub struct KvWatcher {
    key: String,
    events: broadcast::Receiver<KvEvent>,
}

impl KvWatcher {
    /// Watch `key` on the given bucket-wide event channel.
    pub fn new(key: impl Into<String>, events: broadcast::Receiver<KvEvent>) -> Self {
        Self {
            key: key.into(),
            events,
        }
    }

    /// The watched key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Wait for the next change to the watched key.
    ///
    /// Returns `None` once the stream can no longer be trusted: the bucket
    /// went away, or the watcher fell behind and events were dropped. Callers
    /// should fall back to reading the key directly.
    pub async fn next(&mut self) -> Option<KvEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) if event.key == self.key => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(key = %self.key, skipped, "watcher lagged");
                    return None;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KvOperation;

    fn event(key: &str, revision: u64, op: KvOperation) -> KvEvent {
        KvEvent {
            key: key.to_string(),
            revision,
            op,
        }
    }

    #[tokio::test]
    async fn filters_other_keys() {
        let (tx, rx) = broadcast::channel(16);
        let mut watcher = KvWatcher::new("a", rx);

        tx.send(event("b", 1, KvOperation::Put)).unwrap();
        tx.send(event("a", 2, KvOperation::Delete)).unwrap();

        let got = watcher.next().await.unwrap();
        assert_eq!(got.key, "a");
        assert_eq!(got.op, KvOperation::Delete);
    }

    #[tokio::test]
    async fn closed_channel_ends_stream() {
        let (tx, rx) = broadcast::channel(4);
        let mut watcher = KvWatcher::new("a", rx);
        drop(tx);
        assert!(watcher.next().await.is_none());
    }

    #[tokio::test]
    async fn lag_ends_stream() {
        let (tx, rx) = broadcast::channel(2);
        let mut watcher = KvWatcher::new("a", rx);
        for revision in 0..5 {
            tx.send(event("a", revision, KvOperation::Put)).unwrap();
        }
        assert!(watcher.next().await.is_none());
    }
}
