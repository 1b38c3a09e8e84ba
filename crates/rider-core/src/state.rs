use crate::protocol::Snapshot;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared, read-mostly copy of the latest published [`Snapshot`].
///
/// The core loop is the only writer; HTTP handlers read.  `rev` is bumped
/// only when the snapshot content actually changes, so clients can use it
/// to skip redundant redraws.
#[derive(Clone, Default)]
pub struct SnapshotStore {
    inner: Arc<RwLock<Snapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Snapshot {
        self.inner.read().await.clone()
    }

    /// Store `next` if it differs from the current snapshot.  Returns the
    /// stored value (with its new `rev`) when something changed.
    pub async fn publish(&self, mut next: Snapshot) -> Option<Snapshot> {
        let mut current = self.inner.write().await;
        next.rev = current.rev;
        if *current == next {
            return None;
        }
        next.rev += 1;
        *current = next;
        Some(current.clone())
    }
}
