//! Draft-record log — bounded, append-only observability sink.
//!
//! One record per completed run, newest first, read-only to the UI.
//! Oldest entries are evicted once capacity is reached.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::pipeline::types::DraftRecord;

/// Default retention.
pub const DEFAULT_CAPACITY: usize = 50;

/// In-memory bounded log of published draft records.
pub struct DraftLog {
    entries: RwLock<VecDeque<DraftRecord>>,
    capacity: usize,
}

impl DraftLog {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        })
    }

    /// Publish a record, evicting the oldest entry at capacity.
    pub async fn publish(&self, record: DraftRecord) {
        info!(
            message_id = %record.message_id,
            sender = %record.sender,
            subject = %record.subject,
            "Draft record published"
        );
        let mut entries = self.entries.write().await;
        entries.push_front(record);
        entries.truncate(self.capacity);
    }

    /// All retained records, newest first.
    pub async fn recent(&self) -> Vec<DraftRecord> {
        self.entries.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
