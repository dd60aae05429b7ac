use crate::db::queue_repo::QueueRow;
use crate::pipeline::QueueDetail;

/// A claimed queue entry handed to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub entry_id: i64,
    pub item_id: u64,
    pub collection_id: u64,
    pub batch_id: Option<String>,
}

impl From<&QueueRow> for Job {
    fn from(row: &QueueRow) -> Self {
        Self {
            entry_id: row.id,
            item_id: row.item_id,
            collection_id: row.collection_id,
            batch_id: row.batch_id.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobResult {
    pub entry_id: i64,
    pub detail: QueueDetail,
}

impl JobResult {
    pub fn success(&self) -> bool {
        self.detail.status == crate::pipeline::DetailStatus::Success
    }
}
