//! Collection-level operations: enqueueing, queue draining and the
//! scheduled cycle.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, info_span, warn};

use crate::db::object_repo;
use crate::error::{Result, ValidationError};
use crate::queue::QueueManager;
use crate::worker::{Job, JobResult, WorkerPool};

use super::report::{
    CollectionStats, ConnectionReport, ConnectionStatus, CycleReport, DetailStatus,
    EnqueueReport, PollReport, QueueDetail, QueueReport,
};
use super::runner::Processor;

impl Processor {
    /// Queues every item of an enabled collection under a fresh batch id.
    pub fn enqueue_collection(&self, collection_id: u64, force: bool) -> Result<EnqueueReport> {
        let _span = info_span!("enqueue_collection", collection_id, force).entered();

        if !self.validator.is_collection_enabled(collection_id) {
            return Err(ValidationError::Rejected {
                reasons: vec![format!(
                    "Collection {} is not enabled for preservation",
                    collection_id
                )],
            }
            .into());
        }

        let items = self.repository.list_all_items(collection_id)?;
        let batch_id = QueueManager::new_batch_id();

        let mut added = 0;
        for item in &items {
            if self.queue.enqueue(item.id, collection_id, Some(&batch_id), force)? {
                added += 1;
            }
        }

        let report = EnqueueReport {
            collection_id,
            total_items: items.len(),
            added_to_queue: added,
            skipped: items.len() - added,
            batch_id,
        };

        self.audit.info(
            "Items added to preservation queue",
            json!({
                "collection_id": collection_id,
                "batch_id": report.batch_id,
                "total_items": report.total_items,
                "added": report.added_to_queue,
                "skipped": report.skipped,
                "force": force,
            }),
        );
        Ok(report)
    }

    /// Claims up to `limit` due entries and runs each through
    /// `process_item`. With more than one worker configured the entries run
    /// on a worker pool.
    pub fn process_queue(self: &Arc<Self>, limit: usize) -> Result<QueueReport> {
        let _span = info_span!("process_queue", limit).entered();

        let entries = self.queue.claim_batch(limit)?;
        if entries.is_empty() {
            return Ok(QueueReport::default());
        }

        let jobs: Vec<Job> = entries.iter().map(Job::from).collect();
        let workers = self.config.worker_count.min(jobs.len());
        let report = if workers > 1 {
            self.drain_parallel(jobs, workers)
        } else {
            let mut report = QueueReport::default();
            for job in &jobs {
                report.push(self.run_job(job).detail);
            }
            report
        };

        self.audit.info(
            "Queue processed",
            json!({
                "processed": report.processed,
                "successful": report.successful,
                "failed": report.failed,
            }),
        );
        Ok(report)
    }

    fn drain_parallel(self: &Arc<Self>, jobs: Vec<Job>, workers: usize) -> QueueReport {
        let pool = WorkerPool::new(Arc::clone(self), workers);
        let mut report = QueueReport::default();
        let mut pending = jobs.into_iter();
        let mut in_flight = 0usize;

        while in_flight < pool.capacity() {
            let Some(job) = pending.next() else { break };
            in_flight += self.dispatch(&pool, job, &mut report);
        }

        while in_flight > 0 {
            let Some(result) = pool.recv_result() else {
                warn!(lost = in_flight, "Worker pool closed with jobs in flight");
                break;
            };
            in_flight -= 1;
            if !result.success() {
                debug!(entry_id = result.entry_id, "Queue entry failed on worker");
            }
            report.push(result.detail);

            if let Some(job) = pending.next() {
                in_flight += self.dispatch(&pool, job, &mut report);
            }
        }

        // Anything left after the pool closed still runs, on this thread.
        for job in pending {
            report.push(self.run_job(&job).detail);
        }

        pool.shutdown();
        pool.wait();
        report
    }

    /// Hands a job to the pool, or runs it inline when the pool refuses it.
    /// Returns the number of jobs now in flight on the pool.
    fn dispatch(&self, pool: &WorkerPool, job: Job, report: &mut QueueReport) -> usize {
        let fallback = job.clone();
        match pool.submit(job) {
            Ok(()) => 1,
            Err(e) => {
                warn!(item_id = fallback.item_id, error = %e, "Running job inline");
                report.push(self.run_job(&fallback).detail);
                0
            }
        }
    }

    /// Runs one claimed entry and settles it in the queue: deleted on
    /// success, counted as a failed attempt otherwise.
    pub fn run_job(&self, job: &Job) -> JobResult {
        let detail = match self.process_item(job.item_id, job.collection_id, job.batch_id.as_deref()) {
            Ok(result) => {
                match self.queue.complete(job.entry_id) {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!(entry_id = job.entry_id, "Finished queue entry was no longer claimed")
                    }
                    Err(e) => {
                        warn!(entry_id = job.entry_id, error = %e, "Failed to remove finished queue entry")
                    }
                }
                QueueDetail {
                    item_id: job.item_id,
                    collection_id: job.collection_id,
                    status: DetailStatus::Success,
                    sip_id: Some(result.sip_id),
                    message: None,
                }
            }
            Err(e) => {
                let message = e.to_string();
                if let Err(db_err) = self.queue.mark_failed(job.entry_id, &message) {
                    warn!(entry_id = job.entry_id, error = %db_err, "Failed to record queue failure");
                }
                QueueDetail {
                    item_id: job.item_id,
                    collection_id: job.collection_id,
                    status: DetailStatus::Failed,
                    sip_id: None,
                    message: Some(message),
                }
            }
        };

        JobResult {
            entry_id: job.entry_id,
            detail,
        }
    }

    /// One time-driven pass: release stale claims, enqueue every enabled
    /// collection, drain the scheduled batch, then poll transfers and
    /// ingests once.
    pub fn run_scheduled_cycle(self: &Arc<Self>) -> Result<CycleReport> {
        let _span = info_span!("scheduled_cycle").entered();

        let recovered = self.queue.recover_stale(self.config.stale_processing_after)?;

        if self.config.enabled_collections.is_empty() {
            info!("No collections enabled for preservation");
            return Ok(CycleReport {
                status: "no_collections",
                recovered,
                collections: Vec::new(),
                queue: QueueReport::default(),
                transfers: PollReport::default(),
                ingests: PollReport::default(),
            });
        }

        let mut collections = Vec::new();
        for &collection_id in &self.config.enabled_collections {
            match self.enqueue_collection(collection_id, false) {
                Ok(report) => collections.push(report),
                Err(e) => self.audit.error(
                    "Failed to enqueue collection",
                    json!({
                        "collection_id": collection_id,
                        "error": e.to_string(),
                        "kind": e.kind(),
                    }),
                ),
            }
        }

        let queue = self.process_queue(self.config.scheduled_batch_limit)?;
        let transfers = self.check_transfers(self.config.poll_limit)?;
        let ingests = self.check_ingests(self.config.poll_limit)?;

        self.audit.info(
            "Scheduled cycle finished",
            json!({
                "recovered": recovered,
                "collections": collections.len(),
                "processed": queue.processed,
                "failed": queue.failed,
                "transfers_updated": transfers.updated,
                "ingests_updated": ingests.updated,
            }),
        );

        Ok(CycleReport {
            status: "completed",
            recovered,
            collections,
            queue,
            transfers,
            ingests,
        })
    }

    /// Object and queue counts by status, overall or for one collection.
    pub fn collection_stats(&self, collection_id: Option<u64>) -> Result<CollectionStats> {
        let objects: BTreeMap<String, u64> =
            object_repo::count_by_status(&self.db, collection_id)?.into_iter().collect();
        let queue: BTreeMap<String, u64> = self.queue.counts(collection_id)?.into_iter().collect();

        Ok(CollectionStats {
            collection_id,
            total_objects: objects.values().sum(),
            objects,
            queue,
        })
    }

    pub fn test_connections(&self) -> ConnectionReport {
        ConnectionReport {
            repository: ConnectionStatus::from_result(self.repository.test_connection()),
            backend: ConnectionStatus::from_result(self.backend.test_connection()),
        }
    }
}

