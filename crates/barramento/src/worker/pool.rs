use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};

use crate::error::WorkerError;
use crate::pipeline::Processor;
use crate::worker::job::{Job, JobResult};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Fixed set of threads running `process_item` for claimed queue entries.
///
/// Both channels are bounded to `worker_count * 2`. A caller that keeps at
/// most [`capacity`](Self::capacity) jobs in flight and drains results as it
/// submits never blocks on a full channel.
pub struct WorkerPool {
    jobs: Sender<Job>,
    results: Receiver<JobResult>,
    handles: Vec<JoinHandle<()>>,
    stopping: Arc<AtomicBool>,
    worker_count: usize,
}

/// What each worker thread owns.
struct PreservationWorker {
    id: usize,
    jobs: Receiver<Job>,
    results: Sender<JobResult>,
    stopping: Arc<AtomicBool>,
    processor: Arc<Processor>,
}

impl WorkerPool {
    /// A `worker_count` of 0 is treated as 1. Threads the OS refuses to
    /// spawn are logged and the pool runs with the ones it got; with none
    /// at all every `submit` fails and the caller runs jobs itself.
    pub fn new(processor: Arc<Processor>, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (jobs, job_rx) = bounded::<Job>(worker_count * 2);
        let (result_tx, results) = bounded::<JobResult>(worker_count * 2);
        let stopping = Arc::new(AtomicBool::new(false));

        let handles: Vec<JoinHandle<()>> = (0..worker_count)
            .filter_map(|id| {
                let worker = PreservationWorker {
                    id,
                    jobs: job_rx.clone(),
                    results: result_tx.clone(),
                    stopping: Arc::clone(&stopping),
                    processor: Arc::clone(&processor),
                };
                thread::Builder::new()
                    .name(format!("preservation-worker-{}", id))
                    .spawn(move || worker.run())
                    .map_err(|e| warn!("Could not start preservation worker {}: {}", id, e))
                    .ok()
            })
            .collect();

        if handles.is_empty() {
            stopping.store(true, Ordering::Release);
        }
        info!("Started {} of {} preservation workers", handles.len(), worker_count);

        Self {
            jobs,
            results,
            worker_count: handles.len().max(1),
            handles,
            stopping,
        }
    }

    /// Jobs the caller may keep in flight without blocking.
    pub fn capacity(&self) -> usize {
        self.worker_count
    }

    pub fn submit(&self, job: Job) -> Result<(), WorkerError> {
        if self.stopping.load(Ordering::Acquire) {
            return Err(WorkerError::ChannelClosed);
        }
        self.jobs.send(job).map_err(|_| WorkerError::ChannelClosed)
    }

    /// Blocks for the next finished job. `None` once every worker is gone.
    pub fn recv_result(&self) -> Option<JobResult> {
        self.results.recv().ok()
    }

    /// Tells workers to exit after their current job.
    pub fn shutdown(&self) {
        debug!("Stopping preservation workers");
        self.stopping.store(true, Ordering::Release);
    }

    pub fn wait(self) {
        drop(self.jobs);

        for handle in self.handles {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if let Err(e) = handle.join() {
                error!("{} panicked: {:?}", name, e);
            }
        }
        debug!("All preservation workers stopped");
    }
}

impl PreservationWorker {
    fn run(self) {
        debug!("Preservation worker {} started", self.id);

        while !self.stopping.load(Ordering::Acquire) {
            let job = match self.jobs.recv_timeout(POLL_INTERVAL) {
                Ok(job) => job,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            debug!(
                "Worker {} preserving item {} (collection {}, entry {})",
                self.id, job.item_id, job.collection_id, job.entry_id
            );
            let result = self.processor.run_job(&job);

            if self.results.send(result).is_err() {
                error!("Worker {}: result channel closed", self.id);
                break;
            }
        }

        debug!("Preservation worker {} stopped", self.id);
    }
}
