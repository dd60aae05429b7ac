//! Periodic scheduled cycle.
//!
//! Runs `Processor::run_scheduled_cycle` on a fixed interval from a
//! background thread and accepts manual triggers over a broadcast channel.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::pipeline::Processor;

pub struct Scheduler {
    processor: Arc<Processor>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    trigger_tx: broadcast::Sender<()>,
    cycles: Arc<AtomicUsize>,
}

impl Scheduler {
    pub fn new(processor: Arc<Processor>, interval: Duration) -> Self {
        let (trigger_tx, _) = broadcast::channel(16);
        Self {
            processor,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
            trigger_tx,
            cycles: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sender for manual cycle requests from other threads.
    pub fn trigger_sender(&self) -> broadcast::Sender<()> {
        self.trigger_tx.clone()
    }

    /// Requests an immediate cycle. Returns `false` when the loop is not
    /// running.
    pub fn trigger(&self) -> bool {
        self.trigger_tx.send(()).is_ok()
    }

    /// Number of cycles finished so far, failed ones included.
    pub fn cycles_run(&self) -> usize {
        self.cycles.load(Ordering::Acquire)
    }

    /// Starts the loop in a background thread. The first cycle runs after
    /// one full interval or on the first trigger.
    pub fn start(&self) -> JoinHandle<()> {
        let processor = Arc::clone(&self.processor);
        let shutdown = Arc::clone(&self.shutdown);
        let cycles = Arc::clone(&self.cycles);
        let interval = self.interval;
        let mut trigger_rx = self.trigger_tx.subscribe();

        std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    log::error!("Failed to start scheduler runtime: {}", e);
                    return;
                }
            };

            rt.block_on(async {
                let mut interval_timer = tokio::time::interval(interval);
                interval_timer.tick().await; // skip immediate first tick

                loop {
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    tokio::select! {
                        _ = interval_timer.tick() => {},
                        Ok(()) = trigger_rx.recv() => {
                            log::info!("Manual preservation cycle triggered");
                        },
                    }

                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    let worker = Arc::clone(&processor);
                    match tokio::task::spawn_blocking(move || worker.run_scheduled_cycle()).await {
                        Ok(Ok(report)) => log::info!(
                            "Scheduled cycle {}: {} processed, {} transfers and {} ingests updated",
                            report.status,
                            report.queue.processed,
                            report.transfers.updated,
                            report.ingests.updated
                        ),
                        Ok(Err(e)) => log::error!("Scheduled cycle failed: {}", e),
                        Err(e) => log::error!("Scheduled cycle panicked: {}", e),
                    }
                    cycles.fetch_add(1, Ordering::AcqRel);
                }
            });

            log::debug!("Scheduler stopped");
        })
    }

    /// Signals the loop to stop and wakes it up. An in-progress cycle is
    /// allowed to finish.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        let _ = self.trigger_tx.send(());
    }
}
