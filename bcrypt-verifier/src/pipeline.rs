use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::queue::{DEFAULT_QUEUE_CAPACITY, WorkQueue};
use crate::record::{CandidateRecord, LoadedRecords, TargetPassword};
use crate::shutdown::ShutdownController;
use crate::sink::ResultSink;
use crate::worker::{DEFAULT_WORKERS, WorkerStats, check_record, worker};

/// Default time allowed for in-flight comparisons after a shutdown request.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Number of concurrent verification workers.
    pub workers: usize,
    /// Records buffered between the loader and the workers.
    pub queue_capacity: usize,
    /// How long to wait for running comparisons once shutdown is requested.
    pub shutdown_grace: Duration,
    /// Install SIGINT/SIGTERM handlers for the duration of [`Pipeline::run`].
    pub handle_signals: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            handle_signals: false,
        }
    }
}

impl PipelineConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_shutdown_grace(mut self, shutdown_grace: Duration) -> Self {
        self.shutdown_grace = shutdown_grace;
        self
    }

    pub fn with_signal_handling(mut self, handle_signals: bool) -> Self {
        self.handle_signals = handle_signals;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.workers == 0 {
            return Err(Error::InvalidArgs("worker count must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(Error::InvalidArgs("queue capacity must be at least 1"));
        }
        Ok(())
    }
}

/// Summary of one run, assembled after the run ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStatistics {
    /// Well-formed records accepted from the input.
    pub loaded: u64,
    /// Input lines dropped for having the wrong field count.
    pub skipped: u64,
    /// Comparisons completed.
    pub verified: u64,
    /// Comparisons that succeeded.
    pub matched: u64,
    /// Matches written to the result file.
    pub written: u64,
    /// Matches lost to write errors.
    pub write_failures: u64,
    /// Wall-clock time spent verifying.
    pub elapsed: Duration,
    /// The run was cut short by a shutdown request.
    pub interrupted: bool,
}

/// Drives records from a loader through the verification workers into a
/// [`ResultSink`].
pub struct Pipeline<W: Write> {
    config: PipelineConfig,
    sink: Arc<ResultSink<W>>,
    shutdown: ShutdownController,
    progress: Arc<AtomicU64>,
}

impl<W: Write + Send + 'static> Pipeline<W> {
    pub fn new(config: PipelineConfig, sink: ResultSink<W>) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            config,
            sink: Arc::new(sink),
            shutdown: ShutdownController::new(),
            progress: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Replaces the pipeline's shutdown controller with a shared one.
    pub fn with_shutdown(mut self, shutdown: ShutdownController) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn shutdown(&self) -> &ShutdownController {
        &self.shutdown
    }

    /// Counter of completed comparisons, for progress reporting.
    pub fn progress(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.progress)
    }

    pub fn sink(&self) -> &ResultSink<W> {
        &self.sink
    }

    /// Verifies every record with the worker pool.
    ///
    /// Feeds the bounded queue, closes it once all records are in, and waits
    /// for the workers. If the shutdown controller fires, feeding stops,
    /// workers finish their current comparison, and anything still queued is
    /// abandoned. Workers still busy after the grace period are detached.
    pub async fn run(&self, password: &TargetPassword, loaded: LoadedRecords) -> RunStatistics {
        let start = Instant::now();
        let (written, failed) = (self.sink.written(), self.sink.failed());
        let cancel = self.shutdown.token();
        let listener = self.config.handle_signals.then(|| self.shutdown.listen());

        info!("Worker count: {}", self.config.workers);
        let queue = Arc::new(WorkQueue::new(self.config.queue_capacity));
        let mut workers = JoinSet::new();
        for id in 0..self.config.workers {
            workers.spawn(worker(
                id,
                Arc::clone(&queue),
                password.clone(),
                Arc::clone(&self.sink),
                cancel.clone(),
                Arc::clone(&self.progress),
            ));
        }

        let mut stats = RunStatistics {
            loaded: loaded.len() as u64,
            skipped: loaded.skipped,
            ..Default::default()
        };

        feed(&queue, loaded.records, &cancel).await;
        queue.close();

        let totals = self.join_workers(workers, &cancel).await;
        if let Some(listener) = listener {
            listener.abort();
        }
        debug!(enqueued = queue.enqueued(), dequeued = queue.dequeued(), "work queue released");

        stats.verified = totals.verified;
        stats.matched = totals.matched;
        stats.written = self.sink.written() - written;
        stats.write_failures = self.sink.failed() - failed;
        stats.elapsed = start.elapsed();
        stats.interrupted = cancel.is_cancelled();
        stats
    }

    /// Verifies every record one after another on the calling thread.
    ///
    /// No queue, no pool and no shutdown handling; the reference the pooled
    /// mode is measured and tested against.
    pub fn run_sequential(&self, password: &TargetPassword, loaded: &LoadedRecords) -> RunStatistics {
        let start = Instant::now();
        let (written, failed) = (self.sink.written(), self.sink.failed());
        let mut stats = RunStatistics {
            loaded: loaded.len() as u64,
            skipped: loaded.skipped,
            ..Default::default()
        };

        for record in &loaded.records {
            if check_record(password, record, &self.sink) {
                stats.matched += 1;
            }
            stats.verified += 1;
            self.progress.fetch_add(1, Ordering::Relaxed);
        }

        stats.written = self.sink.written() - written;
        stats.write_failures = self.sink.failed() - failed;
        stats.elapsed = start.elapsed();
        stats
    }

    /// Closes the result sink and returns its writer. Matches reported after
    /// this point are dropped and counted as failures.
    pub fn finish(&self) -> Option<W> {
        self.sink.close()
    }

    async fn join_workers(
        &self,
        mut workers: JoinSet<WorkerStats>,
        cancel: &CancellationToken,
    ) -> WorkerStats {
        let mut totals = WorkerStats::default();
        let mut deadline: Option<tokio::time::Instant> = None;

        loop {
            let next = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, workers.join_next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            warn!(
                                remaining = workers.len(),
                                "grace period elapsed, abandoning in-flight comparisons"
                            );
                            workers.abort_all();
                            break;
                        }
                    }
                }
                None => {
                    let joined = tokio::select! {
                        next = workers.join_next() => Some(next),
                        _ = cancel.cancelled() => None,
                    };
                    match joined {
                        Some(next) => next,
                        None => {
                            deadline =
                                Some(tokio::time::Instant::now() + self.config.shutdown_grace);
                            continue;
                        }
                    }
                }
            };

            match next {
                Some(Ok(stats)) => {
                    totals.verified += stats.verified;
                    totals.matched += stats.matched;
                }
                Some(Err(e)) => warn!(error = %e, "worker task failed"),
                None => break,
            }
        }

        totals
    }
}

/// Pushes records into the queue until they run out or the run is cancelled.
async fn feed(queue: &WorkQueue, records: Vec<CandidateRecord>, cancel: &CancellationToken) {
    for record in records {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = queue.enqueue(record) => {
                if result.is_err() {
                    return;
                }
            }
        }
    }
}
