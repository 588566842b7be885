// src/exec/pool.rs

//! Fixed-size worker pool that runs stage invocations.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::dag::invocation::{Completion, StageInvocation};
use crate::errors::{ErrorKind, PipelineError, Result, StageFailure};
use crate::exec::handle::TaskHandle;
use crate::stage::{StageFunction, StageRegistry};

/// Work item travelling through the pool's queue.
struct Job {
    invocation: StageInvocation,
    func: Arc<dyn StageFunction>,
    done: watch::Sender<Option<Completion>>,
}

#[derive(Debug, Default)]
struct PoolCounters {
    submitted: AtomicUsize,
    completed: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
}

/// Point-in-time view of the pool's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub workers: usize,
    pub submitted: usize,
    pub completed: usize,
    pub running: usize,
    /// Highest number of stage functions observed running at once.
    pub peak: usize,
}

/// A fixed number of workers pulling invocations from one FIFO queue.
///
/// Each worker runs one stage function at a time on Tokio's blocking thread
/// pool, so at most `workers` stage functions run simultaneously no matter
/// how many invocations are queued. A failing or panicking stage function
/// only fails its own handle.
///
/// Must be created inside a Tokio runtime.
pub struct WorkerPool {
    tx: mpsc::UnboundedSender<Job>,
    registry: StageRegistry,
    counters: Arc<PoolCounters>,
    workers: Vec<JoinHandle<()>>,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("registry", &self.registry)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    /// Spawn `size` workers serving the stages in `registry`.
    pub fn new(size: usize, registry: StageRegistry) -> Result<Self> {
        if size == 0 {
            return Err(PipelineError::ConfigError(
                "worker pool size must be >= 1 (got 0)".to_string(),
            ));
        }

        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        let queue = Arc::new(Mutex::new(rx));
        let counters = Arc::new(PoolCounters::default());

        let workers = (0..size)
            .map(|worker| {
                let queue = Arc::clone(&queue);
                let counters = Arc::clone(&counters);
                tokio::spawn(worker_loop(worker, queue, counters))
            })
            .collect();

        info!(workers = size, stages = ?registry.stages().collect::<Vec<_>>(), "worker pool started");

        Ok(Self {
            tx,
            registry,
            counters,
            workers,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Queue `invocation` and return a handle to its eventual completion.
    pub fn submit(&self, invocation: StageInvocation) -> Result<TaskHandle> {
        let func = self
            .registry
            .get(invocation.stage)
            .ok_or(PipelineError::UnknownStage(invocation.stage))?;

        let (done, rx) = watch::channel(None);
        let handle = TaskHandle::new(&invocation, rx);

        debug!(
            item = %invocation.item,
            stage = %invocation.stage,
            seq = invocation.seq,
            "queueing stage invocation"
        );

        self.tx
            .send(Job {
                invocation,
                func,
                done,
            })
            .map_err(|_| PipelineError::PoolClosed)?;
        self.counters.submitted.fetch_add(1, Ordering::SeqCst);

        Ok(handle)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.workers.len(),
            submitted: self.counters.submitted.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::SeqCst),
            running: self.counters.running.load(Ordering::SeqCst),
            peak: self.counters.peak.load(Ordering::SeqCst),
        }
    }

    /// Restart peak tracking from the number of jobs running right now.
    pub fn reset_peak(&self) {
        let running = self.counters.running.load(Ordering::SeqCst);
        self.counters.peak.store(running, Ordering::SeqCst);
    }

    /// Close the queue, let workers drain what is already queued, and wait
    /// for them to exit.
    pub async fn shutdown(self) {
        let WorkerPool { tx, workers, .. } = self;
        drop(tx);

        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "worker task ended abnormally");
            }
        }
        info!("worker pool shut down");
    }
}

async fn worker_loop(
    worker: usize,
    queue: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>,
    counters: Arc<PoolCounters>,
) {
    debug!(worker, "worker started");

    loop {
        // Holding the lock across `recv` keeps dispatch strictly FIFO.
        let job = {
            let mut rx = queue.lock().await;
            rx.recv().await
        };

        match job {
            Some(job) => run_job(worker, job, &counters).await,
            None => break,
        }
    }

    debug!(worker, "worker finished (queue closed)");
}

async fn run_job(worker: usize, job: Job, counters: &PoolCounters) {
    let Job {
        invocation,
        func,
        done,
    } = job;
    let StageInvocation {
        item,
        stage,
        seq,
        input,
    } = invocation;

    let running = counters.running.fetch_add(1, Ordering::SeqCst) + 1;
    counters.peak.fetch_max(running, Ordering::SeqCst);
    let started_at = Instant::now();
    info!(worker, item = %item, stage = %stage, seq, "stage started");

    let call_item = item.clone();
    let joined = tokio::task::spawn_blocking(move || func.run(&call_item, &input)).await;

    let finished_at = Instant::now();
    counters.running.fetch_sub(1, Ordering::SeqCst);
    counters.completed.fetch_add(1, Ordering::SeqCst);

    let outcome = match joined {
        Ok(Ok(path)) => {
            info!(
                worker,
                item = %item,
                stage = %stage,
                seq,
                output = %path.display(),
                elapsed_ms = finished_at.duration_since(started_at).as_millis() as u64,
                "stage succeeded"
            );
            Ok(path)
        }
        Ok(Err(kind)) => {
            warn!(worker, item = %item, stage = %stage, seq, kind = kind.name(), error = %kind, "stage failed");
            Err(StageFailure::new(item.clone(), stage, kind))
        }
        Err(e) => {
            let message = join_error_message(e);
            warn!(worker, item = %item, stage = %stage, seq, panic = %message, "stage function panicked");
            Err(StageFailure::new(item.clone(), stage, ErrorKind::Panicked(message)))
        }
    };

    done.send_replace(Some(Completion {
        item,
        stage,
        seq,
        started_at,
        finished_at,
        outcome,
    }));
}

fn join_error_message(e: JoinError) -> String {
    if !e.is_panic() {
        return e.to_string();
    }
    let payload: Box<dyn Any + Send> = e.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
