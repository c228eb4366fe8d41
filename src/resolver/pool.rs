// src/resolver/pool.rs
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::lookup::Lookup;
use super::types::{HostEntry, ResolveResult};

/// Smallest capacity tokio channels allow; a send waits for the receiver
/// almost immediately, so slow consumers throttle producers.
const CHANNEL_CAPACITY: usize = 1;

/// Fixed-size pool of resolution workers.
///
/// Tasks go in through [`ResolverPool::tasks`], results come out of
/// [`ResolverPool::results`]. Dropping every task sender lets the workers
/// drain and exit; the results channel closes only after all of them have
/// finished.
pub struct ResolverPool {
    pub tasks: mpsc::Sender<HostEntry>,
    pub results: mpsc::Receiver<ResolveResult>,
    coordinator: JoinHandle<()>,
}

impl ResolverPool {
    /// Start `workers` workers. The pool accepts tasks immediately.
    pub fn new(lookup: Arc<dyn Lookup>, workers: usize) -> Self {
        let workers = workers.max(1);
        let (task_tx, task_rx) = mpsc::channel::<HostEntry>(CHANNEL_CAPACITY);
        let (result_tx, result_rx) = mpsc::channel::<ResolveResult>(CHANNEL_CAPACITY);
        let task_rx = Arc::new(Mutex::new(task_rx));

        let handles: Vec<JoinHandle<()>> = (0..workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    lookup: Arc::clone(&lookup),
                    tasks: Arc::clone(&task_rx),
                    results: result_tx.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        info!("Started resolver pool with {} workers", workers);

        let coordinator = tokio::spawn(async move {
            for handle in handles {
                if let Err(e) = handle.await {
                    error!("Resolver worker failed: {}", e);
                }
            }
            // Last sender goes away here, closing the results channel
            drop(result_tx);
            debug!("All resolver workers finished");
        });

        Self {
            tasks: task_tx,
            results: result_rx,
            coordinator,
        }
    }

    /// Split into the submission side, the result side and the coordinator
    /// handle that completes once every worker has exited.
    pub fn into_parts(
        self,
    ) -> (
        mpsc::Sender<HostEntry>,
        mpsc::Receiver<ResolveResult>,
        JoinHandle<()>,
    ) {
        (self.tasks, self.results, self.coordinator)
    }
}

struct Worker {
    id: usize,
    lookup: Arc<dyn Lookup>,
    tasks: Arc<Mutex<mpsc::Receiver<HostEntry>>>,
    results: mpsc::Sender<ResolveResult>,
}

impl Worker {
    async fn run(self) {
        loop {
            // The lock is released before the lookup so workers resolve in parallel
            let task = { self.tasks.lock().await.recv().await };
            let Some(task) = task else {
                break;
            };

            let result = match self.lookup.lookup(&task.host).await {
                Err(e) => ResolveResult::error(task, e),
                Ok(ips) if ips.is_empty() => {
                    // No addresses and no error: nothing to classify
                    debug!("{} resolved to no addresses, dropping", task.host);
                    continue;
                }
                Ok(ips) => ResolveResult::alive(task, ips),
            };

            if self.results.send(result).await.is_err() {
                debug!("Worker {}: result channel closed, stopping", self.id);
                break;
            }
        }

        debug!("Worker {} finished", self.id);
    }
}
