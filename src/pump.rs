//! Generic "pump between two endpoints" worker, §9 Design Notes.
//!
//! Every layer in the stack runs the same shape of long-lived background
//! worker: poll for one unit of work, move it (possibly transforming or
//! demultiplexing it), and back off briefly when there was nothing to do.
//! Expressing that once here, instead of once per layer, is what the design
//! calls out as collapsing roughly a third of the original source.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Suspension-point backoff used when a worker finds no work. Keeps every
/// loop a non-blocking poll, per §5.
pub const IDLE_BACKOFF: Duration = Duration::from_millis(5);

type BoxFuture = Pin<Box<dyn Future<Output = bool> + Send>>;

/// A cooperative run flag shared by every worker in the stack, checked at
/// the top of each loop iteration (§5 Scheduling model).
#[derive(Clone)]
pub struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    pub fn new() -> Self {
        RunFlag(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns one worker that repeatedly invokes `step`, which should attempt to
/// move a single unit of work and return whether it made progress. Returning
/// `false` triggers [`IDLE_BACKOFF`] before the next attempt.
pub fn spawn_worker<F>(run: RunFlag, mut step: F) -> JoinHandle<()>
where
    F: FnMut() -> BoxFuture + Send + 'static,
{
    tokio::spawn(async move {
        while run.is_running() {
            let progressed = step().await;
            if !progressed {
                tokio::time::sleep(IDLE_BACKOFF).await;
            }
        }
    })
}

/// Boxes an async block into the shape [`spawn_worker`] expects.
#[macro_export]
macro_rules! pump_step {
    ($body:expr) => {
        Box::pin(async move { $body }) as std::pin::Pin<Box<dyn std::future::Future<Output = bool> + Send>>
    };
}
