//! Tokio driver for flow nodes.
//!
//! A [`NodeRuntime`] owns one node behind a single mutex and runs a
//! background task that sleeps until the node's next timer deadline, fires
//! due timers, and goes back to sleep. Input delivered through the runtime
//! wakes the task so newly armed timers are picked up.
//!
//! The node should be built with a [`TokioClock`] so that its deadlines and
//! the driver's sleeps share a time source.
//!
//! [`TokioClock`]: crate::infrastructure::clock::TokioClock

use crate::application::metrics::FlowMetrics;
use crate::application::node::FlowNode;
use crate::domain::message::{Input, Message};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::{oneshot, Notify};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, trace, warn};

/// Error returned when a runtime fails to shut down cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownError {
    /// `shutdown` was already called
    AlreadyShutdown,
    /// The driver task panicked
    DriverPanicked,
    /// The driver task was cancelled before it could stop
    DriverCancelled,
}

impl std::fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownError::AlreadyShutdown => write!(f, "runtime was already shut down"),
            ShutdownError::DriverPanicked => write!(f, "timer driver task panicked"),
            ShutdownError::DriverCancelled => write!(f, "timer driver task was cancelled"),
        }
    }
}

impl std::error::Error for ShutdownError {}

impl From<JoinError> for ShutdownError {
    fn from(err: JoinError) -> Self {
        if err.is_panic() {
            ShutdownError::DriverPanicked
        } else {
            ShutdownError::DriverCancelled
        }
    }
}

struct Driver {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// A flow node driven by a tokio task.
pub struct NodeRuntime<N>
where
    N: FlowNode + 'static,
{
    node: Arc<Mutex<N>>,
    wake: Arc<Notify>,
    driver: Mutex<Option<Driver>>,
    metrics: FlowMetrics,
}

impl<N> std::fmt::Debug for NodeRuntime<N>
where
    N: FlowNode + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRuntime")
            .field("running", &self.is_running())
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}

impl<N> NodeRuntime<N>
where
    N: FlowNode + 'static,
{
    /// Take ownership of `node` and start its timer driver.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn start(node: N) -> Self {
        let metrics = node.metrics().clone();
        let node = Arc::new(Mutex::new(node));
        let wake = Arc::new(Notify::new());
        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(drive(Arc::clone(&node), Arc::clone(&wake), stop_rx));

        Self {
            node,
            wake,
            driver: Mutex::new(Some(Driver { stop, task })),
            metrics,
        }
    }

    /// Deliver one wire message to the node.
    ///
    /// Returns false if the runtime was shut down; the message is then
    /// discarded.
    pub fn deliver(&self, message: Message) -> bool {
        self.while_running(|node| node.handle(message))
    }

    /// Deliver one decoded input event to the node.
    pub fn deliver_input(&self, input: Input) -> bool {
        self.while_running(|node| node.handle_input(input))
    }

    fn while_running(&self, f: impl FnOnce(&mut N)) -> bool {
        let driver = lock(&self.driver);
        if driver.is_none() {
            warn!("runtime is shut down, discarding input");
            return false;
        }
        {
            let mut node = lock(&self.node);
            f(&mut *node);
        }
        drop(driver);
        self.wake.notify_one();
        true
    }

    /// Run a closure against the node.
    ///
    /// Timers armed by the closure are picked up by the driver.
    pub fn with_node<R>(&self, f: impl FnOnce(&mut N) -> R) -> R {
        let result = {
            let mut node = lock(&self.node);
            f(&mut *node)
        };
        self.wake.notify_one();
        result
    }

    /// Node metrics.
    pub fn metrics(&self) -> &FlowMetrics {
        &self.metrics
    }

    /// Check whether the driver is still running.
    pub fn is_running(&self) -> bool {
        lock(&self.driver).is_some()
    }

    /// Stop the driver and drain the node.
    ///
    /// Every live topic is flushed before this returns, even if the driver
    /// task failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime was already shut down or the driver
    /// task did not finish cleanly.
    pub async fn shutdown(&self) -> Result<(), ShutdownError> {
        // Take the driver while holding the lock, then release it before awaiting
        let driver = lock(&self.driver).take();
        let Some(driver) = driver else {
            return Err(ShutdownError::AlreadyShutdown);
        };

        // The driver may already have exited; the drain below covers that.
        let _ = driver.stop.send(());
        let joined = driver.task.await;

        let drained = lock(&self.node).close();
        debug!(drained_topics = drained, "runtime stopped");
        joined.map_err(ShutdownError::from)
    }
}

impl<N> Drop for NodeRuntime<N>
where
    N: FlowNode + 'static,
{
    fn drop(&mut self) {
        if let Some(driver) = lock(&self.driver).take() {
            driver.task.abort();
            lock(&self.node).close();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn drive<N: FlowNode>(node: Arc<Mutex<N>>, wake: Arc<Notify>, mut stop: oneshot::Receiver<()>) {
    loop {
        let deadline = {
            let mut node = lock(&node);
            let fired = node.fire_due_timers();
            if fired > 0 {
                trace!(fired, "fired due timers");
            }
            node.next_deadline()
        };

        tokio::select! {
            _ = &mut stop => break,
            _ = wake.notified() => {}
            _ = sleep_until(deadline) => {}
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
