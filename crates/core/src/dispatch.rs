//! Hand-off from background workers to the interactive thread.
//!
//! Workers never touch on-screen state. They post closures through a
//! [`UiHandle`]; the interactive thread owns the [`UiQueue`] and runs those
//! closures when it drains the queue, so every callback runs on that thread.

use tokio::sync::mpsc;

type UiJob = Box<dyn FnOnce() + Send + 'static>;

/// Receiving end, owned by the interactive thread.
pub struct UiQueue {
    rx: mpsc::UnboundedReceiver<UiJob>,
    tx: mpsc::UnboundedSender<UiJob>,
}

/// Posting end, cloned into background tasks.
#[derive(Clone)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<UiJob>,
}

impl UiQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { rx, tx }
    }

    pub fn handle(&self) -> UiHandle {
        UiHandle { tx: self.tx.clone() }
    }

    /// Run every job already posted, without waiting. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Wait for the next job and run it. The queue holds its own sender, so
    /// this only returns once a job has run.
    pub async fn next(&mut self) {
        if let Some(job) = self.rx.recv().await {
            job();
        }
    }
}

impl Default for UiQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl UiHandle {
    /// Queue `job` for the interactive thread. Dropped with a debug log if
    /// the queue is gone.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) {
        if self.tx.send(Box::new(job)).is_err() {
            tracing::debug!("interactive queue closed, dropping job");
        }
    }
}
