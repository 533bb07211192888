//! Runs one unit of work on its own thread and hands the result back through
//! a channel.
//!
//! Dropping or cancelling the [`Pending`] handle abandons interest: the work
//! still runs to completion but its result is discarded instead of sent.

use crate::error::{MediaError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct Pending<T> {
    result_rx: Receiver<T>,
    token: CancellationToken,
}

impl<T: Send + 'static> Pending<T> {
    pub fn spawn<F>(label: &'static str, work: F) -> Self
    where
        F: FnOnce(&CancellationToken) -> T + Send + 'static,
    {
        let (result_tx, result_rx) = mpsc::channel();
        let token = CancellationToken::new();
        let worker_token = token.clone();

        thread::spawn(move || {
            let result = work(&worker_token);
            if worker_token.is_cancelled() {
                debug!(task = label, "caller went away, dropping result");
                return;
            }
            let _ = result_tx.send(result);
        });

        Self { result_rx, token }
    }
}

impl<T> Pending<T> {
    /// Non-blocking poll. `Ok(None)` means the worker is still running; a
    /// worker that died without delivering is [`MediaError::Abandoned`].
    pub fn try_recv(&self) -> Result<Option<T>> {
        match self.result_rx.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(MediaError::Abandoned),
        }
    }

    /// Blocks until the worker delivers.
    pub fn wait(self) -> Result<T> {
        self.result_rx.recv().map_err(|_| MediaError::Abandoned)
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl<T> Drop for Pending<T> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
