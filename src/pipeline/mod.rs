// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Background producers and their cancellation.
//!
//! This module provides:
//! - `CancelToken`, a shared flag checked by long-running work
//! - `EpochWorker`, which runs jobs on threads and drops stale results
//! - The `ProcessingPipeline` and `RewriteService` producer traits
//!
//! A job carries the epoch that was current when it was submitted. It
//! publishes only if that epoch is still current, and the receiving side
//! checks again, so a result for a file that is no longer open is never
//! applied.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::PipelineError;
use crate::model::{AlternativeLayer, SongDataFile};

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
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

/// Producer of an initial song data record from audio
///
/// Transcription, separation and chord detection live behind this trait.
pub trait ProcessingPipeline: Send + Sync {
    /// Analyze `audio`, checking `cancel` between stages
    fn process(&self, audio: &Path, cancel: &CancelToken) -> Result<SongDataFile, PipelineError>;
}

/// Producer of an alternative word/chord layer from an existing song
pub trait RewriteService: Send + Sync {
    fn rewrite(
        &self,
        song: &SongDataFile,
        api_key: &str,
        cancel: &CancelToken,
    ) -> Result<AlternativeLayer, PipelineError>;
}

/// Runs one kind of background job, keeping only current-epoch results
pub struct EpochWorker<T> {
    name: &'static str,
    epoch: Arc<AtomicU64>,
    cancel: CancelToken,
    result_tx: Sender<(u64, T)>,
    result_rx: Receiver<(u64, T)>,
}

impl<T: Send + 'static> EpochWorker<T> {
    pub fn new(name: &'static str) -> Self {
        let (result_tx, result_rx) = mpsc::channel();
        Self {
            name,
            epoch: Arc::new(AtomicU64::new(0)),
            cancel: CancelToken::new(),
            result_tx,
            result_rx,
        }
    }

    /// Epoch that results must carry to be accepted
    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Invalidate in-flight jobs: cancel them and advance the epoch
    pub fn supersede(&mut self) -> u64 {
        self.cancel.cancel();
        self.cancel = CancelToken::new();
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Run `job` on a new thread, superseding any job already running
    ///
    /// Returns the epoch the job belongs to.
    pub fn submit<F>(&mut self, job: F) -> u64
    where
        F: FnOnce(&CancelToken) -> T + Send + 'static,
    {
        let job_epoch = self.supersede();
        let cancel = self.cancel.clone();
        let current = Arc::clone(&self.epoch);
        let tx = self.result_tx.clone();
        let name = self.name;

        std::thread::spawn(move || {
            let result = job(&cancel);
            if cancel.is_cancelled() || current.load(Ordering::SeqCst) != job_epoch {
                debug!("Discarding stale {} result from epoch {}", name, job_epoch);
                return;
            }
            let _ = tx.send((job_epoch, result));
        });

        job_epoch
    }

    /// Next current result, if any (non-blocking)
    pub fn try_recv(&self) -> Option<T> {
        while let Ok((epoch, result)) = self.result_rx.try_recv() {
            if let Some(result) = self.accept(epoch, result) {
                return Some(result);
            }
        }
        None
    }

    /// Wait up to `timeout` for a current result
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            let (epoch, result) = self.result_rx.recv_timeout(remaining).ok()?;
            if let Some(result) = self.accept(epoch, result) {
                return Some(result);
            }
        }
    }

    fn accept(&self, epoch: u64, result: T) -> Option<T> {
        if epoch == self.current_epoch() {
            Some(result)
        } else {
            debug!("Dropping stale {} result from epoch {}", self.name, epoch);
            None
        }
    }
}

impl<T> Drop for EpochWorker<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_submit_publishes_result() {
        let mut worker = EpochWorker::new("test");
        let epoch = worker.submit(|_| 42);
        assert_eq!(epoch, 1);
        assert_eq!(worker.recv_timeout(Duration::from_secs(2)), Some(42));
    }

    #[test]
    fn test_superseded_job_is_discarded() {
        let mut worker = EpochWorker::new("test");
        let (release_tx, release_rx) = channel::<()>();

        // First job blocks until released, after it has been superseded
        worker.submit(move |_| {
            let _ = release_rx.recv();
            "stale"
        });
        worker.submit(|_| "fresh");
        release_tx.send(()).unwrap();

        assert_eq!(worker.recv_timeout(Duration::from_secs(2)), Some("fresh"));
        assert_eq!(worker.recv_timeout(Duration::from_millis(200)), None);
    }

    #[test]
    fn test_supersede_cancels_token() {
        let mut worker = EpochWorker::new("test");
        let (seen_tx, seen_rx) = channel();
        worker.submit(move |cancel| {
            while !cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
            let _ = seen_tx.send(());
        });
        worker.supersede();
        assert!(seen_rx.recv_timeout(Duration::from_secs(2)).is_ok());
        assert_eq!(worker.try_recv(), None::<()>);
    }

    #[test]
    fn test_receiver_rechecks_epoch() {
        let worker: EpochWorker<u32> = EpochWorker::new("test");
        // Simulate a result that raced past the publish check
        worker.result_tx.send((7, 1)).unwrap();
        assert_eq!(worker.try_recv(), None);
    }
}
