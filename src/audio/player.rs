// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Segment player: one preview at a time.
//!
//! Each `play` runs on its own worker thread. Starting a new preview
//! cancels the previous worker and joins it before the new one is
//! spawned, so two previews never hold the device at once.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::PlaybackError;
use crate::pipeline::CancelToken;

use super::{AudioBackend, CpalBackend};

/// Playback status, tagged with the request it belongs to
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Started(u64),
    Finished(u64),
    Cancelled(u64),
    Failed(u64, PlaybackError),
}

impl PlaybackEvent {
    pub fn request(&self) -> u64 {
        match self {
            PlaybackEvent::Started(id)
            | PlaybackEvent::Finished(id)
            | PlaybackEvent::Cancelled(id)
            | PlaybackEvent::Failed(id, _) => *id,
        }
    }

    /// Whether this is the last event of its request
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PlaybackEvent::Started(_))
    }
}

struct ActivePlayback {
    cancel: CancelToken,
    handle: JoinHandle<()>,
}

/// Previews audio windows through an `AudioBackend`
pub struct SegmentPlayer {
    backend: Arc<dyn AudioBackend>,
    active: Option<ActivePlayback>,
    next_request: u64,
    event_tx: Sender<PlaybackEvent>,
    event_rx: Receiver<PlaybackEvent>,
}

impl SegmentPlayer {
    /// Player on the default cpal backend
    pub fn new() -> Self {
        Self::with_backend(Arc::new(CpalBackend::new()))
    }

    pub fn with_backend(backend: Arc<dyn AudioBackend>) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        Self {
            backend,
            active: None,
            next_request: 0,
            event_tx,
            event_rx,
        }
    }

    /// Play `duration` seconds of `path` from `start`
    ///
    /// Stops any current preview first. Returns the request id carried by
    /// this preview's events.
    pub fn play<P: AsRef<Path>>(&mut self, path: P, start: f64, duration: f64) -> u64 {
        self.stop();

        self.next_request += 1;
        let request = self.next_request;
        let path: PathBuf = path.as_ref().to_path_buf();
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let backend = Arc::clone(&self.backend);
        let tx = self.event_tx.clone();

        let handle = std::thread::spawn(move || {
            debug!("Preview {} of {:?} at {:.2}s for {:.2}s", request, path, start, duration);
            let _ = tx.send(PlaybackEvent::Started(request));

            let event = match backend.play_clip(&path, start, duration, &worker_cancel) {
                Ok(()) if worker_cancel.is_cancelled() => PlaybackEvent::Cancelled(request),
                Ok(()) => PlaybackEvent::Finished(request),
                Err(err) => {
                    warn!("Preview {} failed: {}", request, err);
                    PlaybackEvent::Failed(request, err)
                }
            };
            debug!("Preview {} ended: {:?}", request, event);
            let _ = tx.send(event);
        });

        self.active = Some(ActivePlayback { cancel, handle });
        request
    }

    /// Report a failure without starting a worker
    pub fn reject(&mut self, error: PlaybackError) -> u64 {
        self.next_request += 1;
        let request = self.next_request;
        warn!("Preview {} rejected: {}", request, error);
        let _ = self.event_tx.send(PlaybackEvent::Failed(request, error));
        request
    }

    /// Cancel the current preview and wait for its worker to exit
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            if active.handle.join().is_err() {
                warn!("Preview worker panicked");
            }
        }
    }

    /// Whether a preview worker is still running
    pub fn is_playing(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.handle.is_finished())
    }

    /// Try to receive the next event (non-blocking)
    pub fn try_recv(&self) -> Option<PlaybackEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive all pending events
    pub fn recv_all(&self) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Block up to `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Option<PlaybackEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

impl Default for SegmentPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SegmentPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}
