// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! File watcher for song data reload.
//!
//! Watches the directory of an open audio file and re-runs the importer
//! when one of its song data candidates appears or changes, e.g. when an
//! external processing run writes its result next to the audio.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::debug;

use super::{ImportOutcome, SongDataImporter};

/// Events emitted by the song data watcher
#[derive(Debug, Clone)]
pub enum SongDataEvent {
    /// A candidate file was created or modified and re-imported
    Changed(Box<ImportOutcome>),
    /// A candidate file was deleted
    Removed(PathBuf),
}

/// Debounced watcher for one audio file's song data candidates
pub struct SongDataWatcher {
    _watcher: RecommendedWatcher,
    event_receiver: Receiver<SongDataEvent>,
    audio_path: PathBuf,
}

impl SongDataWatcher {
    /// Watch the song data candidates of `audio_path`
    ///
    /// # Arguments
    /// * `audio_path` - The open audio file
    /// * `importer` - Importer whose probe order defines the candidates
    /// * `debounce_ms` - Debounce duration in milliseconds (default: 500)
    pub fn new<P: AsRef<Path>>(
        audio_path: P,
        importer: SongDataImporter,
        debounce_ms: Option<u64>,
    ) -> Result<Self> {
        let audio_path = audio_path.as_ref().to_path_buf();
        let debounce_duration = Duration::from_millis(debounce_ms.unwrap_or(500));
        let directory = match audio_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (event_tx, event_rx): (Sender<SongDataEvent>, Receiver<SongDataEvent>) =
            mpsc::channel();
        let (notify_tx, notify_rx): (Sender<Event>, Receiver<Event>) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            },
            Config::default(),
        )
        .map_err(|e| anyhow!("Failed to create file watcher: {}", e))?;

        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|e| anyhow!("Failed to watch path {:?}: {}", directory, e))?;

        let candidates = importer.candidates(&audio_path);
        let watched_audio = audio_path.clone();

        // Debounce thread
        std::thread::spawn(move || {
            let mut last_event_time: Option<Instant> = None;

            loop {
                match notify_rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(event) => {
                        let relevant: Vec<PathBuf> = event
                            .paths
                            .into_iter()
                            .filter(|p| candidates.iter().any(|c| same_file_name(c, p)))
                            .collect();
                        if relevant.is_empty() {
                            continue;
                        }
                        match event.kind {
                            EventKind::Remove(_) => {
                                for path in relevant {
                                    let _ = event_tx.send(SongDataEvent::Removed(path));
                                }
                            }
                            EventKind::Create(_) | EventKind::Modify(_) => {
                                last_event_time = Some(Instant::now());
                            }
                            _ => {}
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        if let Some(last_time) = last_event_time {
                            if last_time.elapsed() >= debounce_duration {
                                debug!("Song data changed for {:?}, re-importing", watched_audio);
                                let outcome = importer.import_for_audio(&watched_audio);
                                if event_tx
                                    .send(SongDataEvent::Changed(Box::new(outcome)))
                                    .is_err()
                                {
                                    break;
                                }
                                last_event_time = None;
                            }
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => {
                        // Watcher was dropped, exit thread
                        break;
                    }
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            event_receiver: event_rx,
            audio_path,
        })
    }

    /// Try to receive the next event (non-blocking)
    pub fn try_recv(&self) -> Option<SongDataEvent> {
        self.event_receiver.try_recv().ok()
    }

    /// Receive all pending events
    pub fn recv_all(&self) -> Vec<SongDataEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Block until the next event is received
    pub fn recv(&self) -> Option<SongDataEvent> {
        self.event_receiver.recv().ok()
    }

    /// Block up to `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Option<SongDataEvent> {
        self.event_receiver.recv_timeout(timeout).ok()
    }

    /// The audio file whose song data is watched
    pub fn audio_path(&self) -> &Path {
        &self.audio_path
    }
}

/// Notify may report canonicalized paths, so compare by file name
fn same_file_name(candidate: &Path, reported: &Path) -> bool {
    candidate.file_name().is_some() && candidate.file_name() == reported.file_name()
}
