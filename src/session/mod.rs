// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Per-song session.
//!
//! A session owns everything tied to the open audio file: its store
//! (behind the synchronizer), background pipeline and rewrite jobs, the
//! preview player and an optional song data watcher. Opening another
//! file tears all of that down first.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::audio::{PlaybackEvent, SegmentPlayer};
use crate::config::Settings;
use crate::error::{EditError, ExportError, PipelineError, PlaybackError, ValidationError};
use crate::export::{self, LayerSelection};
use crate::import::{ImportOutcome, SongDataEvent, SongDataImporter, SongDataWatcher};
use crate::model::{AlternativeLayer, SongDataFile, SongStore};
use crate::pipeline::{EpochWorker, ProcessingPipeline, RewriteService};
use crate::sync::Synchronizer;

/// Where the current store came from
#[derive(Debug, Clone, PartialEq)]
pub enum StoreSource {
    /// Read from a song data file
    Imported(PathBuf),
    /// Produced by the processing pipeline
    Processed,
}

/// Something the UI should react to
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A store is ready for the open file
    Loaded(StoreSource),
    /// A candidate file was rejected; processing runs instead
    ImportRejected(ValidationError),
    /// No usable song data and no pipeline to produce it
    NeedsProcessing(PathBuf),
    ProcessingFailed(PipelineError),
    AlternativeReady,
    AlternativeFailed(PipelineError),
    AlternativeRejected(EditError),
    /// The store was corrupted by an edit and has been reloaded
    Reloaded,
    /// The song data file next to the audio was deleted
    SongDataRemoved(PathBuf),
    Playback(PlaybackEvent),
}

/// Everything bound to one open audio file
pub struct Session {
    settings: Settings,
    importer: SongDataImporter,
    pipeline: Option<Arc<dyn ProcessingPipeline>>,
    rewrite: Option<Arc<dyn RewriteService>>,
    audio_path: Option<PathBuf>,
    song: Option<Synchronizer>,
    pipeline_jobs: EpochWorker<Result<SongDataFile, PipelineError>>,
    rewrite_jobs: EpochWorker<Result<AlternativeLayer, PipelineError>>,
    player: SegmentPlayer,
    watch: bool,
    watcher: Option<SongDataWatcher>,
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        Self::with_player(settings, SegmentPlayer::new())
    }

    /// Session previewing through a specific player
    pub fn with_player(settings: Settings, player: SegmentPlayer) -> Self {
        Self {
            importer: settings.importer(),
            settings,
            pipeline: None,
            rewrite: None,
            audio_path: None,
            song: None,
            pipeline_jobs: EpochWorker::new("pipeline"),
            rewrite_jobs: EpochWorker::new("rewrite"),
            player,
            watch: false,
            watcher: None,
        }
    }

    pub fn set_pipeline(&mut self, pipeline: Arc<dyn ProcessingPipeline>) {
        self.pipeline = Some(pipeline);
    }

    pub fn set_rewrite_service(&mut self, service: Arc<dyn RewriteService>) {
        self.rewrite = Some(service);
    }

    /// Watch the open file's song data for external changes
    pub fn set_watch(&mut self, watch: bool) {
        self.watch = watch;
        if !watch {
            self.watcher = None;
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn audio_path(&self) -> Option<&Path> {
        self.audio_path.as_deref()
    }

    /// The open song, if a store is ready
    pub fn song(&self) -> Option<&Synchronizer> {
        self.song.as_ref()
    }

    pub fn song_mut(&mut self) -> Option<&mut Synchronizer> {
        self.song.as_mut()
    }

    pub fn store(&self) -> Option<&SongStore> {
        self.song.as_ref().map(Synchronizer::store)
    }

    /// Open an audio file, replacing whatever was open
    ///
    /// Returns the events produced synchronously; pipeline results arrive
    /// later through `poll`.
    pub fn open<P: AsRef<Path>>(&mut self, audio_path: P) -> Vec<SessionEvent> {
        self.close();
        let audio_path = audio_path.as_ref().to_path_buf();
        info!("Opening {:?}", audio_path);
        self.audio_path = Some(audio_path.clone());

        if self.watch {
            match SongDataWatcher::new(&audio_path, self.importer.clone(), None) {
                Ok(watcher) => self.watcher = Some(watcher),
                Err(err) => warn!("Song data watching disabled: {}", err),
            }
        }

        let mut events = Vec::new();
        match self.importer.import_for_audio(&audio_path) {
            ImportOutcome::Loaded { store, path } => {
                self.install(store);
                events.push(SessionEvent::Loaded(StoreSource::Imported(path)));
            }
            ImportOutcome::Invalid(err) => {
                events.push(SessionEvent::ImportRejected(err));
                events.extend(self.start_processing(&audio_path));
            }
            ImportOutcome::Fallback => {
                events.extend(self.start_processing(&audio_path));
            }
        }
        events
    }

    /// Drop the open song, cancelling its jobs and stopping playback
    pub fn close(&mut self) {
        self.pipeline_jobs.supersede();
        self.rewrite_jobs.supersede();
        self.player.stop();
        self.watcher = None;
        self.song = None;
        self.audio_path = None;
    }

    /// Re-read the open file from scratch
    pub fn reload(&mut self) -> Vec<SessionEvent> {
        let Some(path) = self.audio_path.clone() else {
            return Vec::new();
        };
        let mut events = self.open(path);
        events.push(SessionEvent::Reloaded);
        events
    }

    /// Run an edit, reloading the song if it corrupts the store
    pub fn edit<T, F>(&mut self, f: F) -> Result<T, EditError>
    where
        F: FnOnce(&mut Synchronizer) -> Result<T, EditError>,
    {
        let song = self
            .song
            .as_mut()
            .ok_or_else(|| EditError::StoreCorrupted("no song is open".to_string()))?;
        let result = f(song);
        if let Err(err) = &result {
            if err.is_fatal() {
                error!("Reloading after fatal edit error: {}", err);
                self.reload();
            }
        }
        result
    }

    /// Collect results of background work
    pub fn poll(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        while let Some(result) = self.pipeline_jobs.try_recv() {
            events.push(self.apply_pipeline_result(result));
        }
        while let Some(result) = self.rewrite_jobs.try_recv() {
            events.push(self.apply_rewrite_result(result));
        }
        let changes = self
            .watcher
            .as_ref()
            .map(SongDataWatcher::recv_all)
            .unwrap_or_default();
        for change in changes {
            events.extend(self.apply_watch_event(change));
        }
        events.extend(self.player.recv_all().into_iter().map(SessionEvent::Playback));

        events
    }

    /// Block up to `timeout` for the processing pipeline to deliver
    pub fn wait_for_processing(&mut self, timeout: Duration) -> Option<SessionEvent> {
        let result = self.pipeline_jobs.recv_timeout(timeout)?;
        Some(self.apply_pipeline_result(result))
    }

    /// Block up to `timeout` for the rewrite service to deliver
    pub fn wait_for_alternative(&mut self, timeout: Duration) -> Option<SessionEvent> {
        let result = self.rewrite_jobs.recv_timeout(timeout)?;
        Some(self.apply_rewrite_result(result))
    }

    /// Preview the start of a block
    pub fn play_block(&mut self, index: usize) -> Result<u64, PlaybackError> {
        let (Some(song), Some(path)) = (self.song.as_mut(), self.audio_path.clone()) else {
            return Err(PlaybackError::NoBlock(index));
        };
        let block = song.block(index).map_err(|_| PlaybackError::NoBlock(index))?;
        Ok(self.player.play(path, block.start, self.settings.preview_seconds))
    }

    pub fn stop_playback(&mut self) {
        self.player.stop();
    }

    /// Ask the rewrite service for an alternative layer
    pub fn request_alternative(&mut self) -> Result<u64, PipelineError> {
        let service = self.rewrite.clone().ok_or(PipelineError::NoRewriteService)?;
        let api_key = self
            .settings
            .rewrite_api_key()
            .ok_or_else(|| PipelineError::NoApiKey(self.settings.rewrite_api_key_env.clone()))?;
        let snapshot = self
            .store()
            .map(SongStore::serialize)
            .ok_or_else(|| PipelineError::Failed("no song is open".to_string()))?;

        info!("Requesting alternative layer");
        Ok(self
            .rewrite_jobs
            .submit(move |cancel| service.rewrite(&snapshot, &api_key, cancel)))
    }

    pub fn export_chordpro<P: AsRef<Path>>(
        &self,
        layers: LayerSelection,
        path: P,
    ) -> Result<(), ExportError> {
        export::export_chordpro(self.store().ok_or(ExportError::NoSong)?, layers, path)
    }

    pub fn export_midi<P: AsRef<Path>>(
        &self,
        layers: LayerSelection,
        path: P,
    ) -> Result<(), ExportError> {
        let store = self.store().ok_or(ExportError::NoSong)?;
        export::export_midi(store, layers, &self.settings.midi.encoder(), path)
    }

    /// Write the store as song data; defaults to `<audio base>.song_data`
    pub fn export_song_data(&self, path: Option<&Path>) -> Result<PathBuf, ExportError> {
        let store = self.store().ok_or(ExportError::NoSong)?;
        let path = match (path, &self.audio_path) {
            (Some(path), _) => path.to_path_buf(),
            (None, Some(audio)) => audio.with_extension("song_data"),
            (None, None) => return Err(ExportError::NoSong),
        };
        export::export_song_data(store, &path)?;
        Ok(path)
    }

    fn install(&mut self, store: SongStore) {
        self.song = Some(Synchronizer::with_settings(
            store,
            self.settings.block_width,
            self.settings.approximate_confidence,
        ));
    }

    fn start_processing(&mut self, audio_path: &Path) -> Option<SessionEvent> {
        let Some(pipeline) = self.pipeline.clone() else {
            return Some(SessionEvent::NeedsProcessing(audio_path.to_path_buf()));
        };
        let audio = audio_path.to_path_buf();
        let epoch = self
            .pipeline_jobs
            .submit(move |cancel| pipeline.process(&audio, cancel));
        info!("Processing {:?} (epoch {})", audio_path, epoch);
        None
    }

    fn apply_pipeline_result(&mut self, result: Result<SongDataFile, PipelineError>) -> SessionEvent {
        match result.and_then(|file| SongStore::load(file).map_err(PipelineError::from)) {
            Ok(store) => {
                self.install(store);
                SessionEvent::Loaded(StoreSource::Processed)
            }
            Err(err) => {
                warn!("Processing failed: {}", err);
                SessionEvent::ProcessingFailed(err)
            }
        }
    }

    fn apply_rewrite_result(
        &mut self,
        result: Result<AlternativeLayer, PipelineError>,
    ) -> SessionEvent {
        let layer = match result {
            Ok(layer) => layer,
            Err(err) => {
                warn!("Rewrite failed: {}", err);
                return SessionEvent::AlternativeFailed(err);
            }
        };
        match self.edit(|song| song.set_alternative(layer)) {
            Ok(()) => SessionEvent::AlternativeReady,
            Err(err) => SessionEvent::AlternativeRejected(err),
        }
    }

    fn apply_watch_event(&mut self, event: SongDataEvent) -> Vec<SessionEvent> {
        match event {
            SongDataEvent::Changed(outcome) => match *outcome {
                ImportOutcome::Loaded { store, path } => {
                    self.pipeline_jobs.supersede();
                    self.rewrite_jobs.supersede();
                    self.install(store);
                    vec![SessionEvent::Loaded(StoreSource::Imported(path))]
                }
                ImportOutcome::Invalid(err) => vec![SessionEvent::ImportRejected(err)],
                ImportOutcome::Fallback => Vec::new(),
            },
            SongDataEvent::Removed(path) => vec![SessionEvent::SongDataRemoved(path)],
        }
    }
}
