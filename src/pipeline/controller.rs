//! Pipeline controller: the single entry point hosts talk to.
//!
//! Owns the worker, the loaded session, the visible frame and the tick
//! schedule, and turns Load/Play/Pause/Stop commands into state changes.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use super::driver::{Session, TickOutcome, VisibleFrame};
use super::timer::FrameTimer;
use super::worker::{DecompressionWorker, WorkStatus};
use crate::package::{ByteSource, FileSource, PackageHeader, ParseError, parse};
use crate::schema::PlaybackConfig;

/// Playback session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing loaded.
    Stopped,
    /// Package parsed and the first frame requested, not yet playing.
    Loaded,
    /// Tick armed.
    Playing,
    /// Tick disarmed, package and cursor kept.
    Paused,
}

/// Notifications emitted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Package parsed and first frame requested.
    LoadingFinished { frame_count: usize },
    /// A newly decoded frame became visible.
    FramePresented { index: usize },
    /// The sequence reached its end without looping.
    PlayingFinished,
}

/// Sequence frame playback pipeline.
///
/// Usage:
/// ```ignore
/// let mut pipeline = FramePipeline::new(config)?;
/// let events = pipeline.events();
/// pipeline.play()?;
/// loop {
///     pipeline.update(Instant::now());
///     if let Some(frame) = pipeline.visible_frame() {
///         // upload frame.pixels...
///     }
/// }
/// ```
pub struct FramePipeline {
    config: PlaybackConfig,
    worker: DecompressionWorker,
    session: Option<Session>,
    visible: Option<VisibleFrame>,
    timer: FrameTimer,
    state: PlaybackState,
    events_tx: Sender<PipelineEvent>,
    events_rx: Receiver<PipelineEvent>,
}

impl FramePipeline {
    /// Create a pipeline and spawn its decompression thread.
    pub fn new(config: PlaybackConfig) -> io::Result<Self> {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let timer = FrameTimer::new(config.frame_interval());
        Ok(Self {
            config,
            worker: DecompressionWorker::spawn()?,
            session: None,
            visible: None,
            timer,
            state: PlaybackState::Stopped,
            events_tx,
            events_rx,
        })
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Replace the configuration. Takes effect at the next transition that
    /// reads it (load for `reverse`, play for `fps`).
    pub fn set_config(&mut self, config: PlaybackConfig) {
        self.config = config;
    }

    /// Receiver for pipeline notifications.
    pub fn events(&self) -> Receiver<PipelineEvent> {
        self.events_rx.clone()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    pub fn header(&self) -> Option<&PackageHeader> {
        self.session.as_ref().map(|s| s.header())
    }

    /// Index of the frame requested or about to be requested.
    pub fn current_index(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.cursor().current())
    }

    pub fn visible_frame(&self) -> Option<&VisibleFrame> {
        self.visible.as_ref()
    }

    pub fn worker_status(&self) -> WorkStatus {
        self.worker.status()
    }

    /// Block until the in-flight decode (if any) has finished.
    pub fn wait_for_decode(&self) {
        self.worker.wait_idle();
    }

    /// Deadline of the next tick while playing.
    pub fn next_tick_due(&self) -> Option<Instant> {
        self.timer.next_due()
    }

    /// Load a package and request its first frame.
    ///
    /// A previously loaded package is stopped first, provided the worker is
    /// idle; otherwise the load is rejected. A failed load leaves the
    /// pipeline `Stopped`.
    pub fn load(&mut self, source: Arc<dyn ByteSource>, reversed: bool) -> Result<(), LoadError> {
        match self.worker.status() {
            WorkStatus::Idle => {}
            WorkStatus::Destroy => {
                log::debug!("Respawning decompression thread");
                self.worker = DecompressionWorker::spawn().map_err(LoadError::WorkerUnavailable)?;
            }
            status => {
                log::debug!("Load rejected, decompression not idle: {:?}", status);
                return Err(LoadError::AlreadyActive);
            }
        }

        self.stop();

        let bytes = source.bytes().ok_or(LoadError::SourceUnavailable)?;
        let (header, table) = parse(bytes)?;
        log::info!(
            "Loaded package: {} frames, {}x{} {:?}, algorithm {}, {} bytes/frame",
            header.frame_count,
            header.width,
            header.height,
            header.pixel_format,
            header.algorithm,
            header.frame_size
        );

        let mut session = Session::new(header, table, source, reversed);
        session.request_current(&self.worker);
        self.session = Some(session);
        self.state = PlaybackState::Loaded;

        self.emit(PipelineEvent::LoadingFinished {
            frame_count: header.frame_count(),
        });
        Ok(())
    }

    /// Load the configured package file, honouring the configured direction.
    pub fn load_configured(&mut self) -> Result<(), LoadError> {
        let path = self
            .config
            .package_path
            .clone()
            .ok_or(LoadError::NoPackagePath)?;
        let source =
            FileSource::open(&path).map_err(|source| LoadError::Open { path, source })?;
        self.load(Arc::new(source), self.config.reverse)
    }

    /// Start or resume playback, loading the configured package if needed.
    pub fn play(&mut self) -> Result<(), LoadError> {
        match self.state {
            PlaybackState::Playing => {
                log::debug!("Already playing");
                return Ok(());
            }
            PlaybackState::Stopped => self.load_configured()?,
            PlaybackState::Loaded | PlaybackState::Paused => {}
        }

        let interval = self.config.frame_interval();
        self.timer.arm(interval, Instant::now());
        self.state = PlaybackState::Playing;
        log::debug!("Playing at {} fps", self.config.effective_fps());
        Ok(())
    }

    /// Disarm the tick, keeping the package, cursor and visible frame.
    ///
    /// Applies to a playing or freshly loaded package; ignored when stopped
    /// or already paused.
    pub fn pause(&mut self) {
        if !matches!(self.state, PlaybackState::Playing | PlaybackState::Loaded) {
            log::debug!("Pause ignored in state {:?}", self.state);
            return;
        }
        self.timer.disarm();
        self.state = PlaybackState::Paused;
    }

    /// Stop playback and release the package. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.release();
        if !self.config.keep_last_frame_visible {
            self.visible = None;
        }
        self.state = PlaybackState::Stopped;
    }

    /// Shut the worker down, then release everything else.
    pub fn unload(&mut self) {
        self.timer.disarm();
        self.worker.shutdown();
        self.session = None;
        self.visible = None;
        self.state = PlaybackState::Stopped;
    }

    /// Run the tick if it is due at `now`.
    pub fn update(&mut self, now: Instant) -> Option<TickOutcome> {
        if self.timer.poll(now) {
            Some(self.tick())
        } else {
            None
        }
    }

    /// Run one playback tick immediately.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state != PlaybackState::Playing {
            return TickOutcome::Inactive;
        }
        let Some(session) = self.session.as_mut() else {
            return TickOutcome::Inactive;
        };

        let outcome = session.tick(&self.worker, &mut self.visible, self.config.loop_playback);
        match outcome {
            TickOutcome::Presented { index, stale: false } => {
                self.emit(PipelineEvent::FramePresented { index });
            }
            TickOutcome::Finished { presented } => {
                if let Some(index) = presented {
                    self.emit(PipelineEvent::FramePresented { index });
                }
                self.finish();
            }
            _ => {}
        }
        outcome
    }

    fn finish(&mut self) {
        if !self.config.keep_last_frame_visible {
            self.visible = None;
        }
        self.release();
        self.state = PlaybackState::Stopped;
        log::info!("Playback finished");
        self.emit(PipelineEvent::PlayingFinished);
    }

    /// Disarm the tick, wait out any decode and drop the session.
    fn release(&mut self) {
        self.timer.disarm();
        self.worker.wait_idle();
        self.worker.discard();
        self.session = None;
    }

    fn emit(&self, event: PipelineEvent) {
        // We hold a receiver ourselves, so the channel never disconnects.
        let _ = self.events_tx.send(event);
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        self.unload();
    }
}

/// Package load errors.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("A package is still being decoded; stop it first")]
    AlreadyActive,
    #[error("Failed to parse package: {0}")]
    ParseFailed(#[from] ParseError),
    #[error("Package bytes are unavailable")]
    SourceUnavailable,
    #[error("Failed to open package {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("No package path configured")]
    NoPackagePath,
    #[error("Failed to start decompression thread: {0}")]
    WorkerUnavailable(#[source] io::Error),
}
