// Session module - the karaoke state machine driven by the UI loop
//
// Each tick in PLAYING:
//   song_time = clock.current_time_ms()
//   current   = current_line(timeline, song_time)
//   pages.advance(song_time)
//   gate.evaluate(song_time, current) -> analyzer
//
// Every transport reload (song start, seek, track toggle) goes through
// PlaybackClock::restart and is followed by a page reset, in that order.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::analysis::{AudioAnalyzer, MAX_INPUTS};
use crate::config::{AppConfig, AudioConfig};
use crate::error::{log_session_error, log_transport_error, ErrorCode, SessionError};
use crate::lyrics::{load_timeline, resolve_timing_source, LyricLine, LyricTimeline};
use crate::playback::{PlaybackClock, TimeSource, TrackKind, Transport};

pub mod events;
pub mod gate;
pub mod library;
pub mod pagination;
pub mod runner;
pub mod state;

pub use events::{SessionEvent, SessionEventKind};
pub use gate::{is_singing, SingingGate};
pub use library::{SongEntry, SongLibrary};
pub use pagination::{current_line, PaginationEngine};
pub use runner::{RunMode, RunSummary, SessionRunner};
pub use state::SessionState;

use events::EventBus;

/// User commands accepted by [`KaraokeSession::handle`]
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Queue a song by library code
    Enqueue(String),
    /// Switch between instrumental and vocal track
    ToggleTrack,
    /// Jump to an absolute song-time (ms)
    Seek(u64),
    /// Leave the score screen
    AcknowledgeScore,
    /// Enter or leave the configuration screen
    ToggleConfig,
    ApplyConfig(AudioConfig),
    SetVolume(f32),
    /// Stop the runner; ignored by the session itself
    Quit,
}

/// Snapshot for display, refreshed every tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveMetrics {
    pub state: SessionState,
    pub song_time_ms: u64,
    pub page_index: usize,
    pub current_line: Option<usize>,
    pub gate_open: bool,
    pub track: TrackKind,
    /// Latest energy per input slot
    pub energies: [f64; MAX_INPUTS],
    /// Live hit ratio of the current song (0.0..=1.0)
    pub accuracy: f64,
    /// Final score, only after the song finished
    pub score: Option<u8>,
    pub analyzer_degraded: bool,
    pub analyzer_disabled: bool,
}

pub struct KaraokeSession {
    config: AppConfig,
    library: SongLibrary,
    clock: PlaybackClock,
    analyzer: AudioAnalyzer,
    gate: SingingGate,
    pages: PaginationEngine,
    timeline: LyricTimeline,
    events: EventBus,

    state: SessionState,
    queue: VecDeque<String>,
    current_song: Option<SongEntry>,
    track: TrackKind,
    song_time_ms: u64,
    current_line: Option<usize>,
    last_score: Option<u8>,
    message: Option<String>,
    degraded_reported: bool,
}

impl KaraokeSession {
    pub fn new(
        config: AppConfig,
        library: SongLibrary,
        transport: Box<dyn Transport>,
        analyzer: AudioAnalyzer,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        let gate = SingingGate::new(analyzer.gate());
        Self {
            config,
            library,
            clock: PlaybackClock::new(transport),
            analyzer,
            gate,
            pages: PaginationEngine::new(),
            timeline: LyricTimeline::empty(),
            events: EventBus::new(time_source),
            state: SessionState::Menu,
            queue: VecDeque::new(),
            current_song: None,
            track: TrackKind::Instrumental,
            song_time_ms: 0,
            current_line: None,
            last_score: None,
            message: None,
            degraded_reported: false,
        }
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    pub fn handle(&mut self, command: SessionCommand) -> Result<(), SessionError> {
        match command {
            SessionCommand::Enqueue(id) => self.enqueue(&id),
            SessionCommand::ToggleTrack => self.toggle_track().map(|_| ()),
            SessionCommand::Seek(to_ms) => self.seek(to_ms),
            SessionCommand::AcknowledgeScore => self.acknowledge_score(),
            SessionCommand::ToggleConfig => self.toggle_config(),
            SessionCommand::ApplyConfig(audio) => self.apply_config(audio),
            SessionCommand::SetVolume(volume) => {
                self.clock.set_volume(volume);
                Ok(())
            }
            SessionCommand::Quit => Ok(()),
        }
    }

    /// Queue a song; unknown codes are rejected and reported to the user.
    pub fn enqueue(&mut self, id: &str) -> Result<(), SessionError> {
        if !self.library.contains(id) {
            let err = SessionError::UnknownSong { id: id.to_string() };
            tracing::warn!("[Session] {}", err.message());
            self.message = Some(err.message());
            return Err(err);
        }
        tracing::info!("[Session] Queued song {}", id);
        self.queue.push_back(id.to_string());
        self.events
            .publish(SessionEventKind::SongQueued { id: id.to_string() }, None);
        Ok(())
    }

    /// Advance the session by one UI tick.
    ///
    /// A song that fails to start is reported through `message()` and an
    /// event, not as an error; errors returned here are faults the loop
    /// cannot recover from.
    pub fn tick(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Menu => {
                if let Some(id) = self.queue.pop_front() {
                    match self.start_song(&id) {
                        Ok(()) => {}
                        Err(SessionError::Audio(err)) => return Err(SessionError::Audio(err)),
                        Err(err) => log_session_error(&err, "start_song"),
                    }
                }
                Ok(())
            }
            SessionState::Playing => {
                self.update_playing();
                Ok(())
            }
            SessionState::Score | SessionState::Configuring => Ok(()),
        }
    }

    /// MENU -> PLAYING for `id`.
    ///
    /// The analyzer is resumed before the transport loads, so an analyzer
    /// fault leaves nothing playing. On a transport failure nothing changes
    /// except the user message: the state stays MENU and the previous
    /// timeline is kept.
    pub fn start_song(&mut self, id: &str) -> Result<(), SessionError> {
        self.ensure_state(SessionState::Menu, "start a song")?;
        let entry = self
            .library
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownSong { id: id.to_string() })?;

        tracing::info!("[Session] Starting song {}: {}", entry.id, entry.title);
        let timeline = match &entry.lrc_path {
            Some(path) => load_timeline(
                resolve_timing_source(path),
                self.config.session.default_line_ms,
            ),
            None => LyricTimeline::empty(),
        };

        self.gate.close();
        self.analyzer.resume()?;

        if let Err(err) = self.clock.restart(&entry.audio_path, 0) {
            self.analyzer.pause();
            log_transport_error(&err, "start_song");
            self.message = Some(format!("Could not load audio: {}", err.message()));
            self.events.publish(
                SessionEventKind::SongStartFailed { id: entry.id.clone() },
                Some(err.message()),
            );
            return Err(err.into());
        }

        self.pages.reset();
        self.track = TrackKind::Instrumental;
        self.song_time_ms = 0;
        self.current_line = None;
        self.last_score = None;
        self.message = None;
        self.degraded_reported = false;
        self.analyzer.reset_counters();

        self.timeline = timeline;
        self.events.publish(
            SessionEventKind::SongStarted { id: entry.id.clone() },
            Some(entry.title.clone()),
        );
        self.current_song = Some(entry);
        self.transition(SessionState::Playing)
    }

    /// PLAYING -> SCORE: stop the analyzer and read the final score.
    pub fn finish_song(&mut self) -> Result<u8, SessionError> {
        self.ensure_state(SessionState::Playing, "finish the song")?;
        self.gate.close();
        self.analyzer.pause();
        self.analyzer.stop_streams();

        let score = self.analyzer.score();
        self.last_score = Some(score);
        let id = self
            .current_song
            .as_ref()
            .map(|song| song.id.clone())
            .unwrap_or_default();
        tracing::info!("[Session] Song {} finished, score {}", id, score);
        self.events
            .publish(SessionEventKind::SongFinished { id, score }, None);
        self.transition(SessionState::Score)?;
        Ok(score)
    }

    /// SCORE -> MENU
    pub fn acknowledge_score(&mut self) -> Result<(), SessionError> {
        self.ensure_state(SessionState::Score, "acknowledge the score")?;
        self.transition(SessionState::Menu)
    }

    /// MENU <-> CONFIGURING
    pub fn toggle_config(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Menu => self.transition(SessionState::Configuring),
            SessionState::Configuring => self.transition(SessionState::Menu),
            state => Err(SessionError::InvalidState {
                state: state.to_string(),
                action: "open the configuration".to_string(),
            }),
        }
    }

    /// Push a new audio snapshot to the analyzer; valid in every state.
    pub fn apply_config(&mut self, audio: AudioConfig) -> Result<(), SessionError> {
        self.analyzer.apply_config(audio.clone())?;
        self.config.audio = audio;
        self.events.publish(SessionEventKind::ConfigApplied, None);
        Ok(())
    }

    /// Switch between instrumental and vocal at the current song-time.
    ///
    /// Does nothing when the other rendition is missing on disk.
    pub fn toggle_track(&mut self) -> Result<TrackKind, SessionError> {
        self.ensure_state(SessionState::Playing, "switch tracks")?;
        let target = self.track.toggled();
        let Some(path) = self.track_file(target) else {
            tracing::info!("[Session] No {} track available", target);
            return Ok(self.track);
        };

        let now = self.clock.current_time_ms();
        self.reload_at(&path, now)?;
        self.track = target;
        tracing::info!("[Session] Switched to {} track at {} ms", target, now);
        self.events
            .publish(SessionEventKind::TrackToggled { track: target }, None);
        Ok(target)
    }

    /// Jump to an absolute song-time on the current track.
    pub fn seek(&mut self, to_ms: u64) -> Result<(), SessionError> {
        self.ensure_state(SessionState::Playing, "seek")?;
        let Some(path) = self.track_file(self.track) else {
            return Err(SessionError::InvalidState {
                state: self.state.to_string(),
                action: "seek without a loaded track".to_string(),
            });
        };

        self.reload_at(&path, to_ms)?;
        tracing::info!("[Session] Seeked to {} ms", to_ms);
        self.events
            .publish(SessionEventKind::Seeked { to_ms }, None);
        Ok(())
    }

    /// Stop the analyzer and release devices. Idempotent.
    pub fn shutdown(&mut self) {
        self.gate.close();
        self.analyzer.shutdown();
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn library(&self) -> &SongLibrary {
        &self.library
    }

    pub fn timeline(&self) -> &LyricTimeline {
        &self.timeline
    }

    pub fn current_song(&self) -> Option<&SongEntry> {
        self.current_song.as_ref()
    }

    pub fn current_line(&self) -> Option<usize> {
        self.current_line
    }

    pub fn page_index(&self) -> usize {
        self.pages.page_index()
    }

    pub fn visible_lines(&self) -> (Option<&LyricLine>, Option<&LyricLine>) {
        self.pages.visible_lines(&self.timeline)
    }

    pub fn track(&self) -> TrackKind {
        self.track
    }

    pub fn song_time_ms(&self) -> u64 {
        self.song_time_ms
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn last_score(&self) -> Option<u8> {
        self.last_score
    }

    /// Last user-visible message (invalid code, load failure...)
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn analyzer(&self) -> &AudioAnalyzer {
        &self.analyzer
    }

    pub fn live_metrics(&self) -> LiveMetrics {
        LiveMetrics {
            state: self.state,
            song_time_ms: self.song_time_ms,
            page_index: self.pages.page_index(),
            current_line: self.current_line,
            gate_open: self.gate.is_active(),
            track: self.track,
            energies: self.analyzer.energies(),
            accuracy: self.analyzer.accuracy(),
            score: self.last_score,
            analyzer_degraded: self.analyzer.is_degraded(),
            analyzer_disabled: self.analyzer.is_disabled(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn event_stream(&self) -> impl Stream<Item = SessionEvent> + Send + 'static {
        self.events.stream()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn update_playing(&mut self) {
        if !self.clock.is_active() {
            if let Err(err) = self.finish_song() {
                log_session_error(&err, "finish_song");
            }
            return;
        }

        let now = self.clock.current_time_ms();
        self.song_time_ms = now;
        self.current_line = current_line(&self.timeline, now, self.config.session.preroll_ms);
        if self.pages.advance(&self.timeline, now) {
            tracing::debug!("[Session] Page turned to {}", self.pages.page_index());
        }
        let line = self.current_line.and_then(|index| self.timeline.get(index));
        self.gate.evaluate(now, line);

        if self.analyzer.is_degraded() && !self.degraded_reported {
            self.degraded_reported = true;
            tracing::warn!("[Session] Microphone capture stopped, scoring frozen");
            self.events.publish(
                SessionEventKind::AnalyzerDegraded,
                Some("microphone capture stopped".to_string()),
            );
        }
    }

    /// Transport reload, then clock offset, then page fast-forward.
    fn reload_at(&mut self, path: &Path, song_time_ms: u64) -> Result<(), SessionError> {
        if let Err(err) = self.clock.restart(path, song_time_ms) {
            log_transport_error(&err, "reload");
            self.message = Some(err.message());
            self.events
                .publish(SessionEventKind::Warning, Some(err.message()));
            return Err(err.into());
        }
        self.pages.reset_to(&self.timeline, song_time_ms);
        self.song_time_ms = song_time_ms;
        self.current_line = current_line(
            &self.timeline,
            song_time_ms,
            self.config.session.preroll_ms,
        );
        Ok(())
    }

    fn track_file(&self, kind: TrackKind) -> Option<PathBuf> {
        let song = self.current_song.as_ref()?;
        song.track_path(kind)
            .filter(|path| path.exists())
            .map(Path::to_path_buf)
    }

    fn ensure_state(&self, expected: SessionState, action: &str) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                state: self.state.to_string(),
                action: action.to_string(),
            })
        }
    }

    fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        let current = self.state;
        if !current.can_transition_to(next) {
            let err = SessionError::InvalidState {
                state: current.to_string(),
                action: format!("move to {}", next),
            };
            tracing::warn!("[Session] Invalid transition: {} -> {}", current, next);
            return Err(err);
        }
        self.state = next;
        tracing::info!("[Session] State transition: {} -> {}", current, next);
        self.events.state_changed(current, next);
        Ok(())
    }
}
