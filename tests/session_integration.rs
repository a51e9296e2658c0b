use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use karaoke_core::analysis::AudioAnalyzer;
use karaoke_core::config::AppConfig;
use karaoke_core::error::{AudioError, SessionError, TransportError};
use karaoke_core::playback::{HeadlessTransport, StubTimeSource, TimeSource, TrackKind};
use karaoke_core::session::{
    KaraokeSession, RunMode, SessionCommand, SessionEvent, SessionEventKind, SessionRunner,
    SessionState, SongEntry, SongLibrary,
};
use karaoke_core::testing::{ManualTransport, ScriptedCaptureBackend};
use tokio::sync::broadcast;

const TIMING_JSON: &str = r#"{
  "title": "Test Song",
  "lines": [
    { "start": 4.0, "end": 8.0, "text": "first line" },
    { "start": 9.0, "end": 12.0, "text": "second line" },
    { "start": 12.5, "end": 15.0, "words": [
        { "display": "third", "start": 12.5, "end": 13.5 },
        { "display": "line", "start": 13.5, "end": 15.0 }
    ] }
  ]
}"#;

fn song_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "karaoke_core_session_{}_{}",
        name,
        std::process::id()
    ));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("instrumental.wav"), b"").unwrap();
    fs::write(dir.join("vocal.wav"), b"").unwrap();
    // Legacy file is shadowed by the structured sibling
    fs::write(dir.join("song.lrc"), "[00:01.00]legacy only\n").unwrap();
    fs::write(dir.join("song_lyrics.json"), TIMING_JSON).unwrap();
    dir
}

fn library(dir: &PathBuf, with_vocal: bool) -> SongLibrary {
    let mut library = SongLibrary::new();
    library.insert(SongEntry {
        id: "001".to_string(),
        title: "Test Song".to_string(),
        artist: "Tester".to_string(),
        audio_path: dir.join("instrumental.wav"),
        original_audio_path: with_vocal.then(|| dir.join("vocal.wav")),
        lrc_path: Some(dir.join("song.lrc")),
    });
    library
}

fn build_session(
    library: SongLibrary,
    backend: ScriptedCaptureBackend,
) -> (ManualTransport, KaraokeSession) {
    let config = AppConfig::default();
    let analyzer =
        AudioAnalyzer::spawn(Arc::new(backend), config.audio.clone(), config.scoring.clone())
            .unwrap();
    let transport = ManualTransport::new();
    let session = KaraokeSession::new(
        config,
        library,
        Box::new(transport.clone()),
        analyzer,
        Arc::new(StubTimeSource::new()),
    );
    (transport, session)
}

struct Fixture {
    dir: PathBuf,
    transport: ManualTransport,
    session: KaraokeSession,
}

impl Fixture {
    fn new(name: &str, backend: ScriptedCaptureBackend) -> Self {
        Self::with_library(name, backend, true)
    }

    fn with_library(name: &str, backend: ScriptedCaptureBackend, with_vocal: bool) -> Self {
        let dir = song_dir(name);
        let (transport, session) = build_session(library(&dir, with_vocal), backend);
        Self {
            dir,
            transport,
            session,
        }
    }

    fn start(&mut self) {
        self.session.enqueue("001").unwrap();
        self.session.tick().unwrap();
        assert_eq!(self.session.state(), SessionState::Playing);
    }

    fn tick_at(&mut self, elapsed_ms: i64) {
        self.transport.set_elapsed(elapsed_ms);
        self.session.tick().unwrap();
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.session.shutdown();
        let _ = fs::remove_dir_all(&self.dir);
    }
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEventKind> {
    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(event.kind);
    }
    kinds
}

fn loud_backend() -> ScriptedCaptureBackend {
    ScriptedCaptureBackend::new().with_constant("default", 0.5)
}

#[test]
fn song_plays_through_to_score_and_back_to_menu() {
    let mut fx = Fixture::new("flow", loud_backend());
    let mut rx = fx.session.subscribe();

    fx.start();
    assert_eq!(fx.transport.last_play_offset(), Some(0.0));
    assert_eq!(fx.session.timeline().len(), 3, "structured sibling wins");
    assert_eq!(fx.session.timeline().title.as_deref(), Some("Test Song"));

    fx.tick_at(4500);
    assert_eq!(fx.session.current_line(), Some(0));
    assert!(fx.session.live_metrics().gate_open);

    let analyzer_counted = wait_until(Duration::from_secs(2), || {
        fx.session.analyzer().counters().total_samples > 0
    });
    assert!(analyzer_counted, "analyzer never counted a gated chunk");

    fx.transport.finish();
    fx.session.tick().unwrap();
    assert_eq!(fx.session.state(), SessionState::Score);
    assert_eq!(fx.session.last_score(), Some(100));
    assert!(!fx.session.live_metrics().gate_open);

    fx.session.acknowledge_score().unwrap();
    assert_eq!(fx.session.state(), SessionState::Menu);

    let kinds = drain(&mut rx);
    assert_eq!(
        kinds.first(),
        Some(&SessionEventKind::SongQueued {
            id: "001".to_string()
        })
    );
    assert!(kinds.contains(&SessionEventKind::SongStarted {
        id: "001".to_string()
    }));
    assert!(kinds.contains(&SessionEventKind::SongFinished {
        id: "001".to_string(),
        score: 100
    }));
    assert_eq!(
        kinds.last(),
        Some(&SessionEventKind::StateChanged {
            from: "SCORE".to_string(),
            to: "MENU".to_string()
        })
    );
}

#[test]
fn quiet_singer_scores_zero() {
    let backend = ScriptedCaptureBackend::new().with_constant("default", 0.0);
    let mut fx = Fixture::new("quiet", backend);
    fx.start();
    fx.tick_at(5000);
    assert!(wait_until(Duration::from_secs(2), || {
        fx.session.analyzer().counters().total_samples > 0
    }));

    fx.transport.finish();
    fx.session.tick().unwrap();
    assert_eq!(fx.session.last_score(), Some(0));
}

#[test]
fn unknown_song_code_is_rejected() {
    let mut fx = Fixture::new("unknown", loud_backend());
    let err = fx.session.enqueue("999").unwrap_err();
    assert_eq!(
        err,
        SessionError::UnknownSong {
            id: "999".to_string()
        }
    );
    assert_eq!(fx.session.queue_len(), 0);
    assert_eq!(fx.session.state(), SessionState::Menu);
    assert!(fx.session.message().unwrap().contains("999"));
}

#[test]
fn transport_failure_keeps_menu() {
    let mut fx = Fixture::new("load_fail", loud_backend());
    let mut rx = fx.session.subscribe();
    fx.transport.fail_next_load(TransportError::DecodeFailed {
        path: "instrumental.wav".to_string(),
        reason: "bad header".to_string(),
    });

    fx.session.enqueue("001").unwrap();
    fx.session.tick().unwrap();

    assert_eq!(fx.session.state(), SessionState::Menu);
    assert_eq!(fx.session.queue_len(), 0);
    assert!(fx.session.message().unwrap().contains("bad header"));
    assert!(fx.session.timeline().is_empty());
    assert!(drain(&mut rx).contains(&SessionEventKind::SongStartFailed {
        id: "001".to_string()
    }));

    // The next attempt loads normally
    fx.session.enqueue("001").unwrap();
    fx.session.tick().unwrap();
    assert_eq!(fx.session.state(), SessionState::Playing);
}

#[test]
fn toggle_track_reloads_at_current_time() {
    let mut fx = Fixture::new("toggle", loud_backend());
    fx.start();
    fx.tick_at(5000);

    let track = fx.session.toggle_track().unwrap();
    assert_eq!(track, TrackKind::Vocal);
    assert_eq!(fx.transport.loaded_path(), Some(fx.dir.join("vocal.wav")));
    assert_eq!(fx.transport.last_play_offset(), Some(5.0));

    // Fresh play restarts the transport counter; song-time continues
    fx.tick_at(250);
    assert_eq!(fx.session.song_time_ms(), 5250);
    assert_eq!(fx.session.current_line(), Some(0));

    assert_eq!(fx.session.toggle_track().unwrap(), TrackKind::Instrumental);
    assert_eq!(
        fx.transport.loaded_path(),
        Some(fx.dir.join("instrumental.wav"))
    );
}

#[test]
fn toggle_without_vocal_track_is_a_no_op() {
    let mut fx = Fixture::with_library("no_vocal", loud_backend(), false);
    fx.start();
    fx.tick_at(1000);
    let loads_before = fx.transport.loads().len();

    assert_eq!(fx.session.toggle_track().unwrap(), TrackKind::Instrumental);
    assert_eq!(fx.transport.loads().len(), loads_before);
}

#[test]
fn seek_moves_clock_then_page() {
    let mut fx = Fixture::new("seek", loud_backend());
    fx.start();
    fx.tick_at(1000);
    assert_eq!(fx.session.page_index(), 0);

    fx.session.handle(SessionCommand::Seek(12_500)).unwrap();
    assert_eq!(fx.transport.last_play_offset(), Some(12.5));
    assert_eq!(fx.session.song_time_ms(), 12_500);
    assert_eq!(fx.session.page_index(), 2);
    assert_eq!(fx.session.current_line(), Some(2));

    fx.tick_at(0);
    assert_eq!(fx.session.song_time_ms(), 12_500);
    assert_eq!(fx.session.page_index(), 2);

    // Seeking backwards lands on the first page again
    fx.session.seek(4_000).unwrap();
    assert_eq!(fx.session.page_index(), 0);
}

#[test]
fn pages_turn_after_bottom_line_ends() {
    let mut fx = Fixture::new("pages", loud_backend());
    fx.start();

    for t in [4000, 9000, 12_000] {
        fx.tick_at(t);
        assert_eq!(fx.session.page_index(), 0, "no turn at {t}");
    }
    fx.tick_at(12_001);
    assert_eq!(fx.session.page_index(), 2);
    assert_eq!(fx.session.page_index() % 2, 0);

    let (top, bottom) = fx.session.visible_lines();
    assert_eq!(top.map(|l| l.text.as_str()), Some("third line"));
    assert!(bottom.is_none());
}

#[test]
fn gate_follows_current_line_and_preroll() {
    let mut fx = Fixture::new("gate", loud_backend());
    fx.start();

    fx.tick_at(3900);
    assert_eq!(fx.session.current_line(), Some(0), "pre-roll selects line");
    assert!(!fx.session.live_metrics().gate_open, "gate waits for start");

    fx.tick_at(4000);
    assert!(fx.session.live_metrics().gate_open);

    fx.tick_at(8500);
    assert_eq!(fx.session.current_line(), Some(0));
    assert!(!fx.session.live_metrics().gate_open, "gap between lines");

    fx.tick_at(8850);
    assert_eq!(fx.session.current_line(), Some(1));
    assert!(!fx.session.live_metrics().gate_open);

    fx.tick_at(9000);
    assert!(fx.session.live_metrics().gate_open);
}

#[test]
fn config_screen_only_from_menu() {
    let mut fx = Fixture::new("config", loud_backend());
    fx.session.toggle_config().unwrap();
    assert_eq!(fx.session.state(), SessionState::Configuring);

    let mut audio = fx.session.config().audio.clone();
    audio.mic1_gain = 2.0;
    fx.session
        .handle(SessionCommand::ApplyConfig(audio.clone()))
        .unwrap();
    assert_eq!(fx.session.config().audio.mic1_gain, 2.0);
    assert_eq!(fx.session.analyzer().config(), audio);

    fx.session.toggle_config().unwrap();
    assert_eq!(fx.session.state(), SessionState::Menu);

    fx.start();
    assert!(matches!(
        fx.session.toggle_config(),
        Err(SessionError::InvalidState { .. })
    ));
}

#[test]
fn invalid_config_is_rejected_and_not_stored() {
    let mut fx = Fixture::new("bad_config", loud_backend());
    let mut audio = fx.session.config().audio.clone();
    audio.chunk_size = 0;
    assert!(matches!(
        fx.session.apply_config(audio),
        Err(SessionError::Audio(AudioError::InvalidConfig { .. }))
    ));
    assert_eq!(fx.session.config().audio.chunk_size, 1024);
}

#[test]
fn volume_command_reaches_transport() {
    let mut fx = Fixture::new("volume", loud_backend());
    fx.session.handle(SessionCommand::SetVolume(0.25)).unwrap();
    assert_eq!(fx.transport.volume(), 0.25);
}

#[test]
fn degraded_capture_is_reported_once() {
    let backend = ScriptedCaptureBackend::new().with_failure_after("default", 0.5, 3);
    let mut fx = Fixture::new("degraded", backend);
    let mut rx = fx.session.subscribe();
    fx.start();

    assert!(wait_until(Duration::from_secs(2), || fx
        .session
        .analyzer()
        .is_degraded()));
    fx.tick_at(4500);
    fx.tick_at(4600);

    assert!(fx.session.live_metrics().analyzer_degraded);
    let degraded = drain(&mut rx)
        .into_iter()
        .filter(|kind| *kind == SessionEventKind::AnalyzerDegraded)
        .count();
    assert_eq!(degraded, 1);
    assert_eq!(fx.session.state(), SessionState::Playing);
}

#[test]
fn next_song_starts_after_degraded_capture() {
    let backend = ScriptedCaptureBackend::new().with_failure_after("default", 0.5, 3);
    let watcher = backend.clone();
    let mut fx = Fixture::new("degraded_next", backend);
    fx.start();
    assert!(wait_until(Duration::from_secs(2), || fx
        .session
        .analyzer()
        .is_degraded()));

    fx.transport.finish();
    fx.session.tick().unwrap();
    assert_eq!(fx.session.state(), SessionState::Score);
    fx.session.acknowledge_score().unwrap();

    fx.session.enqueue("001").unwrap();
    assert_eq!(fx.session.tick(), Ok(()));
    assert_eq!(fx.session.state(), SessionState::Playing);
    assert_eq!(fx.transport.loads().len(), 2);
    assert!(wait_until(Duration::from_secs(2), || watcher.open_count() == 2));
}

#[test]
fn dead_analyzer_leaves_transport_idle() {
    let mut fx = Fixture::new("dead_analyzer", loud_backend());
    fx.session.shutdown();
    fx.session.enqueue("001").unwrap();

    assert_eq!(
        fx.session.tick(),
        Err(SessionError::Audio(AudioError::NotRunning))
    );
    assert_eq!(fx.session.state(), SessionState::Menu);
    assert!(fx.transport.loads().is_empty());
}

#[test]
fn commands_outside_playing_are_invalid() {
    let mut fx = Fixture::new("invalid", loud_backend());
    assert!(matches!(
        fx.session.seek(1000),
        Err(SessionError::InvalidState { .. })
    ));
    assert!(matches!(
        fx.session.toggle_track(),
        Err(SessionError::InvalidState { .. })
    ));
    assert!(matches!(
        fx.session.acknowledge_score(),
        Err(SessionError::InvalidState { .. })
    ));
}

fn write_wav(path: &PathBuf, seconds: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for _ in 0..(8000 * seconds) {
        writer.write_sample(0_i16).unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn runner_plays_once_on_headless_transport() {
    let dir = song_dir("runner");
    let audio = dir.join("backing.wav");
    write_wav(&audio, 1);
    fs::write(
        dir.join("short_lyrics.json"),
        r#"{ "lines": [ { "start": 0.2, "end": 0.8, "text": "la la" } ] }"#,
    )
    .unwrap();

    let mut library = SongLibrary::new();
    library.insert(SongEntry {
        id: "002".to_string(),
        title: "Short".to_string(),
        artist: String::new(),
        audio_path: audio,
        original_audio_path: None,
        lrc_path: Some(dir.join("short.lrc")),
    });

    let config = AppConfig::default();
    let analyzer =
        AudioAnalyzer::spawn(Arc::new(loud_backend()), config.audio.clone(), config.scoring.clone())
            .unwrap();
    let time = Arc::new(StubTimeSource::new());
    let time_dyn: Arc<dyn TimeSource> = time.clone();
    let transport = HeadlessTransport::new(Arc::clone(&time_dyn));
    let mut session = KaraokeSession::new(config, library, Box::new(transport), analyzer, time_dyn);
    session.enqueue("002").unwrap();

    let (runner, _commands) = SessionRunner::new(session, RunMode::PlayOnce);
    let mut runner = runner.with_observer(move |_| time.advance(Duration::from_millis(100)));
    let summary = runner.run().unwrap();

    assert_eq!(summary.final_state, SessionState::Score);
    assert!(summary.last_score.is_some());
    assert!(summary.ticks >= 10);
    assert!(!runner.session().analyzer().is_running());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn runner_quits_on_command() {
    let (_transport, session) = build_session(SongLibrary::new(), loud_backend());
    let (mut runner, commands) = SessionRunner::new(session, RunMode::UntilQuit);
    commands.send(SessionCommand::ToggleConfig).unwrap();
    commands.send(SessionCommand::Quit).unwrap();
    let summary = runner.run().unwrap();

    assert_eq!(summary.final_state, SessionState::Configuring);
    assert_eq!(summary.ticks, 0);
    assert!(!runner.session().analyzer().is_running());
}

#[test]
fn runner_shuts_down_on_fault() {
    let dir = song_dir("runner_fault");
    let (_transport, mut session) = build_session(library(&dir, false), loud_backend());
    // A dead analyzer makes the next song start fatal
    session.shutdown();
    session.enqueue("001").unwrap();

    let (mut runner, _commands) = SessionRunner::new(session, RunMode::UntilQuit);
    let err = runner.run().unwrap_err();
    assert_eq!(err, SessionError::Audio(AudioError::NotRunning));
    assert!(!runner.session().analyzer().is_running());
    let _ = fs::remove_dir_all(&dir);
}
