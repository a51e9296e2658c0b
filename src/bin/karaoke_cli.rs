use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use karaoke_core::analysis::{AudioAnalyzer, ScoreCounters};
use karaoke_core::audio::{
    chunk_energy, list_input_devices, read_wav_mono, CaptureBackend, CpalCaptureBackend,
    WavCaptureBackend,
};
use karaoke_core::config::{AppConfig, Difficulty, DEVICE_NONE};
use karaoke_core::lyrics::{load_timeline, resolve_timing_source};
use karaoke_core::playback::{HeadlessTransport, SystemTimeSource, TimeSource};
use karaoke_core::session::{
    current_line, is_singing, KaraokeSession, RunMode, SessionRunner, SongLibrary,
};
use serde::Serialize;

/// Device name used for a WAV file standing in for the microphone
const WAV_DEVICE: &str = "wav";

#[derive(Parser, Debug)]
#[command(name = "karaoke_cli", about = "Headless driver for the karaoke session core")]
struct Cli {
    /// JSON configuration file (defaults apply when missing)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List capture devices on the default audio host
    Devices,
    /// List the songs in the library by code
    Songs {
        /// Song library JSON (defaults to the configured library path)
        #[arg(long)]
        library: Option<PathBuf>,
    },
    /// Parse a timing file and print the resulting timeline as JSON
    Lyrics {
        file: PathBuf,
    },
    /// Play one song from the library through the headless transport
    Play {
        /// Song library JSON (defaults to the configured library path)
        #[arg(long)]
        library: Option<PathBuf>,
        #[arg(long)]
        song: String,
        /// Capture device name, or wav:<path> to sing from a recording
        #[arg(long)]
        mic: Option<String>,
    },
    /// Score a recorded vocal take against a timing file without playback
    Score {
        #[arg(long)]
        lyrics: PathBuf,
        #[arg(long)]
        mic_wav: PathBuf,
        #[arg(long)]
        difficulty: Option<Difficulty>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli
        .config
        .as_deref()
        .map(AppConfig::load_from_file)
        .unwrap_or_default();

    match cli.command {
        Commands::Devices => run_devices(),
        Commands::Songs { library } => {
            let library =
                library.unwrap_or_else(|| PathBuf::from(&config.session.library_path));
            run_songs(&library)
        }
        Commands::Lyrics { file } => run_lyrics(&config, &file),
        Commands::Play { library, song, mic } => {
            let library =
                library.unwrap_or_else(|| PathBuf::from(&config.session.library_path));
            run_play(config, &library, &song, mic)
        }
        Commands::Score {
            lyrics,
            mic_wav,
            difficulty,
        } => run_score(&config, &lyrics, &mic_wav, difficulty),
    }
}

fn run_devices() -> Result<ExitCode> {
    let devices = list_input_devices().context("listing input devices")?;
    if devices.is_empty() {
        println!("No input devices found");
    }
    for name in devices {
        println!("{}", name);
    }
    Ok(ExitCode::from(0))
}

fn run_songs(library_path: &Path) -> Result<ExitCode> {
    let library = SongLibrary::load_from_file(library_path);
    if library.is_empty() {
        println!("No songs in {}", library_path.display());
    }
    for id in library.ids() {
        if let Some(song) = library.get(id) {
            println!("{}\t{}\t{}", id, song.title, song.artist);
        }
    }
    Ok(ExitCode::from(0))
}

fn run_lyrics(config: &AppConfig, file: &Path) -> Result<ExitCode> {
    if !file.exists() {
        bail!("timing file {} does not exist", file.display());
    }
    let timeline = load_timeline(
        resolve_timing_source(file),
        config.session.default_line_ms,
    );
    println!("{}", serde_json::to_string_pretty(&timeline)?);
    Ok(ExitCode::from(0))
}

fn run_play(
    mut config: AppConfig,
    library_path: &Path,
    song: &str,
    mic: Option<String>,
) -> Result<ExitCode> {
    let library = SongLibrary::load_from_file(library_path);
    if !library.contains(song) {
        bail!("song {} is not in {}", song, library_path.display());
    }

    let wav_take = mic.as_deref().and_then(|spec| spec.strip_prefix("wav:"));
    let backend: Arc<dyn CaptureBackend> = match (wav_take, mic.as_deref()) {
        (Some(path), _) => {
            config.audio.input_device_1 = WAV_DEVICE.to_string();
            config.audio.input_device_2 = DEVICE_NONE.to_string();
            Arc::new(WavCaptureBackend::realtime().with_device(WAV_DEVICE, path))
        }
        (None, Some(device)) => {
            config.audio.input_device_1 = device.to_string();
            Arc::new(CpalCaptureBackend::new())
        }
        (None, None) => Arc::new(CpalCaptureBackend::new()),
    };

    let analyzer = AudioAnalyzer::spawn(backend, config.audio.clone(), config.scoring.clone())
        .context("starting the audio analyzer")?;
    let time: Arc<dyn TimeSource> = Arc::new(SystemTimeSource::default());
    let transport = Box::new(HeadlessTransport::new(Arc::clone(&time)));
    let mut session = KaraokeSession::new(config, library, transport, analyzer, time);
    session.enqueue(song)?;

    let mut printed = None;
    let (runner, _commands) = SessionRunner::new(session, RunMode::PlayOnce);
    // Print each lyric line once, as it becomes current
    let mut runner = runner.with_observer(move |session| {
        let current = session.current_line();
        if current.is_some() && current != printed {
            if let Some(line) = current.and_then(|index| session.timeline().get(index)) {
                println!("[{:>7} ms] {}", line.start_ms, line.text);
            }
            printed = current;
        }
    });
    let summary = runner.run().context("running the session")?;

    let session = runner.into_session();
    match summary.last_score {
        Some(score) => {
            println!("Score: {}", score);
            Ok(ExitCode::from(0))
        }
        None => {
            eprintln!(
                "Song did not finish: {}",
                session.message().unwrap_or("unknown reason")
            );
            Ok(ExitCode::from(2))
        }
    }
}

#[derive(Debug, Serialize)]
struct ScoreReport {
    difficulty: Difficulty,
    threshold: f64,
    #[serde(flatten)]
    counters: ScoreCounters,
    score: u8,
}

/// Offline scoring: walk the recording chunk by chunk on the song-time axis.
fn run_score(
    config: &AppConfig,
    lyrics: &Path,
    mic_wav: &Path,
    difficulty: Option<Difficulty>,
) -> Result<ExitCode> {
    let timeline = load_timeline(
        resolve_timing_source(lyrics),
        config.session.default_line_ms,
    );
    let (samples, sample_rate) =
        read_wav_mono(mic_wav).with_context(|| format!("reading {}", mic_wav.display()))?;
    let difficulty = difficulty.unwrap_or(config.audio.difficulty);
    let threshold = config.scoring.threshold_for(difficulty);
    let chunk_size = config.audio.chunk_size.max(1);

    let mut counters = ScoreCounters::default();
    for (index, chunk) in samples.chunks(chunk_size).enumerate() {
        let song_time_ms = (index * chunk_size) as u64 * 1000 / sample_rate.max(1) as u64;
        let line = current_line(&timeline, song_time_ms, config.session.preroll_ms)
            .and_then(|i| timeline.get(i));
        if is_singing(song_time_ms, line) {
            counters.record(chunk_energy(chunk, config.audio.mic1_gain) > threshold);
        }
    }

    let report = ScoreReport {
        difficulty,
        threshold,
        counters,
        score: counters.score(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}
