use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use karaoke_core::analysis::AudioAnalyzer;
use karaoke_core::audio::WavCaptureBackend;
use karaoke_core::config::{AudioConfig, Difficulty, ScoringConfig, DEVICE_NONE};
use karaoke_core::testing::ScriptedCaptureBackend;

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

fn write_wav(name: &str, samples: &[i16]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("{}_{}.wav", name, std::process::id()));
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for &sample in samples {
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
    path
}

fn single_input(device: &str) -> AudioConfig {
    AudioConfig {
        input_device_1: device.to_string(),
        input_device_2: DEVICE_NONE.to_string(),
        ..AudioConfig::default()
    }
}

#[test]
fn wav_microphone_drives_energy_and_score() {
    let path = write_wav("karaoke_core_analyzer_take", &vec![16_384_i16; 8000 * 10]);
    let backend = WavCaptureBackend::realtime().with_device("take", &path);
    let config = AudioConfig {
        sample_rate: 8000,
        ..single_input("take")
    };

    let mut analyzer =
        AudioAnalyzer::spawn(Arc::new(backend), config, ScoringConfig::default()).unwrap();
    analyzer.set_gate(true);
    analyzer.resume().unwrap();

    assert!(wait_until(Duration::from_secs(3), || analyzer.energies()[0] > 100.0));
    assert!(wait_until(Duration::from_secs(3), || analyzer
        .counters()
        .total_samples
        >= 2));
    assert_eq!(analyzer.score(), 100);
    assert!(!analyzer.is_degraded());

    analyzer.shutdown();
    analyzer.shutdown();
    assert!(!analyzer.is_running());
    let _ = std::fs::remove_file(path);
}

#[test]
fn patterned_singer_scores_about_seventy() {
    let backend = ScriptedCaptureBackend::new()
        .with_pattern("default", |chunk| if chunk % 10 < 7 { 0.5 } else { 0.0 });
    let mut analyzer = AudioAnalyzer::spawn(
        Arc::new(backend),
        AudioConfig::default(),
        ScoringConfig::default(),
    )
    .unwrap();

    analyzer.set_gate(true);
    analyzer.resume().unwrap();
    assert!(wait_until(Duration::from_secs(5), || analyzer
        .counters()
        .total_samples
        >= 200));
    analyzer.set_gate(false);
    analyzer.pause();

    let score = analyzer.score();
    assert!((65..=75).contains(&score), "score {score}");
    analyzer.shutdown();
}

#[test]
fn difficulty_raises_the_bar() {
    // Chunk energy is about 0.41, below every tier
    let backend = ScriptedCaptureBackend::new().with_constant("default", 0.0004);
    let config = AudioConfig {
        difficulty: Difficulty::Easy,
        ..AudioConfig::default()
    };
    let mut analyzer =
        AudioAnalyzer::spawn(Arc::new(backend), config.clone(), ScoringConfig::default())
            .unwrap();
    assert_eq!(analyzer.threshold(), 5.0);

    analyzer
        .apply_config(AudioConfig {
            difficulty: Difficulty::Hard,
            ..config
        })
        .unwrap();
    assert_eq!(analyzer.threshold(), 20.0);

    analyzer.set_gate(true);
    analyzer.resume().unwrap();
    assert!(wait_until(Duration::from_secs(2), || analyzer
        .counters()
        .total_samples
        > 0));
    assert_eq!(analyzer.counters().hit_samples, 0);
    analyzer.shutdown();
}

#[test]
fn shutdown_releases_scripted_sources() {
    let backend = ScriptedCaptureBackend::new().with_constant("default", 0.5);
    let watcher = backend.clone();
    let mut analyzer = AudioAnalyzer::spawn(
        Arc::new(backend),
        AudioConfig::default(),
        ScoringConfig::default(),
    )
    .unwrap();

    analyzer.resume().unwrap();
    assert!(wait_until(Duration::from_secs(2), || watcher.live_sources() == 1));

    analyzer.shutdown();
    assert_eq!(watcher.live_sources(), 0);
    assert!(analyzer.resume().is_err());
}

#[test]
fn short_wav_take_goes_silent_without_failing() {
    // Under two chunks of audio at the default chunk size of 1024
    let path = write_wav("karaoke_core_analyzer_short", &vec![16_384_i16; 2000]);
    let backend = WavCaptureBackend::new().with_device("take", &path);
    let mut analyzer = AudioAnalyzer::spawn(
        Arc::new(backend),
        single_input("take"),
        ScoringConfig::default(),
    )
    .unwrap();

    analyzer.set_gate(true);
    analyzer.resume().unwrap();
    assert!(wait_until(Duration::from_secs(3), || analyzer
        .counters()
        .total_samples
        >= 10));

    assert!(analyzer.is_running());
    assert!(!analyzer.is_degraded());
    assert_eq!(analyzer.counters().hit_samples, 2);
    assert_eq!(analyzer.energies()[0], 0.0);

    analyzer.shutdown();
    let _ = std::fs::remove_file(path);
}
