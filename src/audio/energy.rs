// Energy metric for microphone chunks

/// Samples are scaled to the signed 16-bit range before measuring, so
/// thresholds keep the same meaning whatever format the device delivers.
pub const SAMPLE_SCALE: f64 = i16::MAX as f64;

/// Root-sum-square magnitude of the chunk divided by its length, times `gain`.
///
/// This is the "volume" shown on the level meters and compared against the
/// difficulty threshold. An empty chunk has zero energy.
pub fn chunk_energy(samples: &[f32], gain: f32) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let scaled = sample as f64 * SAMPLE_SCALE;
            scaled * scaled
        })
        .sum();
    sum_squares.sqrt() / samples.len() as f64 * gain as f64
}
