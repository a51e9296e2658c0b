//! CPAL-based microphone capture for desktop platforms (Linux, macOS, Windows)
//!
//! The cpal callback only copies samples into pooled buffers; the analyzer
//! thread assembles them into fixed-size chunks in [`CpalCapture::read_chunk`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::buffer_pool::{BufferPool, CallbackChannels, ReaderChannels, DEFAULT_BUFFER_COUNT};
use super::capture::{CaptureBackend, CaptureRequest, CaptureSource};
use crate::config::DEVICE_DEFAULT;
use crate::error::AudioError;

/// Poll interval while waiting for the callback to deliver more samples
const READ_POLL: Duration = Duration::from_millis(1);

/// Opens microphones through the default cpal host
#[derive(Debug, Default)]
pub struct CpalCaptureBackend {
    _unit: (),
}

impl CpalCaptureBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Names of all input devices on the default host
pub fn list_input_devices() -> Result<Vec<String>, AudioError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| AudioError::HardwareError {
            details: format!("Failed to enumerate input devices: {}", e),
        })?;
    Ok(devices.filter_map(|device| device.name().ok()).collect())
}

fn find_device(host: &cpal::Host, name: &str) -> Result<cpal::Device, AudioError> {
    if name.eq_ignore_ascii_case(DEVICE_DEFAULT) {
        return host
            .default_input_device()
            .ok_or_else(|| AudioError::DeviceNotFound {
                device: name.to_string(),
            });
    }

    let devices = host
        .input_devices()
        .map_err(|e| AudioError::HardwareError {
            details: format!("Failed to enumerate input devices: {}", e),
        })?;

    for device in devices {
        if let Ok(device_name) = device.name() {
            if device_name == name || device_name.contains(name) {
                return Ok(device);
            }
        }
    }

    Err(AudioError::DeviceNotFound {
        device: name.to_string(),
    })
}

impl CaptureBackend for CpalCaptureBackend {
    fn open(&self, request: &CaptureRequest) -> Result<Box<dyn CaptureSource>, AudioError> {
        let host = cpal::default_host();
        let device = find_device(&host, &request.device)?;
        let device_name = device.name().unwrap_or_else(|_| request.device.clone());

        let config = device
            .default_input_config()
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("Failed to get default input config: {:?}", e),
            })?;
        let stream_config: cpal::StreamConfig = config.clone().into();
        let channels_count = (stream_config.channels as usize).max(1);

        if stream_config.sample_rate.0 != request.sample_rate {
            tracing::info!(
                "[Capture] {} runs at {} Hz (requested {} Hz)",
                device_name,
                stream_config.sample_rate.0,
                request.sample_rate
            );
        }

        let buffer_size = (request.chunk_size * 2).max(super::DEFAULT_BUFFER_SIZE);
        let (callback, reader) = BufferPool::new(DEFAULT_BUFFER_COUNT, buffer_size).split();

        let failed = Arc::new(AtomicBool::new(false));
        let failed_cb = Arc::clone(&failed);
        let err_name = device_name.clone();
        let err_fn = move |err: cpal::StreamError| {
            tracing::error!("[Capture] Input stream error on {}: {}", err_name, err);
            failed_cb.store(true, Ordering::SeqCst);
        };

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                let mut sink = MonoSink::new(callback, channels_count, buffer_size);
                device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        sink.push_interleaved(data.iter().copied());
                    },
                    err_fn,
                    None,
                )
            }
            cpal::SampleFormat::I16 => {
                let mut sink = MonoSink::new(callback, channels_count, buffer_size);
                device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        sink.push_interleaved(data.iter().map(|&s| s as f32 / i16::MAX as f32));
                    },
                    err_fn,
                    None,
                )
            }
            cpal::SampleFormat::U16 => {
                let mut sink = MonoSink::new(callback, channels_count, buffer_size);
                device.build_input_stream(
                    &stream_config,
                    move |data: &[u16], _: &cpal::InputCallbackInfo| {
                        sink.push_interleaved(data.iter().map(|&s| (s as f32 - 32768.0) / 32768.0));
                    },
                    err_fn,
                    None,
                )
            }
            other => {
                return Err(AudioError::StreamOpenFailed {
                    reason: format!("Unsupported input sample format {:?}", other),
                })
            }
        }
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("{:?}", e),
        })?;

        stream.play().map_err(|e| AudioError::HardwareError {
            details: format!("Input start failed: {}", e),
        })?;

        tracing::info!(
            "[Capture] Opened {} ({} ch, {} Hz, chunk {})",
            device_name,
            channels_count,
            stream_config.sample_rate.0,
            request.chunk_size
        );

        Ok(Box::new(CpalCapture {
            _stream: stream,
            device_name,
            reader,
            carry: Vec::with_capacity(request.chunk_size * 2),
            failed,
            interrupt: Arc::clone(&request.interrupt),
        }))
    }
}

/// Callback-side state: de-interleaves to the first channel into a scratch
/// buffer, then hands it to the pool.
struct MonoSink {
    channels: CallbackChannels,
    channels_count: usize,
    scratch: Vec<f32>,
}

impl MonoSink {
    fn new(channels: CallbackChannels, channels_count: usize, capacity: usize) -> Self {
        Self {
            channels,
            channels_count,
            scratch: Vec::with_capacity(capacity),
        }
    }

    fn push_interleaved<I: Iterator<Item = f32>>(&mut self, samples: I) {
        self.scratch.clear();
        self.scratch.extend(samples.step_by(self.channels_count));
        // Dropped when the reader falls behind; the next chunk catches up
        let _ = self.channels.push_samples(&self.scratch);
    }
}

/// Open cpal input stream plus the reader half of its buffer pool.
///
/// Dropping it closes the device.
pub struct CpalCapture {
    _stream: cpal::Stream,
    device_name: String,
    reader: ReaderChannels,
    carry: Vec<f32>,
    failed: Arc<AtomicBool>,
    interrupt: Arc<AtomicBool>,
}

impl CpalCapture {
    fn drain_ready(&mut self) {
        while let Ok(buffer) = self.reader.data_consumer.pop() {
            self.carry.extend_from_slice(&buffer);
            if self.reader.pool_producer.push(buffer).is_err() {
                tracing::warn!("[Capture] Pool queue full, dropping buffer");
            }
        }
    }
}

impl CaptureSource for CpalCapture {
    fn device_name(&self) -> &str {
        &self.device_name
    }

    fn read_chunk(&mut self, chunk: &mut [f32]) -> Result<(), AudioError> {
        loop {
            self.drain_ready();

            if self.carry.len() >= chunk.len() {
                chunk.copy_from_slice(&self.carry[..chunk.len()]);
                self.carry.drain(..chunk.len());
                return Ok(());
            }

            if self.failed.load(Ordering::SeqCst) {
                return Err(AudioError::StreamFailure {
                    reason: format!("input stream on {} reported an error", self.device_name),
                });
            }

            if self.interrupt.load(Ordering::SeqCst) {
                self.discard_pending();
                return Err(AudioError::Interrupted);
            }

            thread::sleep(READ_POLL);
        }
    }

    fn discard_pending(&mut self) {
        let mut dropped = self.carry.len();
        self.carry.clear();
        while let Ok(buffer) = self.reader.data_consumer.pop() {
            dropped += buffer.len();
            if self.reader.pool_producer.push(buffer).is_err() {
                tracing::warn!("[Capture] Pool queue full, dropping buffer");
            }
        }
        if dropped > 0 {
            tracing::debug!(
                "[Capture] Discarded {} stale samples on {}",
                dropped,
                self.device_name
            );
        }
    }
}
