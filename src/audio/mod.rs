// Audio module - microphone capture and the chunk energy metric

pub mod buffer_pool;
pub mod capture;
pub mod capture_cpal;
pub mod capture_wav;
pub mod energy;

pub use buffer_pool::{
    AudioBuffer, BufferPool, BufferPoolChannels, DEFAULT_BUFFER_COUNT, DEFAULT_BUFFER_SIZE,
};
pub use capture::{CaptureBackend, CaptureRequest, CaptureSource};
pub use capture_cpal::{list_input_devices, CpalCaptureBackend};
pub use capture_wav::{read_wav_mono, WavCaptureBackend};
pub use energy::chunk_energy;
