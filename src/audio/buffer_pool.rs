// BufferPool - lock-free buffer pool with dual SPSC queues
//
// Moves microphone samples from the capture callback to the analyzer thread
// without allocating in the callback.
//
// Buffer flow:
// 1. Capture callback pops an empty buffer from POOL_QUEUE
// 2. Capture callback fills it with the samples it was handed
// 3. Capture callback pushes the filled buffer to DATA_QUEUE
// 4. Analyzer thread pops filled buffers until it has a full chunk
// 5. Analyzer thread pushes the emptied buffer back to POOL_QUEUE

use rtrb::{Consumer, Producer};

pub const DEFAULT_BUFFER_COUNT: usize = 16;
pub const DEFAULT_BUFFER_SIZE: usize = 2048;

/// Audio buffer type - pre-allocated vector of f32 samples
pub type AudioBuffer = Vec<f32>;

/// All four queue ends, as created by [`BufferPool::new`]
pub struct BufferPoolChannels {
    /// Producer for sending filled audio buffers to the analyzer thread
    pub data_producer: Producer<AudioBuffer>,
    /// Consumer for receiving filled audio buffers in the analyzer thread
    pub data_consumer: Consumer<AudioBuffer>,
    /// Producer for returning empty buffers from the analyzer thread
    pub pool_producer: Producer<AudioBuffer>,
    /// Consumer for retrieving empty buffers in the capture callback
    pub pool_consumer: Consumer<AudioBuffer>,
}

/// Queue ends owned by the capture callback
pub struct CallbackChannels {
    pub pool_consumer: Consumer<AudioBuffer>,
    pub data_producer: Producer<AudioBuffer>,
}

/// Queue ends owned by the chunk reader
pub struct ReaderChannels {
    pub data_consumer: Consumer<AudioBuffer>,
    pub pool_producer: Producer<AudioBuffer>,
}

impl BufferPoolChannels {
    pub fn split(self) -> (CallbackChannels, ReaderChannels) {
        (
            CallbackChannels {
                pool_consumer: self.pool_consumer,
                data_producer: self.data_producer,
            },
            ReaderChannels {
                data_consumer: self.data_consumer,
                pool_producer: self.pool_producer,
            },
        )
    }
}

impl CallbackChannels {
    /// Copy `samples` into a pooled buffer and hand it to the reader.
    ///
    /// Returns false when no empty buffer was available (reader is behind);
    /// the samples are dropped in that case. Input longer than a buffer's
    /// capacity is truncated rather than reallocating.
    pub fn push_samples(&mut self, samples: &[f32]) -> bool {
        let Ok(mut buffer) = self.pool_consumer.pop() else {
            return false;
        };
        let take = samples.len().min(buffer.capacity());
        buffer.clear();
        buffer.extend_from_slice(&samples[..take]);
        self.data_producer.push(buffer).is_ok()
    }
}

/// Lock-free buffer pool using dual SPSC ring buffers
///
/// Pre-allocates a fixed number of audio buffers and manages them through
/// two lock-free queues.
///
/// # Example
/// ```ignore
/// let (mut callback, mut reader) = BufferPool::new(16, 2048).split();
///
/// // In the capture callback:
/// callback.push_samples(data);
///
/// // In the analyzer thread:
/// if let Ok(buffer) = reader.data_consumer.pop() {
///     // consume samples
///     reader.pool_producer.push(buffer).ok();
/// }
/// ```
pub struct BufferPool;

impl BufferPool {
    /// Create a new BufferPool with specified buffer count and size
    ///
    /// # Panics
    /// Panics if buffer_count is 0 or buffer_size is 0
    #[allow(clippy::new_ret_no_self)]
    pub fn new(buffer_count: usize, buffer_size: usize) -> BufferPoolChannels {
        assert!(buffer_count > 0, "buffer_count must be greater than 0");
        assert!(buffer_size > 0, "buffer_size must be greater than 0");

        let (mut pool_producer, pool_consumer) = rtrb::RingBuffer::new(buffer_count);
        let (data_producer, data_consumer) = rtrb::RingBuffer::new(buffer_count);

        // The only place where heap allocation occurs
        for _ in 0..buffer_count {
            let buffer = vec![0.0_f32; buffer_size];
            pool_producer
                .push(buffer)
                .expect("Failed to push buffer to pool queue during initialization");
        }

        BufferPoolChannels {
            data_producer,
            data_consumer,
            pool_producer,
            pool_consumer,
        }
    }
}
