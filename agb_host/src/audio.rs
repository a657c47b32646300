//! Lossy audio output through a fixed pool of buffers.
//!
//! The pool never blocks the emulation thread: when every slot is still
//! queued on the device, the chunk is dropped and counted. Slot liveness is
//! re-queried from the platform on every publish rather than cached, so the
//! pool itself carries no free-list state.
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use cpal::traits::DeviceTrait;
use cpal::traits::HostTrait;
use cpal::traits::StreamTrait;
use cpal::BuildStreamError;
use cpal::SampleFormat;
use cpal::SizedSample;
use cpal::Stream;
use cpal::StreamConfig;
use log::debug;
use log::error;
use log::info;

use crate::common::constants::AUDIO_CHUNK_SAMPLES;
use crate::common::constants::AUDIO_SAMPLE_RATE;

/// Platform audio output as seen by the buffer pool.
///
/// A slot is "in flight" while its previous submission is still queued for
/// playback. The status is owned by the platform; implementations must
/// answer from the device's current bookkeeping, not from a local cache.
pub trait AudioOut {
    fn slot_in_flight(&self, slot: usize) -> bool;

    /// Queues the chunk held in `slot` for playback.
    fn submit(&mut self, slot: usize, samples: &[i16]);
}

/// Fixed ring of output buffers with a drop-on-full policy.
pub struct AudioBufferPool {
    slots: Vec<Vec<i16>>,
    published_chunks: u64,
    dropped_chunks: u64,
}

impl AudioBufferPool {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![vec![0; AUDIO_CHUNK_SAMPLES]; slot_count],
            published_chunks: 0,
            dropped_chunks: 0,
        }
    }

    /// Copies `samples` into the first slot the platform reports free and
    /// queues it. When every slot is in flight the chunk is dropped
    /// silently; audio pressure never stalls the caller.
    pub fn publish(&mut self, samples: &[i16], out: &mut dyn AudioOut) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if out.slot_in_flight(index) {
                continue;
            }
            let len = samples.len().min(slot.len());
            slot[..len].copy_from_slice(&samples[..len]);
            out.submit(index, &slot[..len]);
            self.published_chunks += 1;
            return;
        }
        self.dropped_chunks += 1;
        debug!("all audio slots in flight, dropping chunk");
    }

    pub fn published_chunks(&self) -> u64 {
        self.published_chunks
    }

    /// Chunks discarded because the pool was exhausted. A quality
    /// degradation signal, not an error.
    pub fn dropped_chunks(&self) -> u64 {
        self.dropped_chunks
    }
}

/// One submitted chunk waiting to be consumed by the stream callback.
struct QueuedChunk {
    slot: usize,
    samples: Vec<i16>,
    cursor: usize,
}

/// Chunks queued for playback, drained sample-by-sample by the cpal
/// callback. A slot stays in flight until its chunk is fully consumed.
#[derive(Default)]
struct SlotQueue {
    queued: VecDeque<QueuedChunk>,
}

impl SlotQueue {
    fn contains_slot(&self, slot: usize) -> bool {
        self.queued.iter().any(|chunk| chunk.slot == slot)
    }

    fn next_sample(&mut self) -> Option<i16> {
        let chunk = self.queued.front_mut()?;
        if chunk.cursor >= chunk.samples.len() {
            self.queued.pop_front();
            return self.next_sample();
        }
        let sample = chunk.samples[chunk.cursor];
        chunk.cursor += 1;
        Some(sample)
    }
}

/// Owns the cpal stream. Lives on the render/UI thread: the stream itself
/// is not `Send`, and device bring-up and teardown belong to that thread
/// anyway. The emulation thread only sees the [`CpalAudioHandle`].
pub struct CpalAudioOutput {
    stream: Option<Stream>,
    queue: Arc<Mutex<SlotQueue>>,
}

impl Default for CpalAudioOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalAudioOutput {
    pub fn new() -> Self {
        Self {
            stream: None,
            queue: Arc::new(Mutex::new(SlotQueue::default())),
        }
    }

    /// Handle for the emulation thread's buffer pool.
    pub fn handle(&self) -> CpalAudioHandle {
        CpalAudioHandle {
            queue: self.queue.clone(),
        }
    }

    pub fn start(&mut self) {
        if self.stream.is_some() {
            return;
        }

        info!("Starting audio output");
        let stream = match self.setup_audio_stream() {
            Ok(stream) => stream,
            Err(err) => {
                error!("Failed to setup audio stream: {err}");
                return;
            }
        };

        if let Err(err) = stream.play() {
            error!("Error playing audio stream: {err}");
            return;
        }
        self.stream = Some(stream);
    }

    fn setup_audio_stream(&self) -> Result<Stream, BuildStreamError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(BuildStreamError::DeviceNotAvailable)?;

        let supported_config = device
            .default_output_config()
            .map_err(|_| BuildStreamError::StreamConfigNotSupported)?;

        let config = StreamConfig {
            channels: 2,
            sample_rate: cpal::SampleRate(AUDIO_SAMPLE_RATE),
            buffer_size: cpal::BufferSize::Default,
        };

        match supported_config.sample_format() {
            SampleFormat::F32 => self.build_stream::<f32>(&device, &config),
            SampleFormat::I16 => self.build_stream::<i16>(&device, &config),
            SampleFormat::U16 => self.build_stream::<u16>(&device, &config),
            _ => Err(BuildStreamError::StreamConfigNotSupported),
        }
    }

    fn build_stream<T: SampleConverter>(
        &self,
        device: &cpal::Device,
        config: &StreamConfig,
    ) -> Result<Stream, BuildStreamError> {
        let queue = self.queue.clone();
        device.build_output_stream(
            config,
            move |data: &mut [T::Output], _: &cpal::OutputCallbackInfo| {
                if let Ok(mut queue) = queue.lock() {
                    // Chunks are interleaved stereo; pull two samples per
                    // output frame.
                    for frame in data.chunks_exact_mut(2) {
                        frame[0] = queue
                            .next_sample()
                            .map(T::convert)
                            .unwrap_or_else(T::silence);
                        frame[1] = queue
                            .next_sample()
                            .map(T::convert)
                            .unwrap_or_else(T::silence);
                    }
                }
            },
            |err| error!("Error in audio stream: {err}"),
            None,
        )
    }

    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            info!("Stopping audio output");
            drop(stream);
        }
    }
}

/// The emulation-thread side of a [`CpalAudioOutput`]: submissions go into
/// the shared queue, and a slot counts as in flight while the stream
/// callback has not consumed its chunk yet.
pub struct CpalAudioHandle {
    queue: Arc<Mutex<SlotQueue>>,
}

impl AudioOut for CpalAudioHandle {
    fn slot_in_flight(&self, slot: usize) -> bool {
        self.queue
            .lock()
            .map(|queue| queue.contains_slot(slot))
            .unwrap_or(false)
    }

    fn submit(&mut self, slot: usize, samples: &[i16]) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.queued.push_back(QueuedChunk {
                slot,
                samples: samples.to_vec(),
                cursor: 0,
            });
        }
    }
}

/// Handles conversion between different sample formats
trait SampleConverter {
    type Output: SizedSample;
    fn convert(input: i16) -> Self::Output;
    fn silence() -> Self::Output;
}

impl SampleConverter for f32 {
    type Output = f32;
    fn convert(input: i16) -> Self::Output {
        input as f32 / 32768.0
    }
    fn silence() -> Self::Output {
        0.0
    }
}

impl SampleConverter for i16 {
    type Output = i16;
    fn convert(input: i16) -> Self::Output {
        input
    }
    fn silence() -> Self::Output {
        0
    }
}

impl SampleConverter for u16 {
    type Output = u16;
    fn convert(input: i16) -> Self::Output {
        ((input as i32 + 32768) as u32).min(65535) as u16
    }
    fn silence() -> Self::Output {
        32768
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;

    use super::*;

    /// Records submissions; in-flight status is scripted by the test.
    #[derive(Default)]
    struct FakeAudioOut {
        in_flight: HashSet<usize>,
        submissions: Vec<(usize, Vec<i16>)>,
    }

    impl AudioOut for FakeAudioOut {
        fn slot_in_flight(&self, slot: usize) -> bool {
            self.in_flight.contains(&slot)
        }

        fn submit(&mut self, slot: usize, samples: &[i16]) {
            self.submissions.push((slot, samples.to_vec()));
        }
    }

    fn chunk(value: i16) -> Vec<i16> {
        vec![value; AUDIO_CHUNK_SAMPLES]
    }

    #[test]
    fn test_publish_uses_first_free_slot() {
        let mut pool = AudioBufferPool::new(3);
        let mut out = FakeAudioOut::default();
        out.in_flight.insert(0);

        pool.publish(&chunk(7), &mut out);

        assert_eq!(out.submissions.len(), 1);
        assert_eq!(out.submissions[0].0, 1);
        assert_eq!(out.submissions[0].1, chunk(7));
        assert_eq!(pool.published_chunks(), 1);
        assert_eq!(pool.dropped_chunks(), 0);
    }

    #[test]
    fn test_exhausted_pool_drops_chunk() {
        let mut pool = AudioBufferPool::new(2);
        pool.publish(&chunk(1), &mut FakeAudioOut::default());
        let before: Vec<Vec<i16>> = pool.slots.clone();

        let mut out = FakeAudioOut::default();
        out.in_flight.extend([0, 1]);
        pool.publish(&chunk(9), &mut out);

        // Nothing submitted, no slot contents altered, drop counted.
        assert!(out.submissions.is_empty());
        assert_eq!(pool.slots, before);
        assert_eq!(pool.dropped_chunks(), 1);
        assert_eq!(pool.published_chunks(), 1);
    }

    #[test]
    fn test_liveness_requeried_each_publish() {
        let mut pool = AudioBufferPool::new(2);
        let mut out = FakeAudioOut::default();

        out.in_flight.extend([0, 1]);
        pool.publish(&chunk(1), &mut out);
        assert_eq!(pool.dropped_chunks(), 1);

        // The platform retired slot 0; the next publish must see it.
        out.in_flight.remove(&0);
        pool.publish(&chunk(2), &mut out);
        assert_eq!(out.submissions.len(), 1);
        assert_eq!(out.submissions[0].0, 0);
    }

    #[test]
    fn test_cpal_handle_tracks_queue() {
        // No device involved until start() is called; the handle only
        // talks to the shared queue.
        let output = CpalAudioOutput::new();
        let mut handle = output.handle();
        assert!(!handle.slot_in_flight(0));
        handle.submit(0, &[1, 2]);
        assert!(handle.slot_in_flight(0));
        assert!(!handle.slot_in_flight(1));
    }

    #[test]
    fn test_slot_queue_tracks_in_flight() {
        let mut queue = SlotQueue::default();
        queue.queued.push_back(QueuedChunk {
            slot: 2,
            samples: vec![5, 6],
            cursor: 0,
        });
        assert!(queue.contains_slot(2));
        assert!(!queue.contains_slot(0));

        assert_eq!(queue.next_sample(), Some(5));
        assert_eq!(queue.next_sample(), Some(6));
        // Chunk exhausted; the slot is retired on the next pull.
        assert_eq!(queue.next_sample(), None);
        assert!(!queue.contains_slot(2));
    }
}
