//! Accumulates inbound client audio into provider-ready batches.

use tracing::debug;

/// Default window length for windowed framing, in seconds.
pub const DEFAULT_WINDOW_SECONDS: f64 = 2.0;

/// One decoded audio frame from the client: PCM16 mono, little-endian,
/// at the declared sample rate. Not retained beyond the current window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub bytes: Vec<u8>,
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(bytes: Vec<u8>, sample_rate: u32) -> Self {
        Self { bytes, sample_rate }
    }
}

/// How inbound frames are grouped before being forwarded upstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FramingMode {
    /// Every inbound frame is forwarded immediately, no buffering.
    PassThrough,
    /// Frames are buffered and flushed as one unit once the buffer holds
    /// `window_seconds` worth of audio at the current sample rate.
    Windowed { window_seconds: f64 },
}

/// Per-session audio batcher.
///
/// In windowed mode a sample-rate change mid-session takes effect for the
/// flush threshold immediately (last-seen value wins) but does not
/// reinterpret bytes already buffered.
#[derive(Debug)]
pub struct FrameAssembler {
    mode: FramingMode,
    buffer: Vec<u8>,
    sample_rate: u32,
}

impl FrameAssembler {
    pub fn new(mode: FramingMode, sample_rate: u32) -> Self {
        Self {
            mode,
            buffer: Vec::new(),
            sample_rate,
        }
    }

    /// The last-seen sample rate, used for frames that do not declare one.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Bytes currently buffered and not yet flushed.
    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Feeds one inbound frame; returns a batch when one is ready to forward.
    ///
    /// Zero-length frames are dropped here so upstream never sees an empty
    /// payload; this is a logged no-op, not a session fault.
    pub fn ingest(&mut self, frame: AudioFrame) -> Option<AudioFrame> {
        if frame.bytes.is_empty() {
            debug!("Dropping empty audio frame.");
            return None;
        }
        self.sample_rate = frame.sample_rate;

        match self.mode {
            FramingMode::PassThrough => Some(frame),
            FramingMode::Windowed { window_seconds } => {
                self.buffer.extend_from_slice(&frame.bytes);
                // 2 bytes per PCM16 sample, mono.
                let threshold = (self.sample_rate as f64 * 2.0 * window_seconds) as usize;
                if self.buffer.len() >= threshold {
                    let batch = std::mem::take(&mut self.buffer);
                    debug!(bytes = batch.len(), "Flushing audio window.");
                    Some(AudioFrame::new(batch, self.sample_rate))
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windowed() -> FrameAssembler {
        FrameAssembler::new(
            FramingMode::Windowed {
                window_seconds: DEFAULT_WINDOW_SECONDS,
            },
            16_000,
        )
    }

    #[test]
    fn below_threshold_never_flushes() {
        let mut asm = windowed();
        for _ in 0..3 {
            assert!(asm.ingest(AudioFrame::new(vec![0u8; 20_000], 16_000)).is_none());
        }
        assert_eq!(asm.buffered_bytes(), 60_000);
    }

    #[test]
    fn three_frames_totaling_window_flush_exactly_once() {
        // 64000 bytes == 16000 Hz * 2 bytes * 2 s.
        let mut asm = windowed();
        assert!(asm.ingest(AudioFrame::new(vec![1u8; 24_000], 16_000)).is_none());
        assert!(asm.ingest(AudioFrame::new(vec![2u8; 24_000], 16_000)).is_none());
        let batch = asm
            .ingest(AudioFrame::new(vec![3u8; 16_000], 16_000))
            .expect("third frame reaches the threshold");
        assert_eq!(batch.bytes.len(), 64_000);
        assert_eq!(batch.sample_rate, 16_000);
        assert_eq!(asm.buffered_bytes(), 0);
    }

    #[test]
    fn empty_frame_is_dropped_without_flush() {
        let mut asm = windowed();
        asm.ingest(AudioFrame::new(vec![0u8; 63_999], 16_000));
        assert!(asm.ingest(AudioFrame::new(vec![], 16_000)).is_none());
        assert_eq!(asm.buffered_bytes(), 63_999);
    }

    #[test]
    fn sample_rate_change_takes_effect_for_threshold() {
        let mut asm = windowed();
        assert!(asm.ingest(AudioFrame::new(vec![0u8; 30_000], 16_000)).is_none());
        // Dropping to 8 kHz lowers the threshold to 32000 bytes; the buffered
        // bytes are kept as-is.
        let batch = asm
            .ingest(AudioFrame::new(vec![0u8; 2_000], 8_000))
            .expect("lower rate lowers the threshold");
        assert_eq!(batch.bytes.len(), 32_000);
        assert_eq!(batch.sample_rate, 8_000);
        assert_eq!(asm.sample_rate(), 8_000);
    }

    #[test]
    fn pass_through_forwards_every_frame() {
        let mut asm = FrameAssembler::new(FramingMode::PassThrough, 16_000);
        let batch = asm.ingest(AudioFrame::new(vec![9u8; 10], 16_000)).unwrap();
        assert_eq!(batch.bytes.len(), 10);
        assert!(asm.ingest(AudioFrame::new(vec![], 16_000)).is_none());
    }
}
