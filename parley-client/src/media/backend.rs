use ringbuf::HeapProd;
use ringbuf::traits::Producer;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::error::Result;

/// Fixed voice profile: 48 kHz mono, 20 ms frames (the Opus VoIP standard).
pub const SAMPLE_RATE: u32 = 48_000;
pub const CHANNELS: u16 = 1;
pub const FRAME_DURATION_MS: u32 = 20;
pub const SAMPLES_PER_FRAME: usize = (SAMPLE_RATE as usize / 1000) * FRAME_DURATION_MS as usize;

/// A live microphone stream: 20 ms PCM frames plus the stop signal that
/// releases the device. Dropping `stop` releases the capture resource.
pub struct CaptureHandle {
    pub frames: mpsc::Receiver<Vec<f32>>,
    pub stop: oneshot::Sender<()>,
}

/// Sink for decoded remote audio. Samples pushed here reach the speaker;
/// overruns drop samples rather than block.
pub struct PlaybackHandle {
    pub producer: HeapProd<f32>,
    pub stop: oneshot::Sender<()>,
}

impl PlaybackHandle {
    pub fn push(&mut self, samples: &[f32]) -> usize {
        self.producer.push_slice(samples)
    }
}

/// Seam between the media session and the platform audio stack. The media
/// session never touches a device directly, which keeps negotiation testable
/// without hardware.
pub trait AudioBackend: Send + Sync {
    fn start_capture(&self) -> Result<CaptureHandle>;

    fn start_playback(&self) -> Result<PlaybackHandle>;
}

/// Backend producing silence and discarding playback. Used for headless
/// sessions and tests.
pub struct SilenceBackend;

impl AudioBackend for SilenceBackend {
    fn start_capture(&self) -> Result<CaptureHandle> {
        let (frame_tx, frames) = mpsc::channel(64);
        let (stop, mut stop_rx) = oneshot::channel();

        std::thread::spawn(move || {
            loop {
                std::thread::sleep(Duration::from_millis(FRAME_DURATION_MS as u64));
                match stop_rx.try_recv() {
                    Err(oneshot::error::TryRecvError::Empty) => {}
                    _ => break,
                }
                match frame_tx.try_send(vec![0.0f32; SAMPLES_PER_FRAME]) {
                    Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => {}
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
        });

        Ok(CaptureHandle { frames, stop })
    }

    fn start_playback(&self) -> Result<PlaybackHandle> {
        use ringbuf::HeapRb;
        use ringbuf::traits::Split;

        let (producer, consumer) = HeapRb::<f32>::new(SAMPLE_RATE as usize).split();
        drop(consumer);
        let (stop, _stop_rx) = oneshot::channel();
        Ok(PlaybackHandle { producer, stop })
    }
}
