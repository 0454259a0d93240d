use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::error::{ClientError, Result};
use crate::media::backend::{
    AudioBackend, CaptureHandle, PlaybackHandle, SAMPLES_PER_FRAME, SAMPLE_RATE,
};
use crate::media::playback;

/// Platform audio via cpal. Streams are `!Send`, so every stream is owned by
/// a dedicated thread that parks until its stop signal fires.
#[derive(Default)]
pub struct CpalBackend {
    /// Substring match on the input device name; default device when unset.
    pub input_device: Option<String>,
}

impl AudioBackend for CpalBackend {
    fn start_capture(&self) -> Result<CaptureHandle> {
        let (frame_tx, frames) = mpsc::channel(64);
        let (stop, stop_rx) = oneshot::channel();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let device_name = self.input_device.clone();

        std::thread::spawn(move || match build_input_stream(device_name, frame_tx) {
            Ok(stream) => {
                let _ = ready_tx.send(Ok(()));
                let _ = stop_rx.blocking_recv();
                drop(stream);
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
            }
        });

        ready_rx
            .recv()
            .map_err(|_| ClientError::MediaAcquisition("capture thread died".to_string()))??;
        Ok(CaptureHandle { frames, stop })
    }

    fn start_playback(&self) -> Result<PlaybackHandle> {
        playback::start_playback()
    }
}

fn build_input_stream(
    device_name: Option<String>,
    frame_tx: mpsc::Sender<Vec<f32>>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = match &device_name {
        Some(name) => host
            .input_devices()
            .map_err(acquisition)?
            .find(|d| d.name().map(|n| n.contains(name)).unwrap_or(false))
            .ok_or_else(|| {
                ClientError::MediaAcquisition(format!("no input device matching '{name}'"))
            })?,
        None => host.default_input_device().ok_or_else(|| {
            ClientError::MediaAcquisition("no default input device".to_string())
        })?,
    };

    let supported = device
        .supported_input_configs()
        .map_err(acquisition)?
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .filter(|c| c.min_sample_rate().0 <= SAMPLE_RATE && SAMPLE_RATE <= c.max_sample_rate().0)
        .min_by_key(|c| c.channels())
        .ok_or_else(|| {
            ClientError::MediaAcquisition("no f32 input config at 48 kHz".to_string())
        })?
        .with_sample_rate(cpal::SampleRate(SAMPLE_RATE));

    let channels = supported.channels() as usize;
    info!(
        "capturing from '{}' ({} ch)",
        device.name().unwrap_or_else(|_| "unknown".to_string()),
        channels
    );

    let mut acc: Vec<f32> = Vec::with_capacity(SAMPLES_PER_FRAME * 2);
    let stream = device
        .build_input_stream(
            &supported.config(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Downmix by taking the first channel of each frame.
                acc.extend(data.iter().step_by(channels));
                while acc.len() >= SAMPLES_PER_FRAME {
                    let frame: Vec<f32> = acc.drain(..SAMPLES_PER_FRAME).collect();
                    // Realtime thread: drop on overrun instead of blocking.
                    let _ = frame_tx.try_send(frame);
                }
            },
            |err| warn!("input stream error: {}", err),
            None,
        )
        .map_err(acquisition)?;
    stream.play().map_err(acquisition)?;
    Ok(stream)
}

pub(super) fn acquisition(e: impl std::fmt::Display) -> ClientError {
    ClientError::MediaAcquisition(e.to_string())
}
