use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer, Split};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::error::{ClientError, Result};
use crate::media::backend::{PlaybackHandle, SAMPLE_RATE};
use crate::media::capture::acquisition;

/// Half a second of decoded remote audio buffered between the decoder task
/// and the realtime output callback.
const BUFFER_SAMPLES: usize = SAMPLE_RATE as usize / 2;

pub(super) fn start_playback() -> Result<PlaybackHandle> {
    let (producer, consumer) = HeapRb::<f32>::new(BUFFER_SAMPLES).split();
    let (stop, stop_rx) = oneshot::channel();
    let (ready_tx, ready_rx) = std::sync::mpsc::channel();

    std::thread::spawn(move || match build_output_stream(consumer) {
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
        .map_err(|_| ClientError::MediaAcquisition("playback thread died".to_string()))??;
    Ok(PlaybackHandle { producer, stop })
}

fn build_output_stream(mut consumer: ringbuf::HeapCons<f32>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or_else(|| {
        ClientError::MediaAcquisition("no default output device".to_string())
    })?;

    let supported = device
        .supported_output_configs()
        .map_err(acquisition)?
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .filter(|c| c.min_sample_rate().0 <= SAMPLE_RATE && SAMPLE_RATE <= c.max_sample_rate().0)
        .min_by_key(|c| c.channels())
        .ok_or_else(|| {
            ClientError::MediaAcquisition("no f32 output config at 48 kHz".to_string())
        })?
        .with_sample_rate(cpal::SampleRate(SAMPLE_RATE));

    let channels = supported.channels() as usize;
    info!(
        "playing back on '{}' ({} ch)",
        device.name().unwrap_or_else(|_| "unknown".to_string()),
        channels
    );

    let stream = device
        .build_output_stream(
            &supported.config(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                // Mono source fanned out to every output channel; underruns
                // play silence.
                for frame in data.chunks_mut(channels) {
                    let sample = consumer.try_pop().unwrap_or(0.0);
                    frame.fill(sample);
                }
            },
            |err| warn!("output stream error: {}", err),
            None,
        )
        .map_err(acquisition)?;
    stream.play().map_err(acquisition)?;
    Ok(stream)
}
