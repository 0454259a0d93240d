mod backend;
mod capture;
mod codec;
mod playback;
mod session;

pub use backend::{
    AudioBackend, CaptureHandle, PlaybackHandle, SilenceBackend, CHANNELS, FRAME_DURATION_MS,
    SAMPLES_PER_FRAME, SAMPLE_RATE,
};
pub use capture::CpalBackend;
pub use codec::{AudioDecoder, AudioEncoder};
pub use session::{MediaEvent, MediaSession};
