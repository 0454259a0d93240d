use crate::error::Result;
use crate::media::backend::{SAMPLES_PER_FRAME, SAMPLE_RATE};

/// Upper bound for one encoded Opus packet.
const MAX_PACKET_BYTES: usize = 4000;

pub const DEFAULT_BITRATE: u32 = 64_000;

/// Opus encoder fixed to the voice profile (48 kHz mono, 20 ms frames).
pub struct AudioEncoder {
    encoder: opus::Encoder,
    packet: Vec<u8>,
}

impl AudioEncoder {
    pub fn new(bitrate: u32) -> Result<Self> {
        let mut encoder =
            opus::Encoder::new(SAMPLE_RATE, opus::Channels::Mono, opus::Application::Voip)?;
        encoder.set_bitrate(opus::Bitrate::Bits(bitrate as i32))?;
        Ok(Self {
            encoder,
            packet: vec![0u8; MAX_PACKET_BYTES],
        })
    }

    /// Encodes one 20 ms PCM frame into an Opus packet.
    pub fn encode(&mut self, pcm: &[f32]) -> Result<Vec<u8>> {
        let written = self.encoder.encode_float(pcm, &mut self.packet)?;
        Ok(self.packet[..written].to_vec())
    }
}

/// Opus decoder for the remote track. Output buffer holds up to the maximum
/// 120 ms frame so any conformant packet decodes without reallocation.
pub struct AudioDecoder {
    decoder: opus::Decoder,
    pcm: Vec<f32>,
}

impl AudioDecoder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            decoder: opus::Decoder::new(SAMPLE_RATE, opus::Channels::Mono)?,
            pcm: vec![0.0f32; SAMPLES_PER_FRAME * 6],
        })
    }

    /// Decodes one Opus packet, returning the PCM samples.
    pub fn decode(&mut self, packet: &[u8]) -> Result<&[f32]> {
        let samples = self.decoder.decode_float(packet, &mut self.pcm, false)?;
        Ok(&self.pcm[..samples])
    }
}
