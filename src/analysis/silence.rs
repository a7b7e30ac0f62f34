//! # Silence Gate
//!
//! Cheap local admission filter for streamed audio chunks. Browser clients
//! deliver each chunk as a WAV blob: a 44-byte RIFF header followed by 16-bit
//! little-endian signed PCM. Computing the RMS amplitude of the payload lets
//! the stream pipeline skip the external model call entirely during hold
//! music, dead air, or other genuine silence.
//!
//! A corrupt chunk must never crash or stall a session, so every decoding
//! failure (empty payload, truncated header, no complete sample) is reported
//! as "silent" rather than as an error.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Size of the RIFF/WAVE container header preceding the PCM samples.
pub const WAV_HEADER_BYTES: usize = 44;

/// Decide whether an audio chunk is silent.
///
/// Returns true when the RMS amplitude of the 16-bit PCM payload falls below
/// `threshold`, or when the chunk has no decodable samples at all.
pub fn is_silent(chunk: &[u8], threshold: f64) -> bool {
    match rms_amplitude(chunk) {
        Some(rms) => rms < threshold,
        None => true,
    }
}

/// RMS amplitude over the PCM payload, or None when the chunk is too short
/// to contain even one complete sample after the header. A trailing odd byte
/// is ignored.
fn rms_amplitude(chunk: &[u8]) -> Option<f64> {
    if chunk.len() <= WAV_HEADER_BYTES {
        return None;
    }

    let pcm = &chunk[WAV_HEADER_BYTES..];
    let sample_count = pcm.len() / 2;
    if sample_count == 0 {
        return None;
    }

    let mut cursor = Cursor::new(&pcm[..sample_count * 2]);
    let mut sum_squares = 0.0f64;
    for _ in 0..sample_count {
        let sample = cursor.read_i16::<LittleEndian>().ok()? as f64;
        sum_squares += sample * sample;
    }

    Some((sum_squares / sample_count as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f64 = 500.0;

    /// Build a minimal WAV-like blob: 44-byte dummy header + 16-bit LE PCM.
    fn wav_bytes(samples: &[i16]) -> Vec<u8> {
        let mut data = vec![0u8; WAV_HEADER_BYTES];
        for sample in samples {
            data.extend_from_slice(&sample.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_all_zero_pcm_is_silent() {
        let audio = wav_bytes(&[0; 100]);
        assert!(is_silent(&audio, THRESHOLD));
    }

    #[test]
    fn test_low_amplitude_is_silent() {
        // RMS of +-10 is 10, well below the default threshold
        let samples: Vec<i16> = [10, -10, 10, -10].repeat(25);
        let audio = wav_bytes(&samples);
        assert!(is_silent(&audio, THRESHOLD));
    }

    #[test]
    fn test_loud_audio_is_not_silent() {
        let samples: Vec<i16> = [20000, -20000].repeat(50);
        let audio = wav_bytes(&samples);
        assert!(!is_silent(&audio, THRESHOLD));
    }

    #[test]
    fn test_header_only_is_silent() {
        let audio = vec![0u8; WAV_HEADER_BYTES];
        assert!(is_silent(&audio, THRESHOLD));
    }

    #[test]
    fn test_empty_buffer_is_silent() {
        assert!(is_silent(&[], THRESHOLD));
    }

    #[test]
    fn test_truncated_header_is_silent() {
        let audio = vec![0u8; 20];
        assert!(is_silent(&audio, THRESHOLD));
    }

    #[test]
    fn test_single_byte_payload_is_silent() {
        // Header plus one byte: not enough for a 16-bit sample
        let mut audio = vec![0u8; WAV_HEADER_BYTES];
        audio.push(0x01);
        assert!(is_silent(&audio, THRESHOLD));
    }

    #[test]
    fn test_odd_payload_ignores_trailing_byte() {
        let samples: Vec<i16> = [20000, -20000].repeat(50);
        let mut audio = wav_bytes(&samples);
        audio.push(0x7f);
        assert!(!is_silent(&audio, THRESHOLD));
    }

    #[test]
    fn test_custom_threshold() {
        // RMS of +-5000 is 5000: silent at threshold 30000, loud at 100
        let samples: Vec<i16> = [5000, -5000].repeat(50);
        let audio = wav_bytes(&samples);
        assert!(is_silent(&audio, 30000.0));
        assert!(!is_silent(&audio, 100.0));
    }
}
