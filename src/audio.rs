use base64::Engine;

use crate::error::AudioError;
use crate::mime::parse_mime_type_with;

pub const WAV_HEADER_LEN: usize = 44;
const FMT_CHUNK_LEN: u32 = 16;
const PCM_FORMAT_TAG: u16 = 1;

/// Fully resolved PCM layout. Construction rejects layouts whose derived
/// header fields would be zero or overflow their WAV field widths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PcmFormat {
    channel_count: u16,
    sample_rate_hz: u32,
    bits_per_sample: u16,
}

impl PcmFormat {
    pub fn new(
        channel_count: u16,
        sample_rate_hz: u32,
        bits_per_sample: u16,
    ) -> Result<Self, AudioError> {
        if channel_count == 0 {
            return Err(AudioError::InvalidFormat("channel count must be at least 1".into()));
        }
        if sample_rate_hz == 0 {
            return Err(AudioError::InvalidFormat("sample rate must be at least 1 Hz".into()));
        }
        if bits_per_sample == 0 || bits_per_sample % 8 != 0 {
            return Err(AudioError::InvalidFormat(format!(
                "{bits_per_sample} bits per sample is not a whole number of bytes"
            )));
        }
        let block_align = u64::from(channel_count) * u64::from(bits_per_sample / 8);
        if block_align > u64::from(u16::MAX) {
            return Err(AudioError::InvalidFormat(format!(
                "block align {block_align} exceeds 16 bits"
            )));
        }
        if block_align * u64::from(sample_rate_hz) > u64::from(u32::MAX) {
            return Err(AudioError::InvalidFormat("byte rate exceeds 32 bits".into()));
        }
        Ok(Self {
            channel_count,
            sample_rate_hz,
            bits_per_sample,
        })
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    pub fn block_align(&self) -> u16 {
        self.channel_count * (self.bits_per_sample / 8)
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate_hz * u32::from(self.block_align())
    }
}

/// A complete WAV file: canonical header followed by the PCM samples.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WavBuffer(Vec<u8>);

impl WavBuffer {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Fields of a canonical 44-byte header, as read back from a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WavHeader {
    pub riff_size: u32,
    pub format_tag: u16,
    pub channel_count: u16,
    pub sample_rate_hz: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_len: u32,
}

impl WavHeader {
    pub fn duration_secs(&self) -> Option<f64> {
        if self.byte_rate == 0 {
            return None;
        }
        Some(f64::from(self.data_len) / f64::from(self.byte_rate))
    }
}

pub fn write_wav_header(
    out: &mut Vec<u8>,
    format: &PcmFormat,
    data_len: usize,
) -> Result<(), AudioError> {
    let data_len_u32 = u32::try_from(data_len)
        .ok()
        .filter(|len| len.checked_add(36).is_some())
        .ok_or(AudioError::PayloadTooLarge(data_len))?;

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len_u32).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    out.extend_from_slice(&PCM_FORMAT_TAG.to_le_bytes());
    out.extend_from_slice(&format.channel_count().to_le_bytes());
    out.extend_from_slice(&format.sample_rate_hz().to_le_bytes());
    out.extend_from_slice(&format.byte_rate().to_le_bytes());
    out.extend_from_slice(&format.block_align().to_le_bytes());
    out.extend_from_slice(&format.bits_per_sample().to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len_u32.to_le_bytes());
    Ok(())
}

pub fn wav_header(data_len: usize, format: &PcmFormat) -> Result<Vec<u8>, AudioError> {
    let mut out = Vec::with_capacity(WAV_HEADER_LEN);
    write_wav_header(&mut out, format, data_len)?;
    Ok(out)
}

pub fn wrap_pcm_to_wav(pcm: &[u8], format: &PcmFormat) -> Result<WavBuffer, AudioError> {
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    write_wav_header(&mut out, format, pcm.len())?;
    out.extend_from_slice(pcm);
    Ok(WavBuffer(out))
}

pub fn decode_base64(payload: &str) -> Result<Vec<u8>, AudioError> {
    Ok(base64::engine::general_purpose::STANDARD.decode(payload.trim())?)
}

/// Decodes a base64 PCM payload and prefixes it with a header built from
/// `mime`. The header's data length is the decoded byte count.
///
/// Payloads that already carry a RIFF/WAVE signature are returned untouched.
pub fn pcm_to_wav(
    base64_payload: &str,
    mime: &str,
    default_channels: u16,
) -> Result<WavBuffer, AudioError> {
    let raw = decode_base64(base64_payload)?;
    if has_wav_signature(&raw) {
        return Ok(WavBuffer(raw));
    }
    let format = parse_mime_type_with(mime, default_channels).resolve(mime)?;
    wrap_pcm_to_wav(&raw, &format)
}

fn has_wav_signature(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

fn le_u16(bytes: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([bytes[off], bytes[off + 1]])
}

fn le_u32(bytes: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
}

/// Reads the canonical header layout produced by [`write_wav_header`].
pub fn read_wav_header(bytes: &[u8]) -> Result<WavHeader, AudioError> {
    if bytes.len() < WAV_HEADER_LEN {
        return Err(AudioError::MalformedHeader("shorter than 44 bytes"));
    }
    if !has_wav_signature(bytes) {
        return Err(AudioError::MalformedHeader("missing RIFF/WAVE signature"));
    }
    if &bytes[12..16] != b"fmt " || le_u32(bytes, 16) != FMT_CHUNK_LEN {
        return Err(AudioError::MalformedHeader("fmt chunk is not canonical"));
    }
    if &bytes[36..40] != b"data" {
        return Err(AudioError::MalformedHeader("data chunk not at offset 36"));
    }
    Ok(WavHeader {
        riff_size: le_u32(bytes, 4),
        format_tag: le_u16(bytes, 20),
        channel_count: le_u16(bytes, 22),
        sample_rate_hz: le_u32(bytes, 24),
        byte_rate: le_u32(bytes, 28),
        block_align: le_u16(bytes, 32),
        bits_per_sample: le_u16(bytes, 34),
        data_len: le_u32(bytes, 40),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono16(rate: u32) -> PcmFormat {
        PcmFormat::new(1, rate, 16).unwrap()
    }

    #[test]
    fn header_layout_is_canonical() {
        let header = wav_header(1000, &mono16(24000)).unwrap();
        assert_eq!(header.len(), WAV_HEADER_LEN);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(le_u32(&header, 4), 1036);
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(le_u32(&header, 16), 16);
        assert_eq!(le_u16(&header, 20), 1);
        assert_eq!(le_u16(&header, 22), 1);
        assert_eq!(le_u32(&header, 24), 24000);
        assert_eq!(le_u32(&header, 28), 48000);
        assert_eq!(le_u16(&header, 32), 2);
        assert_eq!(le_u16(&header, 34), 16);
        assert_eq!(&header[36..40], b"data");
        assert_eq!(le_u32(&header, 40), 1000);
    }

    #[test]
    fn header_reads_back_for_various_formats() {
        let formats = [
            PcmFormat::new(1, 8000, 8).unwrap(),
            PcmFormat::new(2, 44100, 16).unwrap(),
            PcmFormat::new(6, 48000, 24).unwrap(),
            PcmFormat::new(1, 96000, 32).unwrap(),
        ];
        for format in formats {
            for data_len in [0usize, 1, 4096, 1_000_003] {
                let header = read_wav_header(&wav_header(data_len, &format).unwrap()).unwrap();
                assert_eq!(header.data_len as usize, data_len);
                assert_eq!(header.riff_size as usize, 36 + data_len);
                assert_eq!(header.channel_count, format.channel_count());
                assert_eq!(header.sample_rate_hz, format.sample_rate_hz());
                assert_eq!(header.bits_per_sample, format.bits_per_sample());
                assert_eq!(header.byte_rate, format.byte_rate());
                assert_eq!(header.block_align, format.block_align());
            }
        }
    }

    #[test]
    fn rejects_degenerate_formats() {
        assert!(PcmFormat::new(0, 24000, 16).is_err());
        assert!(PcmFormat::new(1, 0, 16).is_err());
        assert!(PcmFormat::new(1, 24000, 0).is_err());
        assert!(PcmFormat::new(1, 24000, 12).is_err());
        assert!(PcmFormat::new(u16::MAX, 24000, 16).is_err());
    }

    #[test]
    fn oversized_payload_is_an_error() {
        let err = wav_header(u32::MAX as usize, &mono16(24000)).unwrap_err();
        assert!(matches!(err, AudioError::PayloadTooLarge(_)));
    }

    #[test]
    fn converter_uses_decoded_length() {
        let pcm: Vec<u8> = (0u8..=99).collect();
        let payload = base64::engine::general_purpose::STANDARD.encode(&pcm);
        assert_ne!(payload.len(), pcm.len());

        let wav = pcm_to_wav(&payload, "audio/L16;rate=24000", 1).unwrap();
        assert_eq!(wav.len(), WAV_HEADER_LEN + pcm.len());

        let header = read_wav_header(wav.as_bytes()).unwrap();
        assert_eq!(header.data_len as usize, pcm.len());
        assert_eq!(&wav.as_bytes()[WAV_HEADER_LEN..], pcm.as_slice());
    }

    #[test]
    fn converter_reports_bad_input() {
        let err = pcm_to_wav("not base64!!", "audio/L16;rate=24000", 1).unwrap_err();
        assert!(matches!(err, AudioError::Base64(_)));

        let payload = base64::engine::general_purpose::STANDARD.encode([0u8; 8]);
        let err = pcm_to_wav(&payload, "audio/L16", 1).unwrap_err();
        assert!(matches!(err, AudioError::UnresolvedFormat { .. }));
    }

    #[test]
    fn converter_passes_existing_wav_through() {
        let existing = wrap_pcm_to_wav(&[1, 2, 3, 4], &mono16(16000)).unwrap();
        let payload = base64::engine::general_purpose::STANDARD.encode(existing.as_bytes());
        let wav = pcm_to_wav(&payload, "audio/wav", 1).unwrap();
        assert_eq!(wav, existing);
    }

    #[test]
    fn duration_from_header() {
        // one second of 24 kHz mono 16-bit
        let wav = wrap_pcm_to_wav(&vec![0u8; 48000], &mono16(24000)).unwrap();
        let header = read_wav_header(wav.as_bytes()).unwrap();
        assert_eq!(header.duration_secs(), Some(1.0));
    }

    #[test]
    fn short_or_foreign_buffers_are_not_headers() {
        assert!(read_wav_header(&[0u8; 10]).is_err());
        assert!(read_wav_header(&[0u8; 64]).is_err());
    }
}
