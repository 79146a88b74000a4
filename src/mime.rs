use std::sync::OnceLock;

use regex::Regex;

use crate::audio::PcmFormat;
use crate::error::AudioError;

pub const DEFAULT_EXTENSION: &str = "wav";

/// PCM parameters as far as a MIME string such as `audio/L16;rate=24000`
/// can tell them. Rate and bit depth stay `None` when the string does not
/// carry them; see [`MimeFormat::resolve`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MimeFormat {
    pub channel_count: u16,
    pub sample_rate_hz: Option<u32>,
    pub bits_per_sample: Option<u16>,
}

impl MimeFormat {
    pub fn resolve(&self, mime: &str) -> Result<PcmFormat, AudioError> {
        let sample_rate_hz = self.sample_rate_hz.ok_or_else(|| AudioError::UnresolvedFormat {
            mime: mime.to_string(),
            missing: "sample rate",
        })?;
        let bits_per_sample = self.bits_per_sample.ok_or_else(|| AudioError::UnresolvedFormat {
            mime: mime.to_string(),
            missing: "bits per sample",
        })?;
        PcmFormat::new(self.channel_count, sample_rate_hz, bits_per_sample)
    }
}

fn linear_subtype() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Leading digits only: "L16" and "L16x" both give 16.
    RE.get_or_init(|| Regex::new(r"^L(\d+)").expect("static regex"))
}

pub fn parse_mime_type(mime: &str) -> MimeFormat {
    parse_mime_type_with(mime, 1)
}

/// Unknown parameters are ignored.
pub fn parse_mime_type_with(mime: &str, default_channels: u16) -> MimeFormat {
    let mut segments = mime.split(';').map(str::trim);
    let essence = segments.next().unwrap_or_default();

    let mut format = MimeFormat {
        channel_count: default_channels,
        sample_rate_hz: None,
        bits_per_sample: None,
    };

    if let Some((_, subtype)) = essence.split_once('/') {
        if let Some(caps) = linear_subtype().captures(subtype.trim()) {
            format.bits_per_sample = caps[1].parse().ok();
        }
    }

    for param in segments {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        if key.trim() == "rate" {
            format.sample_rate_hz = value.trim().parse().ok();
        }
    }

    format
}

/// File extension for a declared MIME type, `None` when it says nothing
/// recognisable (e.g. `audio/L16`).
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let essence = mime
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        m if m.contains("mpeg") || m.contains("mp3") => Some("mp3"),
        m if m.contains("wav") || m.contains("linear16") || m.ends_with("/pcm") => Some("wav"),
        m if m.contains("ogg") => Some("ogg"),
        m if m.contains("flac") => Some("flac"),
        m if m.contains("aac") => Some("aac"),
        m if m.contains("opus") => Some("opus"),
        m if m.contains("octet-stream") => Some("bin"),
        _ => None,
    }
}

pub fn resolve_extension(mime: &str) -> &'static str {
    extension_for_mime(mime).unwrap_or(DEFAULT_EXTENSION)
}
