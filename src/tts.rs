use std::pin::Pin;

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use tracing::debug;

use crate::chunk::AudioChunk;
use crate::error::GenerationError;

// Public list of available voices and their short descriptions.
// The voice_name is what the TTS API expects.
pub const AVAILABLE_VOICES: &[(&str, &str)] = &[
    ("Zephyr", "Bright"),
    ("Puck", "Upbeat"),
    ("Charon", "Informative"),
    ("Kore", "Firm"),
    ("Fenrir", "Excitable"),
    ("Leda", "Youthful"),
    ("Orus", "Firm"),
    ("Aoede", "Breezy"),
    ("Callirrhoe", "Easy-going"),
    ("Autonoe", "Bright"),
    ("Enceladus", "Breathy"),
    ("Iapetus", "Clear"),
    ("Umbriel", "Easy-going"),
    ("Algieba", "Smooth"),
    ("Despina", "Smooth"),
    ("Erinome", "Clear"),
    ("Algenib", "Gravelly"),
    ("Rasalgethi", "Informative"),
    ("Laomedeia", "Upbeat"),
    ("Achernar", "Soft"),
    ("Alnilam", "Firm"),
    ("Schedar", "Even"),
    ("Gacrux", "Mature"),
    ("Pulcherrima", "Forward"),
    ("Achird", "Friendly"),
    ("Zubenelgenubi", "Casual"),
    ("Vindemiatrix", "Gentle"),
    ("Sadachbia", "Lively"),
    ("Sadaltager", "Knowledgeable"),
    ("Sulafat", "Warm"),
];

/// Canonical spelling of a prebuilt voice, matched case-insensitively.
pub fn find_voice(name: &str) -> Option<&'static str> {
    let name = name.trim();
    AVAILABLE_VOICES
        .iter()
        .find(|(voice, _)| voice.eq_ignore_ascii_case(name))
        .map(|(voice, _)| *voice)
}

pub fn compose_prompt(text: &str, emotion: Option<&str>) -> String {
    match emotion.map(str::trim).filter(|e| !e.is_empty()) {
        Some(emotion) => format!("[Émotion: {emotion}] {text}"),
        None => text.to_string(),
    }
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<AudioChunk, GenerationError>> + Send>>;

/// Anything that can open a streaming speech generation.
#[async_trait::async_trait]
pub trait SpeechSource: Send + Sync {
    fn model(&self) -> &str;

    async fn open_stream(
        &self,
        prompt: &str,
        voice_name: &str,
    ) -> Result<ChunkStream, GenerationError>;
}

const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String, model: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("voiceover-studio/0.1")
            .build()?;
        Ok(Self {
            http,
            api_key,
            base_url,
            model,
        })
    }

    /// Opens a streaming speech generation. Fails before yielding anything
    /// when the upstream rejects the request; errors after that arrive as
    /// stream items.
    pub async fn stream_speech(
        &self,
        prompt: &str,
        voice_name: &str,
    ) -> Result<ChunkStream, GenerationError> {
        let request = self.speech_request(prompt, voice_name)?;
        let resp = self
            .http
            .execute(request)
            .await
            .map_err(|e| GenerationError::Transport(e.without_url()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            debug!(%status, body = %text, "speech generation rejected");
            return Err(GenerationError::from_status(status, text));
        }

        Ok(Box::pin(sse_chunks(resp.bytes_stream())))
    }

    /// The key travels in a header so it never shows up in the URL, which
    /// transport errors and logs print.
    fn speech_request(
        &self,
        prompt: &str,
        voice_name: &str,
    ) -> Result<reqwest::Request, GenerationError> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let mut key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| GenerationError::InvalidApiKey)?;
        key.set_sensitive(true);

        Ok(self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, key)
            .json(&speech_request_body(prompt, voice_name))
            .build()?)
    }
}

#[async_trait::async_trait]
impl SpeechSource for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn open_stream(
        &self,
        prompt: &str,
        voice_name: &str,
    ) -> Result<ChunkStream, GenerationError> {
        self.stream_speech(prompt, voice_name).await
    }
}

/// Decodes an SSE byte stream into chunks, one per `data:` event.
fn sse_chunks<S, B, E>(bytes: S) -> impl Stream<Item = Result<AudioChunk, GenerationError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    GenerationError: From<E>,
{
    try_stream! {
        let mut bytes = Box::pin(bytes);
        let mut decoder = SseDecoder::default();
        while let Some(piece) = bytes.next().await {
            let piece = piece.map_err(GenerationError::from)?;
            for event in decoder.push(piece.as_ref()) {
                yield AudioChunk::from_json(&event).map_err(GenerationError::MalformedChunk)?;
            }
        }
        if let Some(event) = decoder.finish() {
            yield AudioChunk::from_json(&event).map_err(GenerationError::MalformedChunk)?;
        }
    }
}

fn speech_request_body(prompt: &str, voice_name: &str) -> serde_json::Value {
    serde_json::json!({
        "contents": [
            { "role": "user", "parts": [ { "text": prompt } ] }
        ],
        "generationConfig": {
            "responseModalities": ["audio"],
            "temperature": 1,
            "speech_config": {
                "voice_config": {
                    "prebuilt_voice_config": { "voice_name": voice_name }
                }
            }
        }
    })
}

/// Incremental server-sent-events framing. Only `data:` fields matter here;
/// comments and other fields are dropped.
#[derive(Default)]
struct SseDecoder {
    buf: Vec<u8>,
    // bytes of `buf` already known to hold no newline
    scanned: usize,
    data: Vec<String>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut events = Vec::new();
        let mut line_start = 0;
        while let Some(offset) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + offset;
            let line = String::from_utf8_lossy(&self.buf[line_start..end]).into_owned();
            line_start = end + 1;
            self.scanned = line_start;
            if let Some(event) = self.feed_line(line.trim_end_matches('\r')) {
                events.push(event);
            }
        }
        self.buf.drain(..line_start);
        self.scanned = self.buf.len();
        events
    }

    fn finish(mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        self.scanned = 0;
        if !rest.is_empty() {
            let line = String::from_utf8_lossy(&rest).into_owned();
            self.feed_line(line.trim_end_matches('\r'));
        }
        self.take_event()
    }

    fn feed_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.take_event();
        }
        if let Some(rest) = line.strip_prefix("data:") {
            self.data.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        }
        None
    }

    fn take_event(&mut self) -> Option<String> {
        if self.data.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.data).join("\n"))
        }
    }
}
