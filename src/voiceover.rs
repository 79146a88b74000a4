use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::retry::{GenerationAttempt, retry_on_rate_limit};
use crate::stream::{ChunkProcessor, OutputFile};
use crate::tts::{SpeechSource, compose_prompt, find_voice};
use crate::util::{new_request_id, now_rfc3339};

#[derive(Clone, Debug)]
pub struct VoiceoverRequest {
    pub text: String,
    pub voice: String,
    pub emotion: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VoiceoverResult {
    pub success: bool,
    pub request_id: String,
    pub voice: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    pub prompt: String,
    pub model: String,
    pub generated_at: String,
    pub attempts: Vec<GenerationAttempt>,
    pub files: Vec<OutputFile>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub text: Vec<String>,
}

/// Generates one voice-over: opens the stream with rate-limit retries,
/// then writes every audio chunk under `<output_dir>/<request_id>/`.
pub async fn generate_voiceover<S>(
    source: &S,
    config: &Config,
    request: &VoiceoverRequest,
) -> Result<VoiceoverResult>
where
    S: SpeechSource + ?Sized,
{
    let voice = find_voice(&request.voice)
        .ok_or_else(|| anyhow!("unknown voice '{}'", request.voice))?;
    if request.text.trim().is_empty() {
        bail!("nothing to synthesize: text is empty");
    }
    let prompt = compose_prompt(&request.text, request.emotion.as_deref());

    let request_id = new_request_id();
    let output_dir = config.output_dir.join(&request_id);
    let url_prefix = format!("{}/{}", config.public_path.trim_end_matches('/'), request_id);

    info!(
        request_id = %request_id,
        voice,
        model = source.model(),
        chars = prompt.chars().count(),
        "starting voice-over generation"
    );
    let t0 = Instant::now();

    let opened = retry_on_rate_limit(&config.retry, || source.open_stream(&prompt, voice))
        .await
        .inspect_err(|failure| {
            warn!(
                request_id = %request_id,
                attempts = ?failure.attempts,
                "speech generation failed"
            )
        })
        .context("speech generation failed")?;

    let processed = ChunkProcessor::new(&output_dir, url_prefix, config.default_channels)
        .process(opened.value)
        .await?;

    if processed.files.is_empty() {
        warn!(request_id = %request_id, skipped = processed.skipped, "stream ended without audio");
        bail!("speech generation returned no audio");
    }

    info!(
        request_id = %request_id,
        files = processed.files.len(),
        attempts = opened.attempts.len(),
        elapsed = ?t0.elapsed(),
        "voice-over generated"
    );

    Ok(VoiceoverResult {
        success: true,
        request_id,
        voice: voice.to_string(),
        emotion: request.emotion.clone(),
        prompt,
        model: source.model().to_string(),
        generated_at: now_rfc3339(),
        attempts: opened.attempts,
        files: processed.files,
        text: processed.text,
    })
}
