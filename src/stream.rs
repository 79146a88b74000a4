use std::path::PathBuf;

use anyhow::{Context, Result};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tracing::{debug, info};

use crate::audio::{decode_base64, pcm_to_wav, read_wav_header};
use crate::chunk::AudioChunk;
use crate::error::GenerationError;
use crate::mime::resolve_extension;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OutputFile {
    pub file_name: String,
    pub path: PathBuf,
    pub url: String,
    pub mime_type: String,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

#[derive(Debug, Default)]
pub struct ProcessedStream {
    pub files: Vec<OutputFile>,
    pub text: Vec<String>,
    pub skipped: usize,
}

/// Writes the audio of one generation stream to `output_dir` as
/// `audio_output_<n>.<ext>`, numbering from 0 in arrival order.
///
/// The file index lives in the processor, so each stream gets its own
/// numbering. Callers running several streams concurrently must give each
/// one a distinct directory.
pub struct ChunkProcessor {
    output_dir: PathBuf,
    url_prefix: String,
    default_channels: u16,
    next_index: usize,
    done: ProcessedStream,
}

impl ChunkProcessor {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        url_prefix: impl Into<String>,
        default_channels: u16,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            url_prefix: url_prefix.into(),
            default_channels,
            next_index: 0,
            done: ProcessedStream::default(),
        }
    }

    /// Consumes the stream to its end. The first stream error, decode
    /// failure or write failure aborts processing; files already written
    /// stay on disk. The output directory is created with the first file.
    pub async fn process<S>(mut self, stream: S) -> Result<ProcessedStream>
    where
        S: Stream<Item = Result<AudioChunk, GenerationError>>,
    {
        let mut stream = std::pin::pin!(stream);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.with_context(|| {
                format!("speech stream failed after {} file(s)", self.done.files.len())
            })?;
            self.handle(chunk).await?;
        }
        Ok(self.done)
    }

    async fn handle(&mut self, chunk: AudioChunk) -> Result<()> {
        match chunk {
            AudioChunk::Empty => {
                self.done.skipped += 1;
                debug!("skipping chunk without content");
            }
            AudioChunk::Text { text } => {
                info!(target: "voiceover::text", text = %text, "model text");
                self.done.text.push(text);
            }
            AudioChunk::Inline {
                mime_type,
                base64_data,
            } => {
                let index = self.next_index;
                let extension = resolve_extension(&mime_type);
                let (bytes, duration_secs) = if extension == "wav" {
                    let wav = pcm_to_wav(&base64_data, &mime_type, self.default_channels)
                        .with_context(|| {
                            format!("failed to build WAV for chunk {index} ({mime_type})")
                        })?;
                    let duration = read_wav_header(wav.as_bytes())
                        .ok()
                        .and_then(|h| h.duration_secs());
                    (wav.into_bytes(), duration)
                } else {
                    let raw = decode_base64(&base64_data)
                        .with_context(|| format!("failed to decode chunk {index} ({mime_type})"))?;
                    (raw, None)
                };

                if index == 0 {
                    tokio::fs::create_dir_all(&self.output_dir)
                        .await
                        .with_context(|| {
                            format!("failed to create {}", self.output_dir.display())
                        })?;
                }
                let file_name = format!("audio_output_{index}.{extension}");
                let path = self.output_dir.join(&file_name);
                tokio::fs::write(&path, &bytes)
                    .await
                    .with_context(|| format!("failed to write audio file {}", path.display()))?;
                self.next_index += 1;

                info!(
                    file = %path.display(),
                    bytes = bytes.len(),
                    mime = %mime_type,
                    "wrote audio file"
                );
                self.done.files.push(OutputFile {
                    url: format!("{}/{}", self.url_prefix.trim_end_matches('/'), file_name),
                    file_name,
                    path,
                    mime_type,
                    size_bytes: bytes.len() as u64,
                    duration_secs,
                });
            }
        }
        Ok(())
    }
}
