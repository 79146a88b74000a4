use serde::Deserialize;

const FALLBACK_MIME: &str = "application/octet-stream";

/// One element of a streamed generation response, reduced to what the
/// stream processor acts on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AudioChunk {
    Inline { mime_type: String, base64_data: String },
    Text { text: String },
    Empty,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Option<Vec<Part>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, rename = "inlineData", alias = "inline_data")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InlineData {
    #[serde(default, rename = "mimeType", alias = "mime_type")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

impl From<GenerateResponse> for AudioChunk {
    fn from(response: GenerateResponse) -> Self {
        let Some(parts) = response
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
        else {
            return AudioChunk::Empty;
        };

        let mut text = String::new();
        for part in parts {
            if let Some(InlineData {
                mime_type,
                data: Some(data),
            }) = part.inline_data
            {
                return AudioChunk::Inline {
                    mime_type: mime_type.unwrap_or_else(|| FALLBACK_MIME.to_string()),
                    base64_data: data,
                };
            }
            if let Some(t) = part.text.filter(|t| !t.is_empty()) {
                text.push_str(&t);
            }
        }

        if text.is_empty() {
            AudioChunk::Empty
        } else {
            AudioChunk::Text { text }
        }
    }
}

impl AudioChunk {
    pub fn from_json(event: &str) -> Result<Self, serde_json::Error> {
        let response: GenerateResponse = serde_json::from_str(event)?;
        Ok(response.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_audio_part() {
        let chunk = AudioChunk::from_json(
            r#"{"candidates":[{"content":{"role":"model","parts":[
                {"inlineData":{"mimeType":"audio/L16;codec=pcm;rate=24000","data":"AAAA"}}
            ]}}]}"#,
        )
        .unwrap();
        assert_eq!(
            chunk,
            AudioChunk::Inline {
                mime_type: "audio/L16;codec=pcm;rate=24000".into(),
                base64_data: "AAAA".into(),
            }
        );
    }

    #[test]
    fn snake_case_inline_data_is_accepted() {
        let chunk = AudioChunk::from_json(
            r#"{"candidates":[{"content":{"parts":[{"inline_data":{"data":"AAAA"}}]}}]}"#,
        )
        .unwrap();
        assert_eq!(
            chunk,
            AudioChunk::Inline {
                mime_type: FALLBACK_MIME.into(),
                base64_data: "AAAA".into(),
            }
        );
    }

    #[test]
    fn text_parts_are_concatenated() {
        let chunk = AudioChunk::from_json(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello, "},{"text":""},{"text":"world"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(chunk, AudioChunk::Text { text: "Hello, world".into() });
    }

    #[test]
    fn missing_structure_is_empty() {
        for event in [
            r#"{}"#,
            r#"{"candidates":[]}"#,
            r#"{"candidates":[{"finishReason":"STOP"}]}"#,
            r#"{"candidates":[{"content":{"role":"model"}}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"audio/L16"}}]}}]}"#,
            r#"{"usageMetadata":{"promptTokenCount":4}}"#,
        ] {
            assert_eq!(AudioChunk::from_json(event).unwrap(), AudioChunk::Empty, "{event}");
        }
    }

    #[test]
    fn non_json_is_an_error() {
        assert!(AudioChunk::from_json("data: nope").is_err());
    }
}
