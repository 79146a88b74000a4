use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("cannot resolve {missing} from mime type '{mime}'")]
    UnresolvedFormat { mime: String, missing: &'static str },

    #[error("invalid PCM format: {0}")]
    InvalidFormat(String),

    #[error("failed to decode base64 audio: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("audio payload of {0} bytes does not fit a WAV data chunk")]
    PayloadTooLarge(usize),

    #[error("malformed WAV header: {0}")]
    MalformedHeader(&'static str),
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("rate limited by upstream (429): {body}")]
    RateLimited { body: String },

    #[error(
        "request failed: {} {} - body: {body}",
        .status.as_u16(),
        .status.canonical_reason().unwrap_or("")
    )]
    Status { status: StatusCode, body: String },

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response chunk: {0}")]
    MalformedChunk(#[from] serde_json::Error),

    #[error("API key cannot be sent as an HTTP header value")]
    InvalidApiKey,

    #[error("still rate limited after {attempts} attempt(s)")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<GenerationError>,
    },
}

impl GenerationError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GenerationError::RateLimited { .. })
    }

    /// Maps a non-success HTTP status and its body to the matching variant.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS {
            GenerationError::RateLimited { body }
        } else {
            GenerationError::Status { status, body }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_429_counts_as_rate_limited() {
        let err = GenerationError::from_status(StatusCode::TOO_MANY_REQUESTS, "slow down".into());
        assert!(err.is_rate_limited());

        for status in [
            StatusCode::UNAUTHORIZED,
            StatusCode::BAD_REQUEST,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            let err = GenerationError::from_status(status, String::new());
            assert!(!err.is_rate_limited(), "{status} must not be retried");
        }
    }

    #[test]
    fn exhausted_is_not_itself_rate_limited() {
        let err = GenerationError::Exhausted {
            attempts: 3,
            last: Box::new(GenerationError::RateLimited { body: String::new() }),
        };
        assert!(!err.is_rate_limited());
        assert_eq!(err.to_string(), "still rate limited after 3 attempt(s)");
    }

    #[test]
    fn exhausted_reports_the_cause_once_through_the_chain() {
        let err = anyhow::Error::from(GenerationError::Exhausted {
            attempts: 2,
            last: Box::new(GenerationError::RateLimited {
                body: "quota".into(),
            }),
        });
        let rendered = format!("{err:#}");
        assert_eq!(rendered.matches("quota").count(), 1, "{rendered}");
    }
}
