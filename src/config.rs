use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};

use crate::retry::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro-preview-tts";
pub const DEFAULT_VOICE: &str = "Zephyr";

#[derive(Clone, Debug)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub default_voice: String,
    pub output_dir: PathBuf,
    pub public_path: String,
    pub retry: RetryPolicy,
    pub default_channels: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let max_attempts: u32 = parse_var(&var, "VOICEOVER_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        if max_attempts == 0 {
            bail!("VOICEOVER_MAX_ATTEMPTS must be at least 1");
        }
        let retry_delay_ms: u64 = parse_var(
            &var,
            "VOICEOVER_RETRY_DELAY_MS",
            DEFAULT_RETRY_DELAY.as_millis() as u64,
        )?;
        let default_channels: u16 = parse_var(&var, "VOICEOVER_CHANNELS", 1)?;
        if default_channels == 0 {
            bail!("VOICEOVER_CHANNELS must be at least 1");
        }

        Ok(Self {
            api_key: var("GEMINI_API_KEY"),
            base_url: var("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: var("GEMINI_TTS_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            default_voice: var("VOICEOVER_DEFAULT_VOICE")
                .unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            output_dir: var("VOICEOVER_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("audio")),
            public_path: var("VOICEOVER_PUBLIC_PATH").unwrap_or_else(|| "/audio".to_string()),
            retry: RetryPolicy {
                max_attempts,
                retry_delay: Duration::from_millis(retry_delay_ms),
            },
            default_channels,
        })
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow!("GEMINI_API_KEY not found in env; please set it in .env"))
    }
}

fn parse_var<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid value for {key}: '{raw}'")),
        None => Ok(default),
    }
}
