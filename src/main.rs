use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;

use voiceover_studio::config::Config;
use voiceover_studio::logging;
use voiceover_studio::tts::{AVAILABLE_VOICES, GeminiClient};
use voiceover_studio::voiceover::{VoiceoverRequest, generate_voiceover};

#[derive(Parser)]
#[command(name = "voiceover-studio", about = "Generate voice-overs with Gemini TTS")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Synthesize a voice-over and print the result as JSON
    Generate {
        /// Text to speak
        #[arg(short, long, conflicts_with = "file")]
        text: Option<String>,

        /// Read the text to speak from a file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Prebuilt voice name (see `voices`)
        #[arg(long)]
        voice: Option<String>,

        /// Emotion annotation prepended to the prompt
        #[arg(short, long)]
        emotion: Option<String>,

        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        #[arg(long)]
        max_attempts: Option<u32>,

        #[arg(long)]
        retry_delay_ms: Option<u64>,
    },
    /// List the prebuilt voices
    Voices,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("warn: {e:#}");
    }

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            let failure = serde_json::json!({ "success": false, "error": format!("{e:#}") });
            println!("{failure}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Voices => {
            for (name, style) in AVAILABLE_VOICES {
                println!("{name:<14} {style}");
            }
            Ok(())
        }
        Command::Generate {
            text,
            file,
            voice,
            emotion,
            output_dir,
            max_attempts,
            retry_delay_ms,
        } => {
            let mut config = Config::from_env()?;
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if let Some(n) = max_attempts {
                if n == 0 {
                    bail!("--max-attempts must be at least 1");
                }
                config.retry.max_attempts = n;
            }
            if let Some(ms) = retry_delay_ms {
                config.retry.retry_delay = Duration::from_millis(ms);
            }

            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => fs::read_to_string(&path)
                    .with_context(|| format!("failed to read file {}", path.display()))?,
                (None, None) => bail!("either --text or --file is required"),
            };

            let client = GeminiClient::new(
                config.require_api_key()?.to_string(),
                config.base_url.clone(),
                config.model.clone(),
            )?;
            let request = VoiceoverRequest {
                text,
                voice: voice.unwrap_or_else(|| config.default_voice.clone()),
                emotion,
            };

            let result = generate_voiceover(&client, &config, &request).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
    }
}
