pub mod audio;
pub mod chunk;
pub mod config;
pub mod error;
pub mod logging;
pub mod mime;
pub mod retry;
pub mod stream;
pub mod tts;
pub mod util;
pub mod voiceover;
