use relay_core::assembler::DEFAULT_WINDOW_SECONDS;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// How the LLM leg is driven.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LlmMode {
    /// One chat completion per finalized transcript.
    Chat,
    /// A realtime socket fed with audio appends and explicit commits.
    Realtime,
}

/// How inbound client audio is framed before forwarding (see
/// `relay_core::assembler`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Framing {
    PassThrough,
    Windowed,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub stt_url: String,
    pub stt_api_key: String,
    pub stt_model: String,
    pub stt_language: String,
    pub llm_mode: LlmMode,
    pub openai_api_key: String,
    pub chat_model: String,
    pub realtime_url: String,
    pub framing: Framing,
    pub window_seconds: f64,
    /// When set, flushed audio windows are written here as WAV files.
    pub record_dir: Option<PathBuf>,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let stt_url = std::env::var("STT_URL")
            .unwrap_or_else(|_| "wss://api.deepgram.com/v1/listen".to_string());
        let stt_api_key = std::env::var("STT_API_KEY")
            .map_err(|_| ConfigError::MissingVar("STT_API_KEY".to_string()))?;
        let stt_model = std::env::var("STT_MODEL").unwrap_or_else(|_| "nova-2".to_string());
        let stt_language = std::env::var("STT_LANGUAGE").unwrap_or_else(|_| "en-US".to_string());

        let llm_mode_str = std::env::var("LLM_MODE").unwrap_or_else(|_| "chat".to_string());
        let llm_mode = match llm_mode_str.to_lowercase().as_str() {
            "realtime" => LlmMode::Realtime,
            _ => LlmMode::Chat,
        };

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;
        let chat_model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let realtime_url = std::env::var("REALTIME_URL").unwrap_or_else(|_| {
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview-2024-10-01".to_string()
        });

        let framing_str = std::env::var("AUDIO_FRAMING").unwrap_or_else(|_| "windowed".to_string());
        let framing = match framing_str.to_lowercase().as_str() {
            "passthrough" | "pass-through" => Framing::PassThrough,
            _ => Framing::Windowed,
        };

        let window_seconds = match std::env::var("WINDOW_SECONDS") {
            Ok(s) => s.parse::<f64>().ok().filter(|w| *w > 0.0).ok_or_else(|| {
                ConfigError::InvalidValue("WINDOW_SECONDS".to_string(), s.clone())
            })?,
            Err(_) => DEFAULT_WINDOW_SECONDS,
        };

        let record_dir = std::env::var("RECORD_DIR").map(PathBuf::from).ok();

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            stt_url,
            stt_api_key,
            stt_model,
            stt_language,
            llm_mode,
            openai_api_key,
            chat_model,
            realtime_url,
            framing,
            window_seconds,
            record_dir,
            log_level,
        })
    }
}
