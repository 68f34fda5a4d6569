//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::fmt;
use std::path::PathBuf;

use arrrg_derive::CommandLine;

use crate::config::DEFAULT_TEMPERATURE;
use crate::registry::DEFAULT_MODE;

/// Default directory for session files.
pub const DEFAULT_SESSIONS_DIR: &str = "sessions";

/// Command-line arguments for the modechat tool.
#[derive(CommandLine, Debug, Default, PartialEq)]
pub struct ChatArgs {
    /// Model key or identifier to use.
    #[arrrg(optional, "Model key (1-7) or identifier (default: openai/gpt-3.5-turbo)", "MODEL")]
    pub model: Option<String>,

    /// Mode to start in.
    #[arrrg(optional, "Mode: hacker, coder or general (default: general)", "MODE")]
    pub mode: Option<String>,

    /// Chat completions endpoint.
    #[arrrg(optional, "Chat completions endpoint URL", "URL")]
    pub endpoint: Option<String>,

    /// Directory holding session files.
    #[arrrg(optional, "Directory for session files (default: sessions)", "DIR")]
    pub sessions_dir: Option<String>,

    /// Sampling temperature.
    #[arrrg(optional, "Sampling temperature 0.0-1.0 (default: 0.7)", "TEMP")]
    pub temperature: Option<f32>,

    /// Stream responses as they are generated.
    #[arrrg(flag, "Stream responses")]
    pub stream: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Start a new session instead of resuming the latest.
    #[arrrg(flag, "Start a new session instead of resuming the latest")]
    pub fresh: bool,
}

// `arrrg::CommandLine` requires `Eq`; `Option<f32>` prevents deriving it.
impl Eq for ChatArgs {}

/// Rejected command-line arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatArgsError {
    /// The temperature was outside 0.0-1.0.
    Temperature(f32),
    /// An argument was present but empty.
    Empty(&'static str),
}

impl fmt::Display for ChatArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatArgsError::Temperature(value) => {
                write!(f, "--temperature expects a value between 0.0 and 1.0, got {value}")
            }
            ChatArgsError::Empty(flag) => write!(f, "--{flag} must not be empty"),
        }
    }
}

impl std::error::Error for ChatArgsError {}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Model key or identifier; `None` keeps the resumed or default model.
    pub model: Option<String>,

    /// Mode; `None` keeps the resumed or default mode.
    pub mode: Option<String>,

    /// Endpoint override.
    pub endpoint: Option<String>,

    /// Directory holding session files.
    pub sessions_dir: PathBuf,

    /// Sampling temperature.
    pub temperature: f32,

    /// Whether responses are streamed.
    pub streaming: bool,

    /// Whether to resume the latest stored session.
    pub resume: bool,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Sessions directory: `sessions`
    /// - Temperature: 0.7
    /// - Streaming: disabled
    /// - Resume: enabled
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            model: None,
            mode: None,
            endpoint: None,
            sessions_dir: PathBuf::from(DEFAULT_SESSIONS_DIR),
            temperature: DEFAULT_TEMPERATURE,
            streaming: false,
            resume: true,
            use_color: true,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn with_sessions_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sessions_dir = dir.into();
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// The mode a fresh session starts in.
    pub fn initial_mode(&self) -> &str {
        self.mode.as_deref().unwrap_or(DEFAULT_MODE)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = ChatArgsError;

    fn try_from(args: ChatArgs) -> Result<Self, Self::Error> {
        let temperature = args.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=1.0).contains(&temperature) {
            return Err(ChatArgsError::Temperature(temperature));
        }
        let non_empty = |value: Option<String>, flag: &'static str| match value {
            Some(value) if value.trim().is_empty() => Err(ChatArgsError::Empty(flag)),
            value => Ok(value.map(|v| v.trim().to_string())),
        };
        let sessions_dir = non_empty(args.sessions_dir, "sessions-dir")?
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSIONS_DIR));

        Ok(ChatConfig {
            model: non_empty(args.model, "model")?,
            mode: non_empty(args.mode, "mode")?.map(|m| m.to_lowercase()),
            endpoint: non_empty(args.endpoint, "endpoint")?,
            sessions_dir,
            temperature,
            streaming: args.stream,
            resume: !args.fresh,
            use_color: !args.no_color,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert!(config.model.is_none());
        assert_eq!(config.initial_mode(), "general");
        assert_eq!(config.sessions_dir, PathBuf::from("sessions"));
        assert_eq!(config.temperature, 0.7);
        assert!(!config.streaming);
        assert!(config.resume);
        assert!(config.use_color);
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::try_from(ChatArgs::default()).unwrap();
        assert_eq!(config, ChatConfig::new());
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            model: Some("2".to_string()),
            mode: Some("Coder".to_string()),
            endpoint: Some("http://localhost:8080/v1/chat/completions".to_string()),
            sessions_dir: Some("/tmp/chats".to_string()),
            temperature: Some(0.2),
            stream: true,
            no_color: true,
            fresh: true,
        };
        let config = ChatConfig::try_from(args).unwrap();
        assert_eq!(config.model.as_deref(), Some("2"));
        assert_eq!(config.initial_mode(), "coder");
        assert_eq!(config.sessions_dir, PathBuf::from("/tmp/chats"));
        assert_eq!(config.temperature, 0.2);
        assert!(config.streaming);
        assert!(!config.resume);
        assert!(!config.use_color);
    }

    #[test]
    fn config_from_args_rejects_bad_values() {
        let args = ChatArgs {
            temperature: Some(1.5),
            ..ChatArgs::default()
        };
        assert_eq!(
            ChatConfig::try_from(args).unwrap_err(),
            ChatArgsError::Temperature(1.5)
        );
        let args = ChatArgs {
            model: Some("  ".to_string()),
            ..ChatArgs::default()
        };
        assert_eq!(
            ChatConfig::try_from(args).unwrap_err(),
            ChatArgsError::Empty("model")
        );
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .with_model("custom vendor/model")
            .with_mode("hacker")
            .with_sessions_dir("elsewhere")
            .with_streaming(true)
            .without_color();
        assert_eq!(config.model.as_deref(), Some("custom vendor/model"));
        assert_eq!(config.initial_mode(), "hacker");
        assert_eq!(config.sessions_dir, PathBuf::from("elsewhere"));
        assert!(config.streaming);
        assert!(!config.use_color);
    }
}
