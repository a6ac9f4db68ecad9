use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ai::anthropic::DEFAULT_BASE_URL;
use crate::speech::espeak::DEFAULT_PROGRAM;

/// Environment variable that overrides `apiKey`.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings I/O ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("settings parse: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("settings serialize: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
    #[error("no configuration directory on this platform")]
    NoConfigDir,
}

/// A program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSource<'a> {
    File(&'a Path),
    Command(&'a CommandSpec),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub speak_replies: bool,
    pub voice_locale: String,
    pub speech_program: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_file: Option<PathBuf>,
    pub max_width: u32,
    pub jpeg_quality: u8,
    // Kept last: it serializes as a TOML table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_command: Option<CommandSpec>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.into(),
            model: "claude-3-haiku-20240307".into(),
            max_tokens: 16,
            speak_replies: false,
            voice_locale: "en-US".into(),
            speech_program: DEFAULT_PROGRAM.into(),
            capture_file: None,
            max_width: 1024,
            jpeg_quality: 25,
            capture_command: Some(CommandSpec {
                program: "fswebcam".into(),
                args: vec!["--no-banner".into(), "-q".into(), "-".into()],
            }),
        }
    }
}

/// `<config_dir>/glance/settings.toml`
pub fn default_config_path() -> Result<PathBuf, SettingsError> {
    let dir = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
    Ok(dir.join("glance").join("settings.toml"))
}

impl Settings {
    /// Load settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let io_err = |source: std::io::Error| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(io_err)?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Apply the API key from the environment when it is set and non-empty.
    pub fn apply_env(&mut self, api_key: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            self.api_key = key;
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_tokens == 0 {
            return Err(SettingsError::Invalid("maxTokens must be at least 1".into()));
        }
        if self.model.trim().is_empty() {
            return Err(SettingsError::Invalid("model must not be empty".into()));
        }
        if self.capture_source().is_none() {
            return Err(SettingsError::Invalid(
                "either captureCommand or captureFile must be set".into(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(SettingsError::Invalid("jpegQuality must be within 1..=100".into()));
        }
        Ok(())
    }

    /// Snapshot file wins over the snapshot command when both are set.
    pub fn capture_source(&self) -> Option<CaptureSource<'_>> {
        match (&self.capture_file, &self.capture_command) {
            (Some(path), _) => Some(CaptureSource::File(path)),
            (None, Some(cmd)) => Some(CaptureSource::Command(cmd)),
            (None, None) => None,
        }
    }

    /// Copy with the API key masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.api_key.is_empty() {
            copy.api_key = "********".into();
        }
        copy
    }
}
