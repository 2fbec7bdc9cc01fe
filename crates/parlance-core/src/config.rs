use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ParlanceError, Result};

/// Top-level configuration for Parlance.
///
/// Loaded from `~/.parlance/config.toml` by default. The API credential is
/// never part of this file; only the name of the environment variable that
/// holds it is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParlanceConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub personas: PersonaConfig,
}

impl ParlanceConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ParlanceConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Directory for synthesized audio; relative `/save` paths resolve here too.
    pub export_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            export_dir: ".".to_string(),
        }
    }
}

/// Completion model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// REST base URL, without the trailing `/models` segment.
    pub base_url: String,
    /// Model used for text-only conversations.
    pub text_model: String,
    /// Model used whenever a request carries image or audio bytes.
    pub multimodal_model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    /// HTTP timeout for a single completion call.
    pub timeout_secs: u64,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            text_model: "gemini-flash-latest".to_string(),
            multimodal_model: "gemini-2.0-flash".to_string(),
            temperature: 0.9,
            top_p: 0.95,
            max_output_tokens: 512,
            timeout_secs: 60,
            api_key_env: "GOOGLE_API_KEY".to_string(),
        }
    }
}

impl ModelConfig {
    /// Read the API key from the process environment.
    pub fn api_key(&self) -> Result<ApiKey> {
        self.api_key_from(|name| std::env::var(name).ok())
    }

    /// Read the API key through `lookup`, which maps a variable name to its value.
    pub fn api_key_from<F>(&self, lookup: F) -> Result<ApiKey>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(&self.api_key_env) {
            Some(value) if !value.trim().is_empty() => Ok(ApiKey::new(value.trim())),
            _ => Err(ParlanceError::Config(format!(
                "Missing {} environment variable",
                self.api_key_env
            ))),
        }
    }
}

/// Text-to-speech settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Whether replies may be spoken at all.
    pub enabled: bool,
    /// Language code passed to the speech service.
    pub language: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            language: "en".to_string(),
            base_url: "https://translate.google.com/translate_tts".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Persona selection and user-defined personas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    /// Persona a new session starts with.
    pub default: String,
    /// Extra personas (name -> system prompt), merged over the built-ins.
    pub custom: BTreeMap<String, String>,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            default: "General (default)".to_string(),
            custom: BTreeMap::new(),
        }
    }
}

/// API credential. `Debug` and `Display` never reveal the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw key, for placing in a request header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ParlanceConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.export_dir, ".");
        assert_eq!(config.model.text_model, "gemini-flash-latest");
        assert_eq!(config.model.multimodal_model, "gemini-2.0-flash");
        assert!((config.model.temperature - 0.9).abs() < f32::EPSILON);
        assert!((config.model.top_p - 0.95).abs() < f32::EPSILON);
        assert_eq!(config.model.max_output_tokens, 512);
        assert_eq!(config.model.api_key_env, "GOOGLE_API_KEY");
        assert!(!config.speech.enabled);
        assert_eq!(config.speech.language, "en");
        assert_eq!(config.personas.default, "General (default)");
        assert!(config.personas.custom.is_empty());
    }

    #[test]
    fn test_load_valid_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[general]
log_level = "debug"
export_dir = "/tmp/chats"

[model]
text_model = "gemini-2.5-flash"
max_output_tokens = 1024

[speech]
enabled = true
language = "fr"

[personas]
default = "Pirate"

[personas.custom]
Pirate = "You talk like a pirate."
"#
        )
        .unwrap();

        let config = ParlanceConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.export_dir, "/tmp/chats");
        assert_eq!(config.model.text_model, "gemini-2.5-flash");
        assert_eq!(config.model.max_output_tokens, 1024);
        // Unspecified fields keep their defaults.
        assert_eq!(config.model.multimodal_model, "gemini-2.0-flash");
        assert!(config.speech.enabled);
        assert_eq!(config.speech.language, "fr");
        assert_eq!(config.personas.default, "Pirate");
        assert_eq!(
            config.personas.custom.get("Pirate").map(String::as_str),
            Some("You talk like a pirate.")
        );
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[model\ntext_model = ").unwrap();
        let err = ParlanceConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ParlanceError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = ParlanceConfig::load_or_default(Path::new("/does/not/exist/config.toml"));
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.model.max_output_tokens, 512);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let config: ParlanceConfig = toml::from_str("").unwrap();
        assert_eq!(config.model.text_model, "gemini-flash-latest");
        assert_eq!(config.speech.timeout_secs, 30);
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ParlanceConfig::default();
        config.speech.enabled = true;
        config
            .personas
            .custom
            .insert("Haiku".to_string(), "Answer in haiku.".to_string());
        config.save(&path).unwrap();

        let reloaded = ParlanceConfig::load(&path).unwrap();
        assert!(reloaded.speech.enabled);
        assert_eq!(reloaded.personas.custom.len(), 1);
    }

    #[test]
    fn test_api_key_from_lookup() {
        let model = ModelConfig::default();
        let key = model
            .api_key_from(|name| (name == "GOOGLE_API_KEY").then(|| " secret-123 ".to_string()))
            .unwrap();
        assert_eq!(key.expose(), "secret-123");
    }

    #[test]
    fn test_api_key_missing_or_blank() {
        let model = ModelConfig::default();
        let err = model.api_key_from(|_| None).unwrap_err();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));

        let err = model.api_key_from(|_| Some("   ".to_string())).unwrap_err();
        assert!(matches!(err, ParlanceError::Config(_)));
    }

    #[test]
    fn test_api_key_custom_variable() {
        let model = ModelConfig {
            api_key_env: "MY_KEY".to_string(),
            ..ModelConfig::default()
        };
        let err = model.api_key_from(|_| None).unwrap_err();
        assert!(err.to_string().contains("MY_KEY"));
    }

    #[test]
    fn test_api_key_is_redacted() {
        let key = ApiKey::new("super-secret");
        assert_eq!(format!("{:?}", key), "ApiKey(***)");
        assert_eq!(key.to_string(), "***");
        assert!(!format!("{:?}", key).contains("super-secret"));
    }
}
