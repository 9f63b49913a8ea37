/// Configuration for the translation system
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::batch::DEFAULT_BATCH_SIZE;
use crate::usage::Pricing;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_SOURCE_LANGUAGE: &str = "English";
pub const DEFAULT_TARGET_LANGUAGE: &str = "Romanian";

/// Language names offered for source and target selection.
pub const LANGUAGE_CHOICES: &[&str] = &[
    "English", "Romanian", "Spanish", "French", "German", "Italian",
    "Portuguese", "Polish", "Turkish", "Dutch", "Russian", "Ukrainian",
    "Czech", "Slovak", "Hungarian", "Bulgarian", "Serbian", "Croatian",
    "Bosnian", "Greek", "Swedish", "Norwegian", "Finnish", "Danish",
    "Estonian", "Latvian", "Lithuanian", "Arabic", "Hebrew", "Persian",
    "Hindi", "Urdu", "Bengali", "Tamil", "Telugu", "Malayalam", "Indonesian",
    "Malay", "Thai", "Vietnamese", "Chinese (Simplified)", "Chinese (Traditional)",
    "Japanese", "Korean", "Filipino", "Swahili", "Afrikaans", "Amharic",
    "Esperanto", "Catalan", "Galician", "Basque", "Armenian", "Georgian",
    "Albanian", "Macedonian", "Slovenian", "Icelandic", "Irish", "Welsh",
    "Scottish Gaelic", "Haitian Creole", "Tagalog", "Somali", "Nepali",
    "Pashto", "Kazakh", "Mongolian", "Khmer", "Lao", "Burmese",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderOptions {
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            temperature: 0.3,
            max_tokens: 2000,
            timeout_secs: 120,
        }
    }
}

impl ProviderOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchOptions {
    pub batch_size: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryOptions {
    /// Total attempts per batch, first request included.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputOptions {
    /// Directory receiving translated files; the working directory when unset.
    pub directory: Option<PathBuf>,
}

impl OutputOptions {
    pub fn resolved_directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LanguageOptions {
    pub source: String,
    pub target: String,
}

impl Default for LanguageOptions {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE_LANGUAGE.into(),
            target: DEFAULT_TARGET_LANGUAGE.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslatorConfig {
    pub provider: ProviderOptions,
    pub batch: BatchOptions,
    pub retry: RetryOptions,
    pub pricing: Pricing,
    pub output: OutputOptions,
    pub languages: LanguageOptions,
}

impl TranslatorConfig {
    /// Loads YAML (`.yaml`/`.yml`) or JSON (anything else) from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        if is_yaml(path) {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        }
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = if is_yaml(path) {
            serde_yaml::to_string(self)?
        } else {
            self.to_json()?
        };

        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load from JSON string (for UI integration)
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Convert to JSON string (for UI integration)
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "yaml" | "yml"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TranslatorConfig::default();
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.provider.max_tokens, 2000);
        assert_eq!(config.batch.batch_size, 60);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.languages.target, "Romanian");
        assert_eq!(config.pricing.avg_tokens_per_item, 150);
    }

    #[test]
    fn test_json_serialization() {
        let config = TranslatorConfig::default();
        let json = config.to_json().unwrap();
        let deserialized = TranslatorConfig::from_json(&json).unwrap();

        assert_eq!(config.batch.batch_size, deserialized.batch.batch_size);
        assert_eq!(config.provider.base_url, deserialized.provider.base_url);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "batch:\n  batchSize: 25\nlanguages:\n  target: German\n";
        let config = TranslatorConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.batch.batch_size, 25);
        assert_eq!(config.languages.target, "German");
        assert_eq!(config.languages.source, "English");
        assert_eq!(config.provider.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_file_roundtrip_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TranslatorConfig::default();
        config.provider.model = "gpt-4o".into();

        for name in ["translator.yaml", "translator.json"] {
            let path = dir.path().join(name);
            config.to_file(&path).unwrap();
            let loaded = TranslatorConfig::from_file(&path).unwrap();
            assert_eq!(loaded.provider.model, "gpt-4o");
        }
    }

    #[test]
    fn test_language_choices_include_defaults() {
        assert!(LANGUAGE_CHOICES.contains(&DEFAULT_SOURCE_LANGUAGE));
        assert!(LANGUAGE_CHOICES.contains(&DEFAULT_TARGET_LANGUAGE));
    }
}
