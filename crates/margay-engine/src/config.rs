//! YAML configuration surface.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use margay_translate::GeminiConfig;

use crate::MigrationError;

/// Top-level migration options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub max_retries: u32,
    /// Reserved: programs within one topological rank may run concurrently.
    pub parallel_execution: bool,
    pub output_dir: PathBuf,
    pub verbose: bool,
    pub converter: ConverterConfig,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        MigrationConfig {
            max_retries: 3,
            parallel_execution: false,
            output_dir: PathBuf::from("output"),
            verbose: false,
            converter: ConverterConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub gemini: GeminiSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeminiSection {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub max_parallel: usize,
    pub chunk_size: usize,
    pub rate_limiting: RateLimitSection,
    pub fallback_to_rules: bool,
}

impl Default for GeminiSection {
    fn default() -> Self {
        GeminiSection {
            enabled: true,
            api_key: None,
            model: "gemini-2.5-pro".to_string(),
            max_tokens: 8192,
            max_parallel: 5,
            chunk_size: 2000,
            rate_limiting: RateLimitSection::default(),
            fallback_to_rules: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    pub max_requests_per_minute: usize,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        RateLimitSection {
            max_requests_per_minute: 1,
        }
    }
}

impl MigrationConfig {
    pub fn load(path: &Path) -> Result<Self, MigrationError> {
        let text = std::fs::read_to_string(path).map_err(|e| MigrationError::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&text).map_err(|message| MigrationError::Config {
            path: path.display().to_string(),
            message,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, String> {
        serde_yaml::from_str(text).map_err(|e| e.to_string())
    }

    /// Translator configuration for this run, `None` when disabled.
    pub fn gemini_config(&self) -> Option<GeminiConfig> {
        let section = &self.converter.gemini;
        if !section.enabled {
            return None;
        }
        Some(GeminiConfig {
            api_key: section
                .api_key
                .clone()
                .or_else(|| std::env::var(margay_translate::gemini::API_KEY_ENV).ok()),
            model: section.model.clone(),
            max_tokens: section.max_tokens,
            cache_dir: PathBuf::from(".conversion_cache"),
            max_parallel: section.max_parallel,
            chunk_size: section.chunk_size,
            max_requests_per_minute: section.rate_limiting.max_requests_per_minute,
            max_retries: self.max_retries,
            ..GeminiConfig::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_gives_defaults() {
        let config = MigrationConfig::from_yaml("{}").unwrap();
        assert_eq!(config.max_retries, 3);
        assert!(!config.parallel_execution);
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert!(config.converter.gemini.enabled);
        assert!(config.converter.gemini.fallback_to_rules);
        assert_eq!(config.converter.gemini.rate_limiting.max_requests_per_minute, 1);
    }

    #[test]
    fn recognized_options_parse() {
        let yaml = r#"
max_retries: 5
parallel_execution: true
output_dir: build/converted
verbose: true
converter:
  gemini:
    api_key: test-key
    model: gemini-2.0-flash
    max_tokens: 4096
    max_parallel: 2
    chunk_size: 1500
    rate_limiting:
      max_requests_per_minute: 10
    fallback_to_rules: false
    enabled: true
"#;
        let config = MigrationConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.max_retries, 5);
        assert!(config.parallel_execution);
        assert_eq!(config.output_dir, PathBuf::from("build/converted"));
        assert!(config.verbose);

        let gemini = &config.converter.gemini;
        assert_eq!(gemini.api_key.as_deref(), Some("test-key"));
        assert_eq!(gemini.model, "gemini-2.0-flash");
        assert_eq!(gemini.max_tokens, 4096);
        assert_eq!(gemini.max_parallel, 2);
        assert_eq!(gemini.chunk_size, 1500);
        assert_eq!(gemini.rate_limiting.max_requests_per_minute, 10);
        assert!(!gemini.fallback_to_rules);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let yaml = "converter:\n  gemini:\n    max_parallel: 9\n";
        let config = MigrationConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.converter.gemini.max_parallel, 9);
        assert_eq!(config.converter.gemini.model, "gemini-2.5-pro");
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn disabled_converter_yields_no_gemini_config() {
        let yaml = "converter:\n  gemini:\n    enabled: false\n";
        let config = MigrationConfig::from_yaml(yaml).unwrap();
        assert!(config.gemini_config().is_none());
    }

    #[test]
    fn gemini_config_carries_section_values() {
        let yaml = r#"
max_retries: 2
converter:
  gemini:
    api_key: k
    chunk_size: 777
    rate_limiting:
      max_requests_per_minute: 4
"#;
        let config = MigrationConfig::from_yaml(yaml).unwrap();
        let gemini = config.gemini_config().unwrap();
        assert_eq!(gemini.api_key.as_deref(), Some("k"));
        assert_eq!(gemini.chunk_size, 777);
        assert_eq!(gemini.max_requests_per_minute, 4);
        assert_eq!(gemini.max_retries, 2);
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(MigrationConfig::from_yaml("max_retries: [oops").is_err());
    }
}
