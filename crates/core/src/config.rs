//! Configuration management for docqa.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config file (.docqa/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with all state stored in `.docqa/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the LLM factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 4] = ["groq", "openai", "ollama", "extractive"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .docqa/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Language-model provider ("groq", "openai", "ollama", "extractive")
    pub provider: String,

    /// Model identifier passed to the provider
    pub model: String,

    /// Explicit API key, overrides provider-specific environment variables
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    /// OpenAI-compatible chat completions (OpenAI, Groq)
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
        timeout: Option<u64>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
    /// Offline extractive answering, no network
    Extractive {
        #[serde(rename = "maxSentences")]
        max_sentences: Option<usize>,
    },
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "groq".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key: None,
            log_level: None,
            log_json: false,
            verbose: false,
            no_color: false,
            llm: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `DOCQA_WORKSPACE`: Override workspace path
    /// - `DOCQA_CONFIG`: Path to config file
    /// - `DOCQA_PROVIDER`: LLM provider
    /// - `DOCQA_MODEL`: Model identifier
    /// - `DOCQA_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], with the workspace and config file fixed by
    /// the caller so the right YAML file is merged.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) =
            workspace.or_else(|| std::env::var("DOCQA_WORKSPACE").ok().map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var("DOCQA_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.data_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("DOCQA_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("DOCQA_MODEL") {
            config.model = model;
        }

        if let Ok(key) = std::env::var("DOCQA_API_KEY") {
            config.api_key = Some(key);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.log_json = json;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                if let Some(model) = provider_config.model() {
                    result.model = model.to_string();
                }
            }

            result.llm = Some(llm);
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        log_json: bool,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if log_json {
            self.log_json = true;
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .docqa directory.
    pub fn data_dir(&self) -> PathBuf {
        self.workspace.join(".docqa")
    }

    /// Ensure the .docqa directory exists.
    pub fn ensure_data_dir(&self) -> AppResult<()> {
        let data_dir = self.data_dir();
        if !data_dir.exists() {
            std::fs::create_dir_all(&data_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .docqa directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Get the configuration block for a provider, if the config file has one.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref()?.providers.get(provider)
    }

    /// Endpoint override for a provider.
    pub fn resolve_endpoint(&self, provider: &str) -> Option<String> {
        match self.get_provider_config(provider)? {
            ProviderConfig::OpenAI { endpoint, .. } => endpoint.clone(),
            ProviderConfig::Ollama { endpoint, .. } => Some(endpoint.clone()),
            ProviderConfig::Extractive { .. } => None,
        }
    }

    /// Request timeout for a provider, in seconds.
    pub fn resolve_timeout(&self, provider: &str) -> Option<u64> {
        match self.get_provider_config(provider)? {
            ProviderConfig::OpenAI { timeout, .. } | ProviderConfig::Ollama { timeout, .. } => {
                *timeout
            }
            ProviderConfig::Extractive { .. } => None,
        }
    }

    /// Resolve the API key for a provider.
    ///
    /// Order: explicit `DOCQA_API_KEY`, the provider's `apiKeyEnv`, then the
    /// conventional variable for the provider (`GROQ_API_KEY`, `OPENAI_API_KEY`).
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        if let Some(ProviderConfig::OpenAI { api_key_env, .. }) =
            self.get_provider_config(provider)
        {
            if let Ok(key) = std::env::var(api_key_env) {
                return Some(key);
            }
        }

        let conventional = match provider {
            "groq" => "GROQ_API_KEY",
            "openai" => "OPENAI_API_KEY",
            _ => return None,
        };

        std::env::var(conventional).ok().filter(|k| !k.is_empty())
    }

    /// Validate configuration for the active provider.
    ///
    /// A missing API key is not an error here: the health report surfaces it
    /// and `ask` fails with an authentication error.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.as_str();

        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.model.trim().is_empty() && provider != "extractive" {
            return Err(AppError::Config(format!(
                "No model configured for provider '{}'",
                provider
            )));
        }

        Ok(())
    }
}

impl ProviderConfig {
    /// Model configured for this provider, if it has one.
    pub fn model(&self) -> Option<&str> {
        match self {
            Self::OpenAI { model, .. } | Self::Ollama { model, .. } => Some(model),
            Self::Extractive { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "groq");
        assert_eq!(config.model, "llama-3.3-70b-versatile");
        assert!(!config.verbose);
        assert!(!config.no_color);
        assert!(!config.log_json);
    }

    #[test]
    fn test_data_dir() {
        let config = AppConfig::default();
        assert!(config.data_dir().ends_with(".docqa"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some("ollama".to_string()),
            Some("llama3.2".to_string()),
            None,
            false,
            true,
            false,
        );

        assert_eq!(overridden.provider, "ollama");
        assert_eq!(overridden.model, "llama3.2");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_known_providers() {
        for provider in KNOWN_PROVIDERS {
            let mut config = AppConfig::default();
            config.provider = provider.to_string();
            assert!(config.validate().is_ok(), "{} should validate", provider);
        }
    }

    #[test]
    fn test_merge_yaml_sets_provider_and_model() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
llm:
  activeProvider: ollama
  providers:
    ollama:
      endpoint: http://localhost:11434
      model: llama3.2
      timeout: 45
    groq:
      apiKeyEnv: MY_GROQ_KEY
      model: llama-3.1-8b-instant
logging:
  level: warn
  json: true
"#,
        )
        .unwrap();

        let config = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.log_level.as_deref(), Some("warn"));
        assert!(config.log_json);
        assert_eq!(
            config.resolve_endpoint("ollama").as_deref(),
            Some("http://localhost:11434")
        );
        assert_eq!(config.resolve_timeout("ollama"), Some(45));
        assert!(matches!(
            config.get_provider_config("groq"),
            Some(ProviderConfig::OpenAI { .. })
        ));
    }

    #[test]
    fn test_load_from_uses_given_config_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.yaml");
        std::fs::write(&path, "logging:\n  json: true\n").unwrap();

        let config =
            AppConfig::load_from(Some(temp.path().to_path_buf()), Some(path.clone())).unwrap();
        assert_eq!(config.workspace, temp.path());
        assert_eq!(config.config_file, Some(path));
        assert!(config.log_json);
    }

    #[test]
    fn test_load_from_missing_workspace() {
        let err = AppConfig::load_from(Some(PathBuf::from("/no/such/workspace")), None);
        assert!(err.is_err());
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let mut config = AppConfig::default();
        config.api_key = Some("explicit".to_string());
        assert_eq!(config.resolve_api_key("groq").as_deref(), Some("explicit"));
    }

    #[test]
    fn test_no_api_key_for_local_providers() {
        let config = AppConfig::default();
        assert_eq!(config.resolve_api_key("ollama"), None);
        assert_eq!(config.resolve_api_key("extractive"), None);
    }
}
