//! Configuration management.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Environment variables
//! - Command-line flags
//! - Config files (.droit/config.yaml)
//!
//! Precedence, lowest first: defaults, YAML file, environment, CLI flags.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .droit/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Default LLM provider ("openai" or "ollama")
    pub provider: String,

    /// Default model identifier
    pub model: String,

    /// API key for the LLM provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Query embedding settings
    pub embedding: EmbeddingSettings,

    /// Vector store and collection settings
    pub retrieval: RetrievalSettings,

    /// Routing stage settings
    pub routing: RoutingSettings,

    /// Answer synthesis settings
    pub synthesis: SynthesisSettings,

    /// Optional replacement for the built-in convention catalog
    pub conventions: Option<Vec<ConventionConfig>>,
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
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
        #[serde(rename = "organizationEnv")]
        organization_env: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Custom endpoint for this provider, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ProviderConfig::OpenAI { endpoint, .. } => endpoint.as_deref(),
            ProviderConfig::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }

    /// Model configured for this provider.
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::OpenAI { model, .. } | ProviderConfig::Ollama { model, .. } => model,
        }
    }
}

/// Query embedding settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingSettings {
    /// "ollama" or "trigram"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Expected vector length; must match the indexed collections
    pub dimensions: usize,

    /// Custom endpoint (falls back to OLLAMA_URL, then localhost)
    pub endpoint: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "bge-m3".to_string(),
            dimensions: 1024,
            endpoint: None,
        }
    }
}

/// Vector store and collection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalSettings {
    /// "qdrant" or "memory"
    pub store: String,

    /// Qdrant REST endpoint
    pub url: String,

    /// Environment variable holding the Qdrant API key
    pub api_key_env: Option<String>,

    /// JSONL fixture loaded by the in-memory store
    pub fixture: Option<PathBuf>,

    /// Collection holding the general labor code
    pub general_collection: String,

    /// Collection holding the collective agreements
    pub sector_collection: String,

    /// Payload field compared against the sector identifier
    pub sector_field: String,

    /// Maximum passages per collection call and after merging
    pub top_k: usize,

    /// Per-collection call timeout
    pub timeout_secs: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            store: "qdrant".to_string(),
            url: "http://localhost:6333".to_string(),
            api_key_env: Some("QDRANT_API_KEY".to_string()),
            fixture: None,
            general_collection: "code_travail".to_string(),
            sector_collection: "kali".to_string(),
            sector_field: "meta.idcc".to_string(),
            top_k: 10,
            timeout_secs: 10,
        }
    }
}

/// Routing stage settings. Decoding temperature is always 0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RoutingSettings {
    /// Model override for routing (defaults to the active model)
    pub model: Option<String>,

    pub timeout_secs: u64,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            model: None,
            timeout_secs: 30,
        }
    }
}

/// Answer synthesis settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SynthesisSettings {
    /// Model override for synthesis (defaults to the active model)
    pub model: Option<String>,

    pub temperature: f32,

    /// Number of top passages handed to the model
    pub max_passages: usize,

    pub timeout_secs: u64,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.7,
            max_passages: 3,
            timeout_secs: 30,
        }
    }
}

/// One collective agreement entry of a catalog override.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConventionConfig {
    pub idcc: String,
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    embedding: Option<EmbeddingSettings>,
    retrieval: Option<RetrievalSettings>,
    routing: Option<RoutingSettings>,
    synthesis: Option<SynthesisSettings>,
    conventions: Option<Vec<ConventionConfig>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

/// Providers the factory knows how to build.
const KNOWN_PROVIDERS: [&str; 2] = ["openai", "ollama"];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: None,
            embedding: EmbeddingSettings::default(),
            retrieval: RetrievalSettings::default(),
            routing: RoutingSettings::default(),
            synthesis: SynthesisSettings::default(),
            conventions: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, the YAML file and defaults.
    ///
    /// Environment variables:
    /// - `DROIT_WORKSPACE`: Override workspace path
    /// - `DROIT_CONFIG`: Path to config file
    /// - `DROIT_PROVIDER`: LLM provider
    /// - `DROIT_MODEL`: Model identifier
    /// - `DROIT_API_KEY`: API key
    /// - `QDRANT_URL`: Vector store endpoint
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use droit_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Like [`AppConfig::load`], with workspace and config file paths given
    /// on the command line taking precedence over the environment.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace
            .or_else(|| std::env::var("DROIT_WORKSPACE").ok().map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var("DROIT_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.droit_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("DROIT_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("DROIT_MODEL") {
            config.model = model;
        }

        if let Ok(url) = std::env::var("QDRANT_URL") {
            config.retrieval.url = url;
        }

        config.api_key = std::env::var("DROIT_API_KEY").ok();

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> Result<Self, serde_yaml::Error> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;

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
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }

            result.llm = Some(llm);
        }

        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(routing) = config_file.routing {
            result.routing = routing;
        }
        if let Some(synthesis) = config_file.synthesis {
            result.synthesis = synthesis;
        }
        if config_file.conventions.is_some() {
            result.conventions = config_file.conventions;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the YAML file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
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

    /// Get the path to the .droit directory.
    pub fn droit_dir(&self) -> PathBuf {
        self.workspace.join(".droit")
    }

    /// Model used by the routing stage.
    pub fn routing_model(&self) -> &str {
        self.routing.model.as_deref().unwrap_or(&self.model)
    }

    /// Model used by the synthesis stage.
    pub fn synthesis_model(&self) -> &str {
        self.synthesis.model.as_deref().unwrap_or(&self.model)
    }

    /// Get the configuration block for a provider.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Endpoint configured for the active provider.
    pub fn provider_endpoint(&self) -> Option<&str> {
        self.get_provider_config(&self.provider)
            .and_then(|pc| pc.endpoint())
    }

    /// Resolve the API key for a provider.
    ///
    /// `DROIT_API_KEY` wins; otherwise the variable named by `apiKeyEnv` is read.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        match self.get_provider_config(provider) {
            Some(ProviderConfig::OpenAI { api_key_env, .. }) => std::env::var(api_key_env).ok(),
            Some(ProviderConfig::Ollama { .. }) => None,
            None if provider == "openai" => std::env::var("OPENAI_API_KEY").ok(),
            None => None,
        }
    }

    /// Resolve the vector store API key, if one is configured.
    pub fn resolve_store_api_key(&self) -> Option<String> {
        self.retrieval
            .api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty())
    }

    /// Validate configuration for the active provider and pipeline settings.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.as_str();

        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if provider == "openai" && self.resolve_api_key(provider).is_none() {
            return Err(AppError::Config(
                "OpenAI provider requires an API key (DROIT_API_KEY or apiKeyEnv)".to_string(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(AppError::Config("retrieval.topK must be at least 1".to_string()));
        }

        if self.synthesis.max_passages == 0 {
            return Err(AppError::Config(
                "synthesis.maxPassages must be at least 1".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.synthesis.temperature) {
            return Err(AppError::Config(format!(
                "synthesis.temperature must be within 0.0-2.0, got {}",
                self.synthesis.temperature
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "embedding.dimensions must be at least 1".to_string(),
            ));
        }

        if let Some(ref conventions) = self.conventions {
            if conventions.is_empty() {
                return Err(AppError::Config(
                    "conventions override must list at least one convention".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.retrieval.general_collection, "code_travail");
        assert_eq!(config.retrieval.sector_collection, "kali");
        assert_eq!(config.retrieval.sector_field, "meta.idcc");
        assert_eq!(config.retrieval.top_k, 10);
        assert_eq!(config.synthesis.max_passages, 3);
        assert!(!config.verbose);
    }

    #[test]
    fn test_droit_dir() {
        let config = AppConfig::default();
        assert!(config.droit_dir().ends_with(".droit"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some("openai".to_string()),
            Some("gpt-4o-mini".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.provider, "openai");
        assert_eq!(overridden.model, "gpt-4o-mini");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_stage_models_fall_back_to_active_model() {
        let mut config = AppConfig::default();
        config.model = "base-model".to_string();
        config.synthesis.model = Some("writer".to_string());

        assert_eq!(config.routing_model(), "base-model");
        assert_eq!(config.synthesis_model(), "writer");
    }

    #[test]
    fn test_merge_yaml_sections() {
        let yaml = r#"
llm:
  activeProvider: ollama
  providers:
    ollama:
      endpoint: "http://gpu-box:11434"
      model: mistral
retrieval:
  store: memory
  topK: 5
  sectorCollection: conventions
synthesis:
  temperature: 0.4
conventions:
  - idcc: "1486"
    name: Syntec
    keywords: [informatique]
logging:
  level: warn
  color: false
"#;
        let merged = AppConfig::default().merge_yaml_str(yaml).unwrap();

        assert_eq!(merged.model, "mistral");
        assert_eq!(merged.provider_endpoint(), Some("http://gpu-box:11434"));
        assert_eq!(merged.retrieval.store, "memory");
        assert_eq!(merged.retrieval.top_k, 5);
        assert_eq!(merged.retrieval.sector_collection, "conventions");
        // untouched fields keep their defaults
        assert_eq!(merged.retrieval.general_collection, "code_travail");
        assert_eq!(merged.synthesis.temperature, 0.4);
        assert_eq!(merged.synthesis.max_passages, 3);
        assert_eq!(merged.conventions.as_ref().map(Vec::len), Some(1));
        assert_eq!(merged.log_level, Some("warn".to_string()));
        assert!(merged.no_color);
    }

    #[test]
    fn test_merge_yaml_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "routing:\n  timeoutSecs: 5\n").unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.routing.timeout_secs, 5);
    }

    #[test]
    fn test_load_with_reads_workspace_config() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(".droit")).unwrap();
        std::fs::write(
            temp.path().join(".droit/config.yaml"),
            "retrieval:\n  topK: 4\n",
        )
        .unwrap();

        let config = AppConfig::load_with(Some(temp.path().to_path_buf()), None).unwrap();
        assert_eq!(config.workspace, temp.path());
        assert_eq!(config.retrieval.top_k, 4);
    }

    #[test]
    fn test_load_with_missing_workspace() {
        let result = AppConfig::load_with(Some(PathBuf::from("/nonexistent/droit/ws")), None);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_merge_yaml_invalid_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "retrieval: [not, a, map]").unwrap();

        let result = AppConfig::default().merge_yaml(&path);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ollama() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_top_k() {
        let mut config = AppConfig::default();
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_temperature() {
        let mut config = AppConfig::default();
        config.synthesis.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-test".to_string());
        assert_eq!(config.resolve_api_key("openai"), Some("sk-test".to_string()));
    }
}
