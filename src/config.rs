//! Configuration management for fusionrag
//!
//! TOML-based configuration, loaded once at process start and validated
//! before any request is served.
//! Location: ~/.fusionrag/config.toml (or `--config <path>`)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{RagError, Result};
use crate::rag::fusion::FusionWeights;

/// Complete configuration for the RAG service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,
    pub data: DataConfig,
    pub embeddings: EmbeddingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub retriever: RetrieverConfig,
    pub llms: LlmSettings,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Project-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
}

/// Corpus sources and chunking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// File paths, directories or http(s) URLs
    pub sources: Vec<String>,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

/// Vendor behind a chat or embedding model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[serde(rename = "openai")]
    OpenAi,
    Groq,
    Cohere,
    /// Local deterministic embedder, no network access
    Hashing,
}

/// Embedding model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: Provider,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Where passage vectors live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    Memory,
    Qdrant,
}

/// Vector store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub backend: VectorBackend,
    pub url: String,
    pub collection: String,
}

/// Hybrid retrieval and fusion configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    pub vector_weight: f64,
    pub keyword_weight: f64,
    /// Candidates requested from each retriever
    pub similarity_top_k: usize,
    /// Passages kept after fusion
    pub top_k: usize,
    /// Total queries per request, including the original question
    pub num_queries: usize,
}

/// A single chat model (provider, model, temperature)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: Provider,
    pub model: String,
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Generator and grader models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    pub generator: LlmConfig,
    pub grader: LlmConfig,
}

/// Toggles for the optional grading stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    #[serde(alias = "hallucinaton_check")]
    pub hallucination_check: bool,
    pub highlight_segments: bool,
    pub max_concurrent_grades: usize,
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Log output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by RUST_LOG
    pub level: String,
    pub json: bool,
}

fn default_extensions() -> Vec<String> {
    vec!["txt".to_string(), "md".to_string()]
}

fn default_timeout_secs() -> u64 {
    60
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Groq => "groq",
            Provider::Cohere => "cohere",
            Provider::Hashing => "hashing",
        }
    }

    /// Environment variable holding the API key when none is configured
    pub fn default_api_key_env(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("OPENAI_API_KEY"),
            Provider::Groq => Some("GROQ_API_KEY"),
            Provider::Cohere => Some("COHERE_API_KEY"),
            Provider::Hashing => None,
        }
    }

    /// API base URL when none is configured
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Groq => "https://api.groq.com/openai/v1",
            Provider::Cohere => "https://api.cohere.com/v2",
            Provider::Hashing => "",
        }
    }

    pub fn supports_chat(&self) -> bool {
        !matches!(self, Provider::Hashing)
    }

    pub fn supports_embeddings(&self) -> bool {
        !matches!(self, Provider::Groq)
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            data: DataConfig::default(),
            embeddings: EmbeddingConfig::default(),
            vector_store: VectorStoreConfig::default(),
            retriever: RetrieverConfig::default(),
            llms: LlmSettings::default(),
            evaluation: EvaluationConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "fusionrag".to_string(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            extensions: default_extensions(),
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            model: "text-embedding-3-small".to_string(),
            dimensions: Some(512),
            api_key_env: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Memory,
            url: "http://localhost:6334".to_string(),
            collection: "fusionrag".to_string(),
        }
    }
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            vector_weight: 0.6,
            keyword_weight: 0.4,
            similarity_top_k: 4,
            top_k: 4,
            num_queries: 1,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            timeout_secs: default_timeout_secs(),
            api_key_env: None,
            base_url: None,
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            generator: LlmConfig::default(),
            grader: LlmConfig {
                temperature: 0.0,
                ..LlmConfig::default()
            },
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            hallucination_check: true,
            highlight_segments: true,
            max_concurrent_grades: 4,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from file or the default location
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RagError::Configuration(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        Self::from_toml_str(&contents)
    }

    /// Load configuration from the standard location
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_path().ok_or_else(|| {
            RagError::Configuration("Could not determine home directory".to_string())
        })?;

        if !config_path.exists() {
            return Err(RagError::Configuration(format!(
                "No configuration found at {}; pass --config <path>",
                config_path.display()
            )));
        }

        Self::load_from_file(&config_path)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| RagError::Configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML document
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RagError::Configuration(format!("Failed to serialize config: {}", e)))
    }

    /// Standard configuration path
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".fusionrag").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.data.sources.is_empty() {
            return Err(RagError::Configuration(
                "data.sources must list at least one file, directory or URL".to_string(),
            ));
        }

        if self.data.chunk_size == 0 {
            return Err(RagError::Configuration(
                "data.chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.data.chunk_overlap >= self.data.chunk_size {
            return Err(RagError::Configuration(
                "data.chunk_overlap must be less than data.chunk_size".to_string(),
            ));
        }

        FusionWeights::from_config(&self.retriever)?;

        if self.retriever.similarity_top_k == 0 || self.retriever.top_k == 0 {
            return Err(RagError::Configuration(
                "retriever.similarity_top_k and retriever.top_k must be greater than 0".to_string(),
            ));
        }

        if self.retriever.num_queries == 0 {
            return Err(RagError::Configuration(
                "retriever.num_queries must be at least 1".to_string(),
            ));
        }

        if !self.embeddings.provider.supports_embeddings() {
            return Err(RagError::Configuration(format!(
                "Embedding provider '{}' does not offer embeddings",
                self.embeddings.provider
            )));
        }

        if self.embeddings.dimensions == Some(0) {
            return Err(RagError::Configuration(
                "embeddings.dimensions must be greater than 0".to_string(),
            ));
        }

        for (role, llm) in [("generator", &self.llms.generator), ("grader", &self.llms.grader)] {
            if !llm.provider.supports_chat() {
                return Err(RagError::Configuration(format!(
                    "llms.{} provider '{}' does not offer chat completions",
                    role, llm.provider
                )));
            }
            if llm.model.trim().is_empty() {
                return Err(RagError::Configuration(format!("llms.{}.model must be set", role)));
            }
            if !(0.0..=2.0).contains(&llm.temperature) {
                return Err(RagError::Configuration(format!(
                    "llms.{}.temperature must be between 0.0 and 2.0",
                    role
                )));
            }
        }

        if self.evaluation.max_concurrent_grades == 0 {
            return Err(RagError::Configuration(
                "evaluation.max_concurrent_grades must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = self.to_toml_string()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RagError::Configuration(format!("Failed to create config dir: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| RagError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Listener address for the HTTP server
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.data.sources = vec!["data/climate.md".to_string()];
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.retriever.vector_weight, 0.6);
        assert_eq!(config.retriever.keyword_weight, 0.4);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.llms.grader.temperature, 0.0);
    }

    #[test]
    fn test_config_validation_success() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_default_config_needs_sources() {
        let err = Config::default().validate().unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[test]
    fn test_config_validation_weights() {
        let mut config = valid_config();
        config.retriever.keyword_weight = 0.5;
        assert!(matches!(config.validate(), Err(RagError::Configuration(_))));
    }

    #[test]
    fn test_config_validation_overlap() {
        let mut config = valid_config();
        config.data.chunk_overlap = config.data.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_providers() {
        let mut config = valid_config();
        config.embeddings.provider = Provider::Groq;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.llms.grader.provider = Provider::Hashing;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_temperature() {
        let mut config = valid_config();
        config.llms.generator.temperature = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_legacy_hallucination_key() {
        let toml = r#"
            [data]
            sources = ["notes.md"]
            chunk_size = 500
            chunk_overlap = 50

            [embeddings]
            provider = "cohere"
            model = "embed-english-v3.0"

            [llms.generator]
            provider = "groq"
            model = "llama-3.1-8b-instant"
            temperature = 0.0

            [llms.grader]
            provider = "groq"
            model = "llama-3.1-8b-instant"
            temperature = 0.0

            [evaluation]
            hallucinaton_check = true
            highlight_segments = false
        "#;
        let config = Config::from_toml_str(toml).unwrap();
        assert!(config.evaluation.hallucination_check);
        assert!(!config.evaluation.highlight_segments);
        assert_eq!(config.evaluation.max_concurrent_grades, 4);
        assert_eq!(config.embeddings.provider, Provider::Cohere);
        assert_eq!(config.data.extensions, vec!["txt", "md"]);
    }

    #[test]
    fn test_missing_required_section() {
        let toml = r#"
            [data]
            sources = ["notes.md"]
            chunk_size = 500
            chunk_overlap = 50
        "#;
        let err = Config::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        let path = "/absolute/path";
        let expanded = Config::expand_path(path);
        assert_eq!(expanded.to_string_lossy(), path);
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(valid_config().bind_address(), "127.0.0.1:8000");
    }
}
