use crate::indexer::IndexSource;
use crate::models::Provider;
use crate::normalizer::NormalizeLimits;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct SourcesConfig {
    pub codex_dir: Option<PathBuf>,
    pub claude_dir: Option<PathBuf>,
    pub copilot_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "LimitsConfig::default_max_chars")]
    pub max_chars_per_session: usize,
    #[serde(default = "LimitsConfig::default_max_messages")]
    pub max_messages_per_session: usize,
    #[serde(default = "LimitsConfig::default_embed_delay_ms")]
    pub embed_delay_ms: u64,
}

impl LimitsConfig {
    fn default_max_chars() -> usize {
        20_000
    }

    fn default_max_messages() -> usize {
        80
    }

    fn default_embed_delay_ms() -> u64 {
        250
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_chars_per_session: Self::default_max_chars(),
            max_messages_per_session: Self::default_max_messages(),
            embed_delay_ms: Self::default_embed_delay_ms(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "EmbeddingConfig::default_model")]
    pub model: String,
    #[serde(default = "EmbeddingConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl EmbeddingConfig {
    fn default_model() -> String {
        crate::embeddings::DEFAULT_MODEL.to_string()
    }

    fn default_timeout_secs() -> u64 {
        30
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: Self::default_model(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

/// On-disk configuration. The embedding credential is deliberately not part
/// of this file; it comes from `OPENAI_API_KEY` only.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?
            .join("session-vector-search");

        let config_path = config_dir.join("config.yaml");

        let config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            // Create default config if it doesn't exist
            fs::create_dir_all(&config_dir)?;
            let default_config = Self::default();
            let content = serde_yaml::to_string(&default_config)?;
            fs::write(&config_path, content)?;
            default_config
        };

        Ok(config)
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(data_dir) = &self.data_dir {
            return Ok(data_dir.clone());
        }
        let base = dirs::data_dir().ok_or_else(|| anyhow!("Could not determine data directory"))?;
        Ok(base.join("session-vector-search"))
    }

    pub fn embeddings_file(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("session-embeddings.jsonl"))
    }

    pub fn provider_root(&self, provider: Provider) -> Result<PathBuf> {
        let configured = match provider {
            Provider::Codex => &self.sources.codex_dir,
            Provider::Claude => &self.sources.claude_dir,
            Provider::Copilot => &self.sources.copilot_dir,
        };
        if let Some(root) = configured {
            return Ok(root.clone());
        }

        let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(match provider {
            Provider::Codex => home.join(".codex").join("sessions"),
            Provider::Claude => home.join(".claude").join("projects"),
            Provider::Copilot => home.join(".copilot").join("session-state"),
        })
    }

    pub fn index_sources(&self) -> Result<Vec<IndexSource>> {
        Provider::ALL
            .iter()
            .map(|&provider| {
                Ok(IndexSource {
                    provider,
                    root: self.provider_root(provider)?,
                })
            })
            .collect()
    }

    pub fn normalize_limits(&self) -> NormalizeLimits {
        NormalizeLimits {
            max_messages: self.limits.max_messages_per_session,
            max_chars: self.limits.max_chars_per_session,
        }
    }

    pub fn embed_delay(&self) -> Duration {
        Duration::from_millis(self.limits.embed_delay_ms)
    }

    pub fn embed_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding.timeout_secs)
    }
}

/// The embedding credential, if configured. Empty values count as absent so
/// an `OPENAI_API_KEY=""` in the environment doesn't defeat the fast-fail.
pub fn api_key_from_env() -> Option<String> {
    std::env::var("OPENAI_API_KEY").ok().filter(|key| !key.is_empty())
}
