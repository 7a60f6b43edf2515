use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding `api.base_url`.
pub const ENV_API_URL: &str = "TUNEWEAR_API_URL";
/// Environment variable overriding `store.path`.
pub const ENV_STORE_PATH: &str = "TUNEWEAR_STORE_PATH";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub objects: ObjectsConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ObjectsConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub public_base_url: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default = "default_expires_secs")]
    pub expires_secs: u64,
}

impl Default for ObjectsConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            public_base_url: None,
            bucket: None,
            region: default_region(),
            endpoint_url: None,
            expires_secs: default_expires_secs(),
        }
    }
}

fn default_provider() -> String {
    "public".to_string()
}
fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_expires_secs() -> u64 {
    3600
}

/// Longest lifetime S3 accepts for a presigned URL (7 days).
pub const MAX_PRESIGN_SECS: u64 = 604_800;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SeedConfig {
    pub cloth_table: Option<PathBuf>,
    pub songs_table: Option<PathBuf>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content, |key| std::env::var(key).ok())
}

/// Parse and validate a config document. `env` looks up override
/// variables; it is a parameter so tests do not touch the process env.
pub fn parse_config(content: &str, env: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if let Some(url) = env(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
        config.api.base_url = url;
    }
    if let Some(path) = env(ENV_STORE_PATH).filter(|v| !v.trim().is_empty()) {
        config.store.path = PathBuf::from(path);
    }

    // Validate api
    if config.api.base_url.trim().is_empty() {
        anyhow::bail!(
            "api.base_url must be set (or provide {} in the environment)",
            ENV_API_URL
        );
    }
    if config.api.timeout_secs == 0 {
        anyhow::bail!("api.timeout_secs must be > 0");
    }

    // Validate objects
    match config.objects.provider.as_str() {
        "public" => {
            if config
                .objects
                .public_base_url
                .as_deref()
                .map_or(true, |u| u.trim().is_empty())
            {
                anyhow::bail!("objects.public_base_url must be set when provider is 'public'");
            }
        }
        "s3" => {
            if config
                .objects
                .bucket
                .as_deref()
                .map_or(true, |b| b.trim().is_empty())
            {
                anyhow::bail!("objects.bucket must be set when provider is 's3'");
            }
            if !(1..=MAX_PRESIGN_SECS).contains(&config.objects.expires_secs) {
                anyhow::bail!(
                    "objects.expires_secs must be in [1, {}]",
                    MAX_PRESIGN_SECS
                );
            }
        }
        other => anyhow::bail!(
            "Unknown object provider: '{}'. Must be public or s3.",
            other
        ),
    }

    Ok(config)
}
