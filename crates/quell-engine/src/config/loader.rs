use super::schema::QuellConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid site.base_url {url:?}: {source}")]
    BaseUrl {
        url: String,
        source: url::ParseError,
    },
}

const LOCAL_CONFIG: &str = "./quell.yaml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the first config file found in [`ConfigLoader::search_paths`],
    /// or the defaults when there is none.
    ///
    /// Credentials from `QUELL_USERNAME` / `QUELL_PASSWORD` override the file.
    pub async fn load_default() -> Result<QuellConfig, ConfigError> {
        for path in Self::search_paths() {
            if path.exists() {
                return Self::load_from(&path).await;
            }
        }
        debug!("No config file found, using defaults");
        Self::finish(QuellConfig::default())
    }

    /// `./quell.yaml`, then `~/.quell/config.yaml`.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".quell").join("config.yaml"));
        }
        paths
    }

    pub async fn load_from(path: &Path) -> Result<QuellConfig, ConfigError> {
        debug!("Loading config from {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        Self::finish(Self::parse(&content)?)
    }

    /// Parse YAML without consulting the environment.
    pub fn parse(content: &str) -> Result<QuellConfig, ConfigError> {
        let config: QuellConfig = serde_yaml::from_str(content)?;
        config
            .site
            .url("/")
            .map_err(|source| ConfigError::BaseUrl {
                url: config.site.base_url.clone(),
                source,
            })?;
        Ok(config)
    }

    fn finish(mut config: QuellConfig) -> Result<QuellConfig, ConfigError> {
        config.credentials.apply_env();
        Ok(config)
    }
}
