mod types;

pub use types::*;

use crate::{Error, Result};
use std::{collections::HashSet, env, path::Path};
use tracing::{debug, info, warn};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

pub async fn load() -> Result<Config> {
    let explicit = env::var("CONFIG_PATH").ok();
    let config_path = explicit
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    // Only the implicit default path may be absent
    if explicit.is_none() && !Path::new(&config_path).exists() {
        info!("No {} found, using built-in configuration", config_path);
        let config = Config::default();
        config.validate()?;
        return Ok(config);
    }

    load_from(&config_path).await
}

pub async fn load_from(config_path: &str) -> Result<Config> {
    debug!("Loading configuration from: {}", config_path);

    let config_str = tokio::fs::read_to_string(config_path).await?;
    let config: Config = serde_yaml::from_str(&config_str)?;
    config.validate()?;

    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::config("server.port must be non-zero"));
        }
        if self.inference.timeout_secs == 0 {
            return Err(Error::config("inference.timeout_secs must be non-zero"));
        }
        if self.qa.max_answer_len == 0 {
            return Err(Error::config("qa.max_answer_len must be non-zero"));
        }
        if !(0.0..=1.0).contains(&self.qa.min_score) {
            return Err(Error::config("qa.min_score must be within [0, 1]"));
        }
        if self.questions.is_empty() {
            return Err(Error::config("at least one question is required"));
        }

        let mut seen = HashSet::new();
        for question in &self.questions {
            let trimmed = question.trim();
            if trimmed.is_empty() {
                return Err(Error::config("questions must not be blank"));
            }
            if !seen.insert(trimmed) {
                return Err(Error::config(format!("duplicate question: {trimmed}")));
            }
        }

        Ok(())
    }
}

impl RegistryConfig {
    /// Reads the hub token from the configured secret file or environment variable.
    ///
    /// The file wins when both are present. A missing token is not an error:
    /// public models resolve anonymously.
    pub async fn resolve_token(&self) -> Result<Option<RegistryToken>> {
        self.resolve_token_with(|name| env::var(name).ok()).await
    }

    pub async fn resolve_token_with<F>(&self, lookup: F) -> Result<Option<RegistryToken>>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ref path) = self.token_file {
            let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                Error::config(format!(
                    "failed to read registry token file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            debug!("Registry token read from file");
            return Ok(RegistryToken::new(raw));
        }

        match lookup(&self.token_env).and_then(RegistryToken::new) {
            Some(token) => {
                debug!("Registry token read from ${}", self.token_env);
                Ok(Some(token))
            }
            None => {
                warn!(
                    "No registry token in ${}, resolving models anonymously",
                    self.token_env
                );
                Ok(None)
            }
        }
    }
}
