use crate::{
    Error, Result,
    config::{RegistryConfig, RegistryToken},
};
use hf_hub::{
    Repo, RepoType,
    api::sync::{Api, ApiBuilder},
};
use std::{fmt, path::PathBuf};
use tracing::{debug, info};

/// A model repository on the hub, optionally pinned to a revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub id: String,
    pub revision: Option<String>,
}

impl ModelRef {
    pub fn new(id: impl Into<String>, revision: Option<String>) -> Self {
        Self {
            id: id.into(),
            revision,
        }
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.revision {
            Some(ref rev) => write!(f, "{}@{}", self.id, rev),
            None => f.write_str(&self.id),
        }
    }
}

/// Resolves model files to local paths. Implementations block.
pub trait ModelSource: Send + Sync {
    fn fetch(&self, model: &ModelRef, filename: &str) -> Result<PathBuf>;
}

/// Hugging Face hub client. Files are downloaded on first use and served from
/// the local cache afterwards.
pub struct HubRegistry {
    token: Option<RegistryToken>,
    cache_dir: Option<PathBuf>,
}

impl HubRegistry {
    pub fn new(config: &RegistryConfig, token: Option<RegistryToken>) -> Self {
        info!(
            "Model registry configured (authenticated: {}, cache: {})",
            token.is_some(),
            config
                .cache_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "default".to_string())
        );
        Self {
            token,
            cache_dir: config.cache_dir.clone(),
        }
    }

    fn api(&self) -> std::result::Result<Api, hf_hub::api::sync::ApiError> {
        let mut builder = ApiBuilder::new()
            .with_progress(false)
            .with_token(self.token.as_ref().map(|t| t.expose().to_string()));
        if let Some(ref dir) = self.cache_dir {
            builder = builder.with_cache_dir(dir.clone());
        }
        builder.build()
    }
}

impl ModelSource for HubRegistry {
    fn fetch(&self, model: &ModelRef, filename: &str) -> Result<PathBuf> {
        debug!("Resolving {} from {}", filename, model);

        let api = self
            .api()
            .map_err(|e| Error::model_unavailable(&model.id, e))?;
        let repo = match model.revision {
            Some(ref rev) => Repo::with_revision(model.id.clone(), RepoType::Model, rev.clone()),
            None => Repo::model(model.id.clone()),
        };

        let path = api
            .repo(repo)
            .get(filename)
            .map_err(|e| Error::model_unavailable(&model.id, format!("{filename}: {e}")))?;

        debug!("Resolved {} to {}", filename, path.display());
        Ok(path)
    }
}
