mod blip;

pub use blip::BlipCaptioner;

use crate::{Error, Result, ingest::Bitmap};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// Generated image description. Always non-empty and trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Caption(String);

impl Caption {
    pub fn new(text: impl AsRef<str>) -> Result<Self> {
        let text = text.as_ref().trim();
        if text.is_empty() {
            return Err(Error::inference("model produced an empty caption"));
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Caption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait CaptionGenerator: Send + Sync {
    async fn caption(&self, bitmap: &Bitmap) -> Result<Caption>;
}
