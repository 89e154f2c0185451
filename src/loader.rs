use crate::{Error, Result};
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use std::{
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::{debug, error, info};

type CreateModelFn<T> = Arc<dyn Fn() -> Result<T> + Send + Sync>;

/// Lazily loads one model instance and keeps it for the life of the process.
///
/// Loading runs on the blocking pool. A failed load is not remembered, so the
/// next call tries again. The loaded instance is shared behind a mutex, which
/// serialises inference across sessions.
pub struct ModelLoader<T> {
    model_id: String,
    model: tokio::sync::Mutex<Option<Arc<Mutex<T>>>>,
    create_model_fn: CreateModelFn<T>,
}

impl<T> ModelLoader<T>
where
    T: Send + 'static,
{
    pub fn new<F>(model_id: impl Into<String>, create_model: F) -> Self
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        Self {
            model_id: model_id.into(),
            model: tokio::sync::Mutex::new(None),
            create_model_fn: Arc::new(create_model),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub async fn load(&self) -> Result<Arc<Mutex<T>>> {
        let mut current_model = self.model.lock().await;

        if let Some(ref model) = *current_model {
            return Ok(model.clone());
        }

        debug!("loading model {}", self.model_id);
        let create = self.create_model_fn.clone();
        let started = std::time::Instant::now();
        let model = tokio::task::spawn_blocking(move || create())
            .await
            .map_err(|e| Error::model_unavailable(&self.model_id, e))?
            .inspect_err(|e| error!("failed to load model {}: {}", self.model_id, e))?;

        info!(
            "Model {} loaded in {:?}",
            self.model_id,
            started.elapsed()
        );

        let model = Arc::new(Mutex::new(model));
        *current_model = Some(model.clone());
        Ok(model)
    }

    pub async fn is_loaded(&self) -> bool {
        self.model.lock().await.is_some()
    }

    /// Runs `f` against the loaded model on the blocking pool.
    pub async fn run<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut T) -> Result<R> + Send + 'static,
    {
        let model = self.load().await?;
        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|e| Error::internal(format!("Mutex lock failed: {e}")))?;
            f(&mut model)
        })
        .await
        .map_err(Error::inference)?
    }
}

/// Opens a checkpoint as f32 weights, memory-mapping safetensors and reading
/// PyTorch pickles (`.bin`, `.pt`, `.pth`) eagerly.
pub fn load_weights(path: &Path, device: &Device) -> candle_core::Result<VarBuilder<'static>> {
    let is_pickle = path
        .extension()
        .is_some_and(|ext| ext == "bin" || ext == "pth" || ext == "pt");
    if is_pickle {
        VarBuilder::from_pth(path, DType::F32, device)
    } else {
        unsafe { VarBuilder::from_mmaped_safetensors(&[path], DType::F32, device) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_model_is_loaded_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let loader = ModelLoader::new("counter", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(41usize)
        });

        assert!(!loader.is_loaded().await);
        let first = loader.run(|m| Ok(*m + 1)).await.unwrap();
        let second = loader.run(|m| Ok(*m + 1)).await.unwrap();

        assert_eq!(first, 42);
        assert_eq!(second, 42);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(loader.is_loaded().await);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let loader = ModelLoader::new("flaky", move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::model_unavailable("flaky", "registry offline"))
            } else {
                Ok(String::from("ready"))
            }
        });

        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, Error::ModelUnavailable { .. }));
        assert!(!loader.is_loaded().await);

        let value = loader.run(|m| Ok(m.clone())).await.unwrap();
        assert_eq!(value, "ready");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_run_propagates_model_errors() {
        let loader = ModelLoader::new("broken", || Ok(()));
        let err = loader
            .run(|_| -> Result<()> { Err(Error::inference("bad tensor shape")) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Inference(ref m) if m == "bad tensor shape"));
    }
}
