use super::{Caption, CaptionGenerator};
use crate::{
    Error, Result,
    config::{BlipVariant, CaptionConfig},
    ingest::Bitmap,
    loader::{ModelLoader, load_weights},
    registry::{ModelRef, ModelSource},
};
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::{blip, blip_text};
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::debug;

/// `[DEC]`, the decoder start token BLIP captions are generated from.
const BOS_TOKEN_ID: u32 = 30522;
const SEP_TOKEN_ID: u32 = 102;

const IMAGE_MEAN: [f32; 3] = [0.48145466, 0.4578275, 0.40821073];
const IMAGE_STD: [f32; 3] = [0.26862954, 0.261_302_6, 0.275_777_1];

fn blip_base_config() -> blip::Config {
    let text_config = blip_text::Config {
        vocab_size: 30524,
        hidden_size: 768,
        encoder_hidden_size: 768,
        intermediate_size: 3072,
        projection_dim: 768,
        num_hidden_layers: 12,
        num_attention_heads: 12,
        max_position_embeddings: 512,
        hidden_act: candle_nn::Activation::Gelu,
        layer_norm_eps: 1e-12,
        is_decoder: true,
    };
    let vision_config = blip::VisionConfig {
        hidden_size: 768,
        intermediate_size: 3072,
        projection_dim: 512,
        num_hidden_layers: 12,
        num_attention_heads: 12,
        image_size: 384,
        patch_size: 16,
        hidden_act: candle_nn::Activation::Gelu,
        layer_norm_eps: 1e-5,
    };

    blip::Config {
        text_config,
        vision_config,
        projection_dim: 512,
        image_text_hidden_size: 256,
    }
}

/// Squashes the whole frame to `size`x`size`; nothing near the edges is cropped.
fn resize_for_vision(bitmap: &Bitmap, size: u32) -> image::RgbImage {
    image::imageops::resize(
        bitmap.as_rgb(),
        size,
        size,
        image::imageops::FilterType::Triangle,
    )
}

struct BlipModel {
    model: blip::BlipForConditionalGeneration,
    tokenizer: Tokenizer,
    logits_processor: LogitsProcessor,
    device: Device,
    image_size: usize,
}

impl BlipModel {
    fn load(source: &dyn ModelSource, config: &CaptionConfig) -> Result<Self> {
        let model_ref = ModelRef::new(&config.model_id, config.revision.clone());
        let tokenizer_ref = match config.tokenizer_repo {
            Some(ref repo) => ModelRef::new(repo, None),
            None => model_ref.clone(),
        };
        let unavailable = |e: candle_core::Error| Error::model_unavailable(&config.model_id, e);

        let weights = source.fetch(&model_ref, &config.weights_file)?;
        let tokenizer_file = source.fetch(&tokenizer_ref, "tokenizer.json")?;

        let tokenizer = Tokenizer::from_file(tokenizer_file)
            .map_err(|e| Error::model_unavailable(&config.model_id, e))?;

        let blip_config = match config.variant {
            BlipVariant::Base => blip_base_config(),
            BlipVariant::Large => blip::Config::image_captioning_large(),
        };
        let image_size = blip_config.vision_config.image_size;

        let device = Device::cuda_if_available(0).map_err(unavailable)?;
        let vb = load_weights(&weights, &device).map_err(unavailable)?;
        let model = blip::BlipForConditionalGeneration::new(&blip_config, vb).map_err(unavailable)?;

        // No temperature: argmax at every step
        let logits_processor = LogitsProcessor::new(0, None, None);

        Ok(Self {
            model,
            tokenizer,
            logits_processor,
            device,
            image_size,
        })
    }

    fn generate(&mut self, bitmap: &Bitmap, max_new_tokens: usize) -> Result<String> {
        let pixels = self.preprocess(bitmap).map_err(Error::inference)?;
        let token_ids = self
            .generate_tokens(&pixels, max_new_tokens)
            .map_err(Error::inference)?;
        debug!("BLIP generated {} tokens", token_ids.len() - 1);

        self.tokenizer
            .decode(&token_ids, true)
            .map_err(Error::inference)
    }

    fn preprocess(&self, bitmap: &Bitmap) -> candle_core::Result<Tensor> {
        let size = self.image_size;
        let img = resize_for_vision(bitmap, size as u32);
        let data = Tensor::from_vec(img.into_raw(), (size, size, 3), &Device::Cpu)?
            .permute((2, 0, 1))?;
        let mean = Tensor::new(&IMAGE_MEAN, &Device::Cpu)?.reshape((3, 1, 1))?;
        let std = Tensor::new(&IMAGE_STD, &Device::Cpu)?.reshape((3, 1, 1))?;
        (data.to_dtype(DType::F32)? / 255.)?
            .broadcast_sub(&mean)?
            .broadcast_div(&std)?
            .to_device(&self.device)
    }

    fn generate_tokens(
        &mut self,
        pixels: &Tensor,
        max_new_tokens: usize,
    ) -> candle_core::Result<Vec<u32>> {
        let image_embeds = pixels.unsqueeze(0)?.apply(self.model.vision_model())?;

        // Every generation starts from an empty cache
        self.model.text_decoder().reset_kv_cache();

        let mut token_ids = vec![BOS_TOKEN_ID];
        for index in 0..max_new_tokens {
            let context_size = if index > 0 { 1 } else { token_ids.len() };
            let start_pos = token_ids.len().saturating_sub(context_size);
            let input_ids = Tensor::new(&token_ids[start_pos..], &self.device)?.unsqueeze(0)?;
            let logits = self
                .model
                .text_decoder()
                .forward(&input_ids, &image_embeds)?;
            let logits = logits.squeeze(0)?;
            let logits = logits.get(logits.dim(0)? - 1)?;
            let token = self.logits_processor.sample(&logits)?;
            if token == SEP_TOKEN_ID {
                break;
            }
            token_ids.push(token);
        }

        Ok(token_ids)
    }
}

/// BLIP image captioning with greedy decoding.
pub struct BlipCaptioner {
    loader: ModelLoader<BlipModel>,
    max_new_tokens: usize,
}

impl BlipCaptioner {
    pub fn new(config: &CaptionConfig, source: Arc<dyn ModelSource>) -> Self {
        let load_config = config.clone();
        Self {
            loader: ModelLoader::new(config.model_id.clone(), move || {
                BlipModel::load(source.as_ref(), &load_config)
            }),
            max_new_tokens: config.max_new_tokens,
        }
    }
}

#[async_trait]
impl CaptionGenerator for BlipCaptioner {
    async fn caption(&self, bitmap: &Bitmap) -> Result<Caption> {
        debug!(
            "Captioning {}x{} image with {}",
            bitmap.width(),
            bitmap.height(),
            self.loader.model_id()
        );
        let bitmap = bitmap.clone();
        let max_new_tokens = self.max_new_tokens;
        let text = self
            .loader
            .run(move |model| model.generate(&bitmap, max_new_tokens))
            .await?;
        Caption::new(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OfflineSource {
        calls: AtomicUsize,
    }

    impl ModelSource for OfflineSource {
        fn fetch(&self, model: &ModelRef, filename: &str) -> Result<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::model_unavailable(
                &model.id,
                format!("{filename}: connection refused"),
            ))
        }
    }

    #[test]
    fn test_base_config_matches_checkpoint_shape() {
        let config = blip_base_config();
        assert_eq!(config.vision_config.image_size, 384);
        assert_eq!(config.text_config.vocab_size, 30524);
        assert!(config.text_config.is_decoder);
    }

    #[test]
    fn test_wide_images_keep_their_edges() {
        // Red stripe in the leftmost tenth of a 4:1 frame
        let wide = image::RgbImage::from_fn(400, 100, |x, _| {
            if x < 40 {
                image::Rgb([255, 0, 0])
            } else {
                image::Rgb([0, 0, 255])
            }
        });

        let resized = resize_for_vision(&Bitmap::from_rgb(wide), 384);

        assert_eq!(resized.dimensions(), (384, 384));
        let left = resized.get_pixel(0, 192);
        let right = resized.get_pixel(383, 192);
        assert!(left[0] > 250 && left[2] < 5, "left edge was {left:?}");
        assert!(right[2] > 250 && right[0] < 5, "right edge was {right:?}");
    }

    #[tokio::test]
    async fn test_unresolvable_model_is_reported_and_retried() {
        let source = Arc::new(OfflineSource {
            calls: AtomicUsize::new(0),
        });
        let captioner = BlipCaptioner::new(&CaptionConfig::default(), source.clone());
        let bitmap = Bitmap::from_rgb(image::RgbImage::new(2, 2));

        let first = captioner.caption(&bitmap).await.unwrap_err();
        let second = captioner.caption(&bitmap).await.unwrap_err();

        assert!(matches!(first, Error::ModelUnavailable { ref model_id, .. }
            if model_id == "Salesforce/blip-image-captioning-base"));
        assert!(matches!(second, Error::ModelUnavailable { .. }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
