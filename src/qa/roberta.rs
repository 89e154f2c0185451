use super::{Answer, AnswerExtractor, Question, SpanDecoder};
use crate::{
    Error, Result,
    caption::Caption,
    config::QaConfig,
    loader::{ModelLoader, load_weights},
    registry::{ModelRef, ModelSource},
};
use async_trait::async_trait;
use candle_core::{Device, Module, Tensor};
use candle_transformers::models::xlm_roberta::{Config as RobertaConfig, XLMRobertaModel};
use std::sync::Arc;
use tokenizers::{Tokenizer, TruncationDirection, TruncationParams, TruncationStrategy};
use tracing::debug;

/// Index of the context in a `(question, context)` pair encoding.
const CONTEXT_SEQUENCE: usize = 1;

struct RobertaModel {
    encoder: XLMRobertaModel,
    qa_outputs: candle_nn::Linear,
    tokenizer: Tokenizer,
    device: Device,
}

impl RobertaModel {
    fn load(source: &dyn ModelSource, config: &QaConfig) -> Result<Self> {
        let model_ref = ModelRef::new(&config.model_id, config.revision.clone());
        let tokenizer_ref = match config.tokenizer_repo {
            Some(ref repo) => ModelRef::new(repo, None),
            None => model_ref.clone(),
        };
        let unavailable = |e: candle_core::Error| Error::model_unavailable(&config.model_id, e);

        let config_file = source.fetch(&model_ref, "config.json")?;
        let weights = source.fetch(&model_ref, &config.weights_file)?;
        let tokenizer_file = source.fetch(&tokenizer_ref, "tokenizer.json")?;

        let raw_config = std::fs::read(&config_file)
            .map_err(|e| Error::model_unavailable(&config.model_id, e))?;
        let model_config: RobertaConfig = serde_json::from_slice(&raw_config)
            .map_err(|e| Error::model_unavailable(&config.model_id, e))?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_file)
            .map_err(|e| Error::model_unavailable(&config.model_id, e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_seq_len,
                strategy: TruncationStrategy::OnlySecond,
                stride: 0,
                direction: TruncationDirection::Right,
            }))
            .map_err(|e| Error::model_unavailable(&config.model_id, e))?;

        let device = Device::cuda_if_available(0).map_err(unavailable)?;
        let vb = load_weights(&weights, &device).map_err(unavailable)?;
        let encoder = XLMRobertaModel::new(&model_config, vb.pp("roberta")).map_err(unavailable)?;
        let qa_outputs =
            candle_nn::linear(model_config.hidden_size, 2, vb.pp("qa_outputs")).map_err(unavailable)?;

        Ok(Self {
            encoder,
            qa_outputs,
            tokenizer,
            device,
        })
    }

    fn extract(&self, question: &str, context: &str, decoder: &SpanDecoder) -> Result<Answer> {
        let encoding = self
            .tokenizer
            .encode((question, context), true)
            .map_err(Error::inference)?;

        let offsets: Vec<Option<(usize, usize)>> = encoding
            .get_sequence_ids()
            .into_iter()
            .zip(encoding.get_offsets())
            .map(|(sequence, &offset)| (sequence == Some(CONTEXT_SEQUENCE)).then_some(offset))
            .collect();

        let [start_logits, end_logits] = self
            .logits(encoding.get_ids())
            .map_err(Error::inference)?;
        debug!(
            "QA pass over {} tokens ({} context)",
            offsets.len(),
            offsets.iter().filter(|o| o.is_some()).count()
        );

        Ok(decoder.decode(&start_logits, &end_logits, &offsets, context))
    }

    fn logits(&self, ids: &[u32]) -> candle_core::Result<[Vec<f32>; 2]> {
        let input_ids = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        let attention_mask = input_ids.ones_like()?;
        let token_type_ids = input_ids.zeros_like()?;

        let hidden = self.encoder.forward(
            &input_ids,
            &attention_mask,
            &token_type_ids,
            None,
            None,
            None,
        )?;
        // (1, seq, 2) -> (2, seq)
        let logits = self.qa_outputs.forward(&hidden)?.squeeze(0)?.t()?.contiguous()?;
        let mut rows = logits.to_vec2::<f32>()?.into_iter();
        match (rows.next(), rows.next()) {
            (Some(start), Some(end)) => Ok([start, end]),
            _ => candle_core::bail!("qa head did not produce start and end logits"),
        }
    }
}

/// Extractive QA with a RoBERTa encoder and a span-classification head.
pub struct RobertaQa {
    loader: ModelLoader<RobertaModel>,
    decoder: SpanDecoder,
}

impl RobertaQa {
    pub fn new(config: &QaConfig, source: Arc<dyn ModelSource>) -> Self {
        let load_config = config.clone();
        Self {
            loader: ModelLoader::new(config.model_id.clone(), move || {
                RobertaModel::load(source.as_ref(), &load_config)
            }),
            decoder: SpanDecoder::new(config.max_answer_len, config.min_score),
        }
    }
}

#[async_trait]
impl AnswerExtractor for RobertaQa {
    async fn answer(&self, question: &Question, context: &Caption) -> Result<Answer> {
        debug!(
            "Answering question {} with {}",
            question.index,
            self.loader.model_id()
        );
        let question = question.text.clone();
        let context = context.as_str().to_string();
        let decoder = self.decoder;
        self.loader
            .run(move |model| model.extract(&question, &context, &decoder))
            .await
    }
}
