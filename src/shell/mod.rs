pub mod fsm;

pub use fsm::{QaExchange, ShellContext, ShellEvent, ShellState, ShellStateMachine};

use crate::{
    Error, Result,
    caption::{BlipCaptioner, Caption, CaptionGenerator},
    config::{Config, RegistryToken},
    ingest::{self, UploadedImage},
    qa::{AnswerExtractor, QuestionSet, RobertaQa},
    registry::{HubRegistry, ModelSource},
};
use serde::Serialize;
use std::{future::Future, sync::Arc, time::Duration};
use tracing::{debug, error, info};

/// Render-ready snapshot of one session.
#[derive(Debug, Clone, Serialize)]
pub struct ShellView {
    pub state: ShellState,
    pub caption: Option<Caption>,
    pub has_image: bool,
    pub questions: QuestionSet,
    pub last_exchange: Option<QaExchange>,
    pub last_error: Option<String>,
}

/// Orchestrates ingestion, captioning and answering for sessions.
///
/// Holds no per-session data itself; every operation works on the state
/// machine it is handed.
pub struct Shell {
    captioner: Arc<dyn CaptionGenerator>,
    extractor: Arc<dyn AnswerExtractor>,
    questions: QuestionSet,
    timeout: Duration,
}

impl Shell {
    pub fn new(config: &Config, token: Option<RegistryToken>) -> Self {
        let source: Arc<dyn ModelSource> = Arc::new(HubRegistry::new(&config.registry, token));
        let captioner = Arc::new(BlipCaptioner::new(&config.caption, source.clone()));
        let extractor = Arc::new(RobertaQa::new(&config.qa, source));

        info!(
            "Shell initialized with caption model {}, QA model {}, {} questions",
            config.caption.model_id,
            config.qa.model_id,
            config.questions.len()
        );

        Self::with_components(
            captioner,
            extractor,
            QuestionSet::new(&config.questions),
            Duration::from_secs(config.inference.timeout_secs),
        )
    }

    pub fn with_components(
        captioner: Arc<dyn CaptionGenerator>,
        extractor: Arc<dyn AnswerExtractor>,
        questions: QuestionSet,
        timeout: Duration,
    ) -> Self {
        Self {
            captioner,
            extractor,
            questions,
            timeout,
        }
    }

    pub fn questions(&self) -> &QuestionSet {
        &self.questions
    }

    /// Replaces whatever the session held with a new image and its caption.
    pub async fn upload(
        &self,
        fsm: &mut ShellStateMachine,
        upload: UploadedImage,
    ) -> Result<Caption> {
        fsm.reset();

        let bitmap = match ingest::ingest(&upload) {
            Ok(bitmap) => bitmap,
            Err(e) => {
                debug!("Upload rejected: {}", e);
                fsm.context.set_error(e.clone());
                return Err(e);
            }
        };

        fsm.transition(ShellEvent::ImageDecoded)?;
        fsm.context.bitmap = Some(bitmap.clone());

        let caption = match self.bounded(self.captioner.caption(&bitmap)).await {
            Ok(caption) => caption,
            Err(e) => {
                error!("Caption generation failed: {}", e);
                fsm.context.set_error(e.clone());
                return Err(e);
            }
        };

        info!("Caption generated: {}", caption);
        fsm.transition(ShellEvent::CaptionGenerated)?;
        fsm.context.caption = Some(caption.clone());
        Ok(caption)
    }

    /// Answers the question at `index` against the session's caption.
    pub async fn ask(&self, fsm: &mut ShellStateMachine, index: usize) -> Result<QaExchange> {
        let question = self.questions.get(index)?.clone();

        if fsm.current_state() == ShellState::AnswerDisplayed {
            fsm.transition(ShellEvent::AnswerDismissed)?;
        }

        let Some(caption) = fsm.caption().cloned() else {
            return Err(Error::InvalidTransition {
                current: format!("{:?}", fsm.current_state()),
                requested: format!("{:?}", ShellEvent::AnswerExtracted),
            });
        };

        let answer = match self
            .bounded(self.extractor.answer(&question, &caption))
            .await
        {
            Ok(answer) => answer,
            Err(e) => {
                error!("Answer extraction failed for question {}: {}", index, e);
                fsm.context.set_error(e.clone());
                return Err(e);
            }
        };

        debug!(
            "Question {} answered with {:?} (score {:.4})",
            index, answer.text, answer.score
        );
        fsm.transition(ShellEvent::AnswerExtracted)?;
        fsm.context.clear_error();

        let exchange = QaExchange { question, answer };
        fsm.context.last_exchange = Some(exchange.clone());
        Ok(exchange)
    }

    pub fn view(&self, fsm: &ShellStateMachine) -> ShellView {
        ShellView {
            state: fsm.current_state(),
            caption: fsm.caption().cloned(),
            has_image: fsm.context.bitmap.is_some(),
            questions: self.questions.clone(),
            last_exchange: fsm.context.last_exchange.clone(),
            last_error: fsm.get_last_error().map(|e| e.to_string()),
        }
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| Error::Timeout {
                seconds: self.timeout.as_secs(),
            })?
    }
}
