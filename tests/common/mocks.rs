use async_trait::async_trait;
use caption_qa::{
    Error, Result,
    caption::{Caption, CaptionGenerator},
    ingest::Bitmap,
    qa::{Answer, AnswerExtractor, Question},
};
use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

/// Mock caption generator for testing
#[derive(Debug)]
pub struct MockCaptionGenerator {
    pub result: Arc<Mutex<std::result::Result<String, Error>>>,
    pub calls: AtomicUsize,
    pub delay: Option<Duration>,
}

impl MockCaptionGenerator {
    pub fn with_caption(caption: &str) -> Self {
        Self {
            result: Arc::new(Mutex::new(Ok(caption.to_string()))),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn with_error(error: Error) -> Self {
        Self {
            result: Arc::new(Mutex::new(Err(error))),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_caption(&self, caption: &str) {
        *self.result.lock().unwrap() = Ok(caption.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptionGenerator for MockCaptionGenerator {
    async fn caption(&self, _bitmap: &Bitmap) -> Result<Caption> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = self.result.lock().unwrap().clone();
        Caption::new(result?)
    }
}

/// Mock extractive QA: answers with the configured phrase when the context
/// contains it, otherwise with the empty fallback.
#[derive(Debug)]
pub struct MockAnswerExtractor {
    pub phrases: HashMap<usize, String>,
    pub error: Option<Error>,
    pub calls: AtomicUsize,
    pub contexts: Mutex<Vec<String>>,
}

impl MockAnswerExtractor {
    pub fn new() -> Self {
        Self {
            phrases: HashMap::new(),
            error: None,
            calls: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_phrase(mut self, question_index: usize, phrase: &str) -> Self {
        self.phrases.insert(question_index, phrase.to_string());
        self
    }

    pub fn with_error(mut self, error: Error) -> Self {
        self.error = Some(error);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn get_contexts(&self) -> Vec<String> {
        self.contexts.lock().unwrap().clone()
    }
}

impl Default for MockAnswerExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnswerExtractor for MockAnswerExtractor {
    async fn answer(&self, question: &Question, context: &Caption) -> Result<Answer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.contexts
            .lock()
            .unwrap()
            .push(context.as_str().to_string());

        if let Some(ref error) = self.error {
            return Err(error.clone());
        }

        let found = self
            .phrases
            .get(&question.index)
            .and_then(|phrase| context.as_str().find(phrase.as_str()).map(|s| (s, phrase)));

        Ok(match found {
            Some((start, phrase)) => Answer {
                text: phrase.clone(),
                score: 0.87,
                start,
                end: start + phrase.len(),
            },
            None => Answer::none(0.001),
        })
    }
}
