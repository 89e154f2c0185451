mod roberta;
pub mod span;

pub use roberta::RobertaQa;
pub use span::SpanDecoder;

use crate::{Error, Result, caption::Caption};
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    pub index: usize,
    pub text: String,
}

/// The fixed, configured list of questions a user can ask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QuestionSet(Vec<Question>);

impl QuestionSet {
    pub fn new<I, S>(questions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            questions
                .into_iter()
                .enumerate()
                .map(|(index, text)| Question {
                    index,
                    text: text.as_ref().trim().to_string(),
                })
                .collect(),
        )
    }

    pub fn get(&self, index: usize) -> Result<&Question> {
        self.0.get(index).ok_or(Error::QuestionNotFound { index })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Extracted answer. `text` is `context[start..end]`, or empty when the model
/// found nothing worth returning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub score: f32,
    pub start: usize,
    pub end: usize,
}

impl Answer {
    /// Fallback for contexts that do not contain an answer.
    pub fn none(score: f32) -> Self {
        Self {
            text: String::new(),
            score: score.clamp(0.0, 1.0),
            start: 0,
            end: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[async_trait]
pub trait AnswerExtractor: Send + Sync {
    async fn answer(&self, question: &Question, context: &Caption) -> Result<Answer>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_set_indexes_in_order() {
        let questions = QuestionSet::new([" What are the ingredients? ", "What are the cooking actions?"]);
        assert_eq!(questions.len(), 2);
        assert_eq!(questions.get(0).unwrap().text, "What are the ingredients?");
        assert_eq!(questions.get(1).unwrap().index, 1);
        assert!(matches!(
            questions.get(2),
            Err(Error::QuestionNotFound { index: 2 })
        ));
    }

    #[test]
    fn test_none_answer_clamps_score() {
        let answer = Answer::none(1.7);
        assert!(answer.is_empty());
        assert_eq!(answer.score, 1.0);
    }
}
