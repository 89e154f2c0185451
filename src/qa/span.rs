//! Turns start/end logits into the best answer span of a context.
//!
//! Token offsets are byte ranges into the context; tokens that belong to the
//! question or are special tokens carry `None`. Index 0 is the CLS token and
//! stands for "no answer".

use super::Answer;
use tracing::debug;

const MASKED_LOGIT: f32 = -10_000.0;

#[derive(Debug, Clone, Copy)]
pub struct SpanDecoder {
    pub max_answer_len: usize,
    pub min_score: f32,
}

impl SpanDecoder {
    pub fn new(max_answer_len: usize, min_score: f32) -> Self {
        Self {
            max_answer_len: max_answer_len.max(1),
            min_score,
        }
    }

    pub fn decode(
        &self,
        start_logits: &[f32],
        end_logits: &[f32],
        offsets: &[Option<(usize, usize)>],
        context: &str,
    ) -> Answer {
        let n = start_logits.len().min(end_logits.len()).min(offsets.len());
        if n == 0 {
            return Answer::none(0.0);
        }

        let allowed = |i: usize| i == 0 || offsets[i].is_some();
        let p_start = softmax_masked(&start_logits[..n], allowed);
        let p_end = softmax_masked(&end_logits[..n], allowed);
        let null_score = p_start[0] * p_end[0];

        let mut best: Option<(usize, usize, f32)> = None;
        for i in 1..n {
            if offsets[i].is_none() {
                continue;
            }
            let last = (i + self.max_answer_len).min(n);
            for j in i..last {
                if offsets[j].is_none() {
                    continue;
                }
                let score = p_start[i] * p_end[j];
                if best.is_none_or(|(_, _, s)| score > s) {
                    best = Some((i, j, score));
                }
            }
        }

        let Some((i, j, score)) = best else {
            debug!("No context tokens to choose an answer from");
            return Answer::none(0.0);
        };

        if null_score > score || score < self.min_score {
            debug!(
                "Falling back to empty answer (best {:.4}, null {:.4}, min {:.4})",
                score, null_score, self.min_score
            );
            return Answer::none(score);
        }

        let (Some((start, _)), Some((_, end))) = (offsets[i], offsets[j]) else {
            return Answer::none(score);
        };
        span_text(context, start, end)
            .map(|(start, end)| Answer {
                text: context[start..end].to_string(),
                score: score.clamp(0.0, 1.0),
                start,
                end,
            })
            .unwrap_or_else(|| Answer::none(score))
    }
}

/// Validates a byte range against `context` and trims surrounding whitespace.
fn span_text(context: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let raw = context.get(start..end)?;
    let leading = raw.len() - raw.trim_start().len();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let start = start + leading;
    Some((start, start + trimmed.len()))
}

fn softmax_masked(logits: &[f32], allowed: impl Fn(usize) -> bool) -> Vec<f32> {
    let masked: Vec<f32> = logits
        .iter()
        .enumerate()
        .map(|(i, &l)| if allowed(i) { l } else { MASKED_LOGIT })
        .collect();
    let max = masked.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = masked.iter().map(|l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
