use crate::chunk::{split_into_chunks, word_count, MAX_WORDS_PER_CHUNK, SINGLE_CHUNK_WORD_LIMIT};
use crate::lexicon::Lexicon;
use crate::model::ChunkClassifier;
use crate::preprocess::preprocess;
use croplisten_core::{AgriculturalTerm, SentimentError, SentimentResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything produced for one scored text.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub sentiment: SentimentResult,
    pub entities: Vec<AgriculturalTerm>,
    pub processed_text: String,
}

/// Blends the opaque 3-class classifier with the keyword lexicon and
/// handles texts of any length by chunking.
pub struct Analyzer {
    classifier: Arc<dyn ChunkClassifier>,
    lexicon: Lexicon,
}

fn round5(v: f64) -> f64 {
    (v * 100_000.0).round() / 100_000.0
}

impl Analyzer {
    pub fn new(classifier: Arc<dyn ChunkClassifier>, lexicon: Lexicon) -> Self {
        Self {
            classifier,
            lexicon,
        }
    }

    /// Full pipeline: preprocess, score, extract terms. Empty input (or
    /// input that cleans down to nothing) is an error so callers can mark
    /// the post skipped rather than storing a meaningless neutral.
    pub async fn analyze(&self, text: &str) -> Result<Analysis, SentimentError> {
        let pre = preprocess(text);
        if pre.processed_text.trim().is_empty() {
            return Err(SentimentError::EmptyInput);
        }
        let sentiment = self.score_text(&pre.processed_text).await?;
        Ok(Analysis {
            sentiment,
            entities: pre.terms,
            processed_text: pre.processed_text,
        })
    }

    /// Score already-cleaned text, chunking when it is too long for one
    /// classifier pass.
    pub async fn score_text(&self, text: &str) -> Result<SentimentResult, SentimentError> {
        if word_count(text) < SINGLE_CHUNK_WORD_LIMIT {
            self.score_single_chunk(text).await
        } else {
            Ok(self.score_multiple_chunks(text).await)
        }
    }

    async fn score_single_chunk(&self, text: &str) -> Result<SentimentResult, SentimentError> {
        let raw = self.classifier.classify(text).await?;
        let (positive, negative, neutral) = self.refine(text, raw);
        Ok(SentimentResult::from_scores(
            round5(positive),
            round5(negative),
            round5(neutral),
        ))
    }

    async fn score_multiple_chunks(&self, text: &str) -> SentimentResult {
        let chunks = split_into_chunks(text, MAX_WORDS_PER_CHUNK);
        debug!(
            chunks = chunks.len(),
            words = word_count(text),
            "split long text into chunks"
        );

        // (scores, chunk word count) per successfully scored chunk
        let mut scored: Vec<(SentimentResult, usize)> = Vec::new();
        for chunk in &chunks {
            if chunk.trim().is_empty() {
                continue;
            }
            match self.score_single_chunk(chunk).await {
                Ok(result) => scored.push((result, word_count(chunk))),
                Err(e) => warn!(error = %e, "chunk failed to score, skipping"),
            }
        }

        if scored.is_empty() {
            warn!("all chunks failed to score, falling back to truncated text");
            let fallback: String = text
                .split_whitespace()
                .take(250)
                .collect::<Vec<_>>()
                .join(" ");
            return match self.score_single_chunk(&fallback).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, "fallback scoring failed, returning fixed neutral");
                    SentimentResult::neutral_fallback()
                }
            };
        }

        // Weighted average over the chunks that actually scored
        let total_words: usize = scored.iter().map(|(_, w)| *w).sum();
        let mut positive = 0.0;
        let mut negative = 0.0;
        let mut neutral = 0.0;
        for (result, words) in &scored {
            let weight = *words as f64 / total_words as f64;
            positive += result.positive * weight;
            negative += result.negative * weight;
            neutral += result.neutral * weight;
        }

        let total = positive + negative + neutral;
        if total > 0.0 {
            positive /= total;
            negative /= total;
            neutral /= total;
        }

        SentimentResult::from_scores(round5(positive), round5(negative), round5(neutral))
    }

    /// Keyword refinement. The classifier's `[negative, neutral,
    /// positive]` vector is tuned by the net lexicon adjustment; the
    /// neutral class absorbs whatever the clamped positive and negative
    /// shifts actually moved, so the triple stays conserved before the
    /// final renormalization.
    fn refine(&self, text: &str, raw: [f64; 3]) -> (f64, f64, f64) {
        let [ori_negative, ori_neutral, ori_positive] = raw;
        let tune = self.lexicon.tune_score(text);

        let refined_positive = (ori_positive + tune).clamp(0.0, 1.0);
        let refined_negative = (ori_negative - tune).clamp(0.0, 1.0);

        let change_positive = refined_positive - ori_positive;
        let change_negative = refined_negative - ori_negative;
        let refined_neutral = (ori_neutral - change_positive - change_negative).clamp(0.0, 1.0);

        let total = refined_positive + refined_negative + refined_neutral;
        if total > 0.0 {
            (
                refined_positive / total,
                refined_negative / total,
                refined_neutral / total,
            )
        } else {
            (ori_positive, ori_negative, ori_neutral)
        }
    }
}
