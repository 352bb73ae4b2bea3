use async_trait::async_trait;
use croplisten_core::SentimentError;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// The pretrained 3-class classifier as the scorer sees it: opaque text
/// in, probability vector out. Order is `[negative, neutral, positive]`.
#[async_trait]
pub trait ChunkClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<[f64; 3], SentimentError>;
}

/// Classifier served over HTTP by a model server.
pub struct HttpClassifier {
    http: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predictions: Vec<Vec<f64>>,
}

impl HttpClassifier {
    pub fn new(url: impl Into<String>) -> Result<Self, SentimentError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| SentimentError::ClassifierUnavailable {
                details: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

/// A vector is valid when it has exactly three finite entries in [0,1]
/// summing to 1 within rounding error.
pub fn validate_probabilities(scores: &[f64]) -> Result<[f64; 3], SentimentError> {
    if scores.len() != 3 {
        return Err(SentimentError::InvalidProbabilities {
            details: format!("expected 3 class scores, got {}", scores.len()),
        });
    }
    for s in scores {
        if !s.is_finite() || *s < 0.0 || *s > 1.0 {
            return Err(SentimentError::InvalidProbabilities {
                details: format!("class score {s} outside [0,1]"),
            });
        }
    }
    let sum: f64 = scores.iter().sum();
    if (sum - 1.0).abs() > 0.01 {
        return Err(SentimentError::InvalidProbabilities {
            details: format!("class scores sum to {sum}, expected 1.0"),
        });
    }
    Ok([scores[0], scores[1], scores[2]])
}

#[async_trait]
impl ChunkClassifier for HttpClassifier {
    async fn classify(&self, text: &str) -> Result<[f64; 3], SentimentError> {
        let response = self
            .http
            .post(&self.url)
            .json(&json!({ "instances": [{ "text": text }] }))
            .send()
            .await
            .map_err(|e| SentimentError::ClassifierUnavailable {
                details: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SentimentError::InferenceFailed {
                details: format!("model server returned {status}"),
            });
        }

        let body: PredictResponse =
            response
                .json()
                .await
                .map_err(|e| SentimentError::InferenceFailed {
                    details: format!("model response was not valid JSON: {e}"),
                })?;

        let scores = body
            .predictions
            .first()
            .ok_or_else(|| SentimentError::InferenceFailed {
                details: "model returned no predictions".to_string(),
            })?;
        debug!(?scores, "classifier scores");
        validate_probabilities(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_vector_passes() {
        let v = validate_probabilities(&[0.1, 0.6, 0.3]).unwrap();
        assert_eq!(v, [0.1, 0.6, 0.3]);
    }

    #[test]
    fn test_wrong_arity_rejected() {
        assert!(validate_probabilities(&[0.5, 0.5]).is_err());
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(validate_probabilities(&[-0.1, 0.6, 0.5]).is_err());
        assert!(validate_probabilities(&[f64::NAN, 0.5, 0.5]).is_err());
    }

    #[test]
    fn test_bad_sum_rejected() {
        assert!(validate_probabilities(&[0.5, 0.5, 0.5]).is_err());
    }
}
