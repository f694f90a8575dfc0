//! Request kind classification.
//!
//! The dispatcher takes the classifier as an injected collaborator; the
//! default is the chat-payload byte heuristic used at admission time, cheap
//! enough to sit on the hot path without a tokenizer.

use crate::scheduler::Pool;

/// Decides a request's kind once, at admission. Immutable thereafter.
pub trait Classifier: Send + Sync {
    fn classify(&self, body: &serde_json::Value) -> Pool;
}

/// Conservative bytes-per-token estimate. UTF-8 English text averages
/// roughly 4 bytes per token.
const BYTES_PER_TOKEN_ESTIMATE: usize = 4;

/// Classifies by estimated prompt tokens against a fixed threshold.
///
/// Sums the `content` strings of `messages` and divides by the byte
/// estimate; payloads without a message list count as zero tokens and land
/// in the short pool.
#[derive(Debug, Clone)]
pub struct TokenEstimateClassifier {
    pub threshold_tokens: usize,
}

impl TokenEstimateClassifier {
    pub fn new(threshold_tokens: usize) -> Self {
        Self { threshold_tokens }
    }

    fn estimate_tokens(body: &serde_json::Value) -> usize {
        let Some(messages) = body.get("messages").and_then(|m| m.as_array()) else {
            return 0;
        };
        let bytes: usize = messages
            .iter()
            .filter_map(|m| m.get("content").and_then(|c| c.as_str()))
            .map(str::len)
            .sum();
        bytes / BYTES_PER_TOKEN_ESTIMATE
    }
}

impl Classifier for TokenEstimateClassifier {
    fn classify(&self, body: &serde_json::Value) -> Pool {
        if Self::estimate_tokens(body) > self.threshold_tokens {
            Pool::Long
        } else {
            Pool::Short
        }
    }
}
