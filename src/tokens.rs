//! Approximate token counting.
//!
//! Counts come from `tiktoken-rs`. Models the tokenizer tables do not know,
//! which includes every DeepSeek model, are counted with `cl100k_base`, so the
//! numbers shown to the user are an estimate and nothing more.

use std::sync::Arc;

use tiktoken_rs::CoreBPE;

/// The tokenizer used when the model identifier has no known encoding.
pub const DEFAULT_ENCODING: &str = "cl100k_base";

/// Average characters per token for the last-resort heuristic.
const CHARS_PER_TOKEN: usize = 4;

#[derive(Clone)]
enum Encoder {
    /// The encoding registered for the model.
    Model(Arc<CoreBPE>),
    /// [`DEFAULT_ENCODING`] after a lookup miss.
    Default(Arc<CoreBPE>),
    /// No BPE table could be built at all.
    Heuristic,
}

/// Estimates token counts for one model identifier.
#[derive(Clone)]
pub struct TokenEstimator {
    model: String,
    encoder: Encoder,
}

impl TokenEstimator {
    /// Builds an estimator for `model`.
    ///
    /// Lookup misses fall back to [`DEFAULT_ENCODING`] silently; this never fails.
    pub fn for_model(model: &str) -> Self {
        let encoder = match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => Encoder::Model(Arc::new(bpe)),
            Err(err) => {
                tracing::debug!(model, error = %err, "no tokenizer for model; using {DEFAULT_ENCODING}");
                match tiktoken_rs::cl100k_base() {
                    Ok(bpe) => Encoder::Default(Arc::new(bpe)),
                    Err(err) => {
                        tracing::warn!(error = %err, "cannot load {DEFAULT_ENCODING}; estimating by length");
                        Encoder::Heuristic
                    }
                }
            }
        };
        Self {
            model: model.to_string(),
            encoder,
        }
    }

    /// Returns the approximate number of tokens in `text`.
    pub fn estimate(&self, text: &str) -> usize {
        match &self.encoder {
            Encoder::Model(bpe) | Encoder::Default(bpe) => {
                bpe.encode_with_special_tokens(text).len()
            }
            Encoder::Heuristic => text.chars().count().div_ceil(CHARS_PER_TOKEN),
        }
    }

    /// The model identifier this estimator was built for.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// True when the model had no tokenizer of its own.
    pub fn is_fallback(&self) -> bool {
        !matches!(self.encoder, Encoder::Model(_))
    }
}

impl std::fmt::Debug for TokenEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let encoder = match self.encoder {
            Encoder::Model(_) => "model",
            Encoder::Default(_) => DEFAULT_ENCODING,
            Encoder::Heuristic => "heuristic",
        };
        f.debug_struct("TokenEstimator")
            .field("model", &self.model)
            .field("encoder", &encoder)
            .finish()
    }
}
