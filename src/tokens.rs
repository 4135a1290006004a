//! Token counting, truncation and cost estimation for one model.
//!
//! Lookups are keyed by model id. Unknown models are expected: they fall back to
//! the `cl100k_base` encoding, [`DEFAULT_CONTEXT_LIMIT`] and zero cost.

use crate::error::AnalyzerError;
use std::borrow::Cow;
use tiktoken_rs::CoreBPE;
use tracing::{debug, warn};

/// Context limit used for models missing from [`context_limit`].
pub const DEFAULT_CONTEXT_LIMIT: usize = 8000;

/// Tokens held back for the prompt wrapped around the file text.
pub const DEFAULT_BUFFER: usize = 500;

/// USD per 1000 tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    pub input: f64,
    pub output: f64,
}

pub fn context_limit(model: &str) -> Option<usize> {
    match model {
        "gpt-4o" | "gpt-4o-mini" => Some(128_000),
        "gpt-4-turbo" | "gpt-4-turbo-preview" => Some(128_000),
        "gpt-4" => Some(8_192),
        "gpt-3.5-turbo" => Some(16_385),
        "claude-3-opus-20240229" | "claude-3-sonnet-20240229" => Some(200_000),
        "claude-3-5-sonnet-20241022" | "claude-3-5-haiku-20241022" => Some(200_000),
        _ => None,
    }
}

pub fn pricing(model: &str) -> Option<Pricing> {
    let (input, output) = match model {
        "gpt-4o" => (0.0025, 0.01),
        "gpt-4o-mini" => (0.000_15, 0.0006),
        "gpt-4-turbo" | "gpt-4-turbo-preview" => (0.01, 0.03),
        "gpt-4" => (0.03, 0.06),
        "gpt-3.5-turbo" => (0.0005, 0.0015),
        "claude-3-opus-20240229" => (0.015, 0.075),
        "claude-3-sonnet-20240229" | "claude-3-5-sonnet-20241022" => (0.003, 0.015),
        "claude-3-5-haiku-20241022" => (0.0008, 0.004),
        _ => return None,
    };
    Some(Pricing { input, output })
}

/// Models with known limits, used by the interactive config.
pub fn known_models() -> &'static [&'static str] {
    &[
        "gpt-4o",
        "gpt-4o-mini",
        "gpt-4-turbo-preview",
        "gpt-4",
        "gpt-3.5-turbo",
        "claude-3-opus-20240229",
        "claude-3-sonnet-20240229",
        "claude-3-5-sonnet-20241022",
        "claude-3-5-haiku-20241022",
    ]
}

/// Token accounting for a single model.
///
/// The usage counters are plain fields: one budget belongs to one analysis run and
/// is not meant to be shared between concurrent runs.
pub struct TokenBudget {
    model: String,
    bpe: CoreBPE,
    input_tokens: u64,
    output_tokens: u64,
}

impl TokenBudget {
    pub fn new(model: impl Into<String>) -> Result<Self, AnalyzerError> {
        let model = model.into();
        let bpe = match tiktoken_rs::get_bpe_from_model(&model) {
            Ok(bpe) => bpe,
            Err(_) => {
                debug!("No tokenizer registered for {}, using cl100k_base", model);
                tiktoken_rs::cl100k_base().map_err(|e| AnalyzerError::Tokenizer(e.to_string()))?
            }
        };
        Ok(Self {
            model,
            bpe,
            input_tokens: 0,
            output_tokens: 0,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    /// Cut `text` so it fits in `max_tokens - buffer` tokens.
    ///
    /// `max_tokens` defaults to the model's context limit. Text that already fits is
    /// returned borrowed, untouched. When the cut splits a multi-byte character the
    /// partial character is dropped, so the result is always valid text and at most
    /// the allowed number of tokens; applying the function again is a no-op.
    pub fn truncate_to_limit<'a>(
        &self,
        text: &'a str,
        max_tokens: Option<usize>,
        buffer: usize,
    ) -> Cow<'a, str> {
        let limit = max_tokens
            .unwrap_or_else(|| context_limit(&self.model).unwrap_or(DEFAULT_CONTEXT_LIMIT))
            .saturating_sub(buffer);

        let tokens = self.bpe.encode_with_special_tokens(text);
        if tokens.len() <= limit {
            return Cow::Borrowed(text);
        }

        let mut keep = limit;
        while keep > 0 {
            if let Ok(decoded) = self.bpe.decode(tokens[..keep].to_vec()) {
                if self.count_tokens(&decoded) <= limit {
                    debug!(
                        "Truncated text from {} to {} tokens",
                        tokens.len(),
                        keep
                    );
                    return Cow::Owned(decoded);
                }
            }
            keep -= 1;
        }
        Cow::Owned(String::new())
    }

    /// Cost in USD of one call, or 0.0 when the model has no pricing.
    pub fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        match pricing(&self.model) {
            Some(price) => {
                (input_tokens as f64 / 1000.0) * price.input
                    + (output_tokens as f64 / 1000.0) * price.output
            }
            None => {
                warn!("No cost data for model {}", self.model);
                0.0
            }
        }
    }

    pub fn track_usage(&mut self, input_tokens: u64, output_tokens: u64) {
        self.input_tokens += input_tokens;
        self.output_tokens += output_tokens;
    }

    pub fn input_tokens(&self) -> u64 {
        self.input_tokens
    }

    pub fn output_tokens(&self) -> u64 {
        self.output_tokens
    }

    pub fn total_cost(&self) -> f64 {
        self.estimate_cost(self.input_tokens, self.output_tokens)
    }

    pub fn reset(&mut self) {
        self.input_tokens = 0;
        self.output_tokens = 0;
    }
}
