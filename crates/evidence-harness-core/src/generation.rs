//! Text generation collaborator.
//!
//! The core only assembles a context block and an instruction; turning
//! them into an answer is delegated to a [`Generator`]. Implementations
//! (OpenAI chat completions, a disabled stub) live in the app crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Token counts reported by a generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens += rhs.prompt_tokens;
        self.completion_tokens += rhs.completion_tokens;
        self.total_tokens += rhs.total_tokens;
    }
}

/// Answer text plus the usage it cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    pub usage: TokenUsage,
}

impl Generation {
    /// A fixed answer produced without calling the collaborator.
    pub fn canned(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: TokenUsage::default(),
        }
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;
    /// Produce text for `instruction` grounded in `context`.
    ///
    /// Timeouts and transport failures surface as `Err`; the caller decides
    /// whether that fails a whole request or a single slot.
    async fn generate(&self, context: &str, instruction: &str) -> anyhow::Result<Generation>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_accumulates() {
        let mut total = TokenUsage::default();
        total += TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        };
        total += TokenUsage {
            prompt_tokens: 1,
            completion_tokens: 2,
            total_tokens: 3,
        };
        assert_eq!(total.total_tokens, 18);
        assert_eq!(total.prompt_tokens, 11);
    }

    #[test]
    fn test_canned_has_zero_usage() {
        let g = Generation::canned("nothing");
        assert_eq!(g.usage, TokenUsage::default());
        assert_eq!(g.text, "nothing");
    }
}
