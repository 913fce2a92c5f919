use parley_core::{ModelChoice, ParleyError, ParleyResult, ResponseStyle};
use serde::{Deserialize, Serialize};

/// Smallest extended-thinking budget the model accepts.
pub const MIN_THINKING_BUDGET: u32 = 4_000;
/// Largest extended-thinking budget offered.
pub const MAX_THINKING_BUDGET: u32 = 64_000;
/// Headroom kept between the thinking budget and `max_tokens`.
pub const MAX_TOKENS_HEADROOM: u32 = 500;
/// Upper bound on `max_tokens` without extended thinking (before headroom).
pub const MAX_TOKENS_LIMIT: u32 = 8_000;

/// Per-session model and inference selections.
///
/// These are plain mutable fields read before each send. Range checks live in
/// [`ChatSettings::validate`] and run where the values enter the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSettings {
    /// Model to call.
    #[serde(default)]
    pub model: ModelChoice,
    /// Response style appended to the system prompt.
    #[serde(default)]
    pub style: ResponseStyle,
    /// Ignored while extended thinking is on.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Upper bound on generated tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Requested thinking; applies only to models that support it.
    #[serde(default)]
    pub extended_thinking: bool,
    /// Token budget for extended thinking.
    #[serde(default = "default_thinking_budget")]
    pub thinking_budget: u32,
}

fn default_temperature() -> f32 {
    0.5
}

fn default_max_tokens() -> u32 {
    1_000
}

fn default_thinking_budget() -> u32 {
    MIN_THINKING_BUDGET
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: ModelChoice::default(),
            style: ResponseStyle::default(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            extended_thinking: false,
            thinking_budget: default_thinking_budget(),
        }
    }
}

impl ChatSettings {
    /// Whether extended thinking is both requested and available.
    pub fn thinking_enabled(&self) -> bool {
        self.extended_thinking && self.model.supports_extended_thinking()
    }

    /// Thinking budget to send, only when thinking is on.
    pub fn thinking_budget_tokens(&self) -> Option<u32> {
        self.thinking_enabled().then_some(self.thinking_budget)
    }

    /// Extended thinking requires temperature 1.0.
    pub fn effective_temperature(&self) -> f32 {
        if self.thinking_enabled() {
            1.0
        } else {
            self.temperature
        }
    }

    /// Inclusive `max_tokens` range for the current thinking selection.
    pub fn max_tokens_range(&self) -> (u32, u32) {
        if self.thinking_enabled() {
            (
                self.thinking_budget + MAX_TOKENS_HEADROOM,
                MAX_THINKING_BUDGET + MAX_TOKENS_HEADROOM,
            )
        } else {
            (MAX_TOKENS_HEADROOM, MAX_TOKENS_LIMIT + MAX_TOKENS_HEADROOM)
        }
    }

    /// Checks every range, returning a `Config` error naming the first violation.
    pub fn validate(&self) -> ParleyResult<()> {
        if self.extended_thinking && !self.model.supports_extended_thinking() {
            return Err(ParleyError::Config(format!(
                "Extended thinking is not available for {}",
                self.model
            )));
        }

        if self.thinking_enabled()
            && !(MIN_THINKING_BUDGET..=MAX_THINKING_BUDGET).contains(&self.thinking_budget)
        {
            return Err(ParleyError::Config(format!(
                "Thinking budget must be between {MIN_THINKING_BUDGET} and {MAX_THINKING_BUDGET} tokens"
            )));
        }

        let (min, max) = self.max_tokens_range();
        if !(min..=max).contains(&self.max_tokens) {
            return Err(ParleyError::Config(format!(
                "Max tokens must be between {min} and {max}"
            )));
        }

        if !self.thinking_enabled() && !(0.0..=1.0).contains(&self.temperature) {
            return Err(ParleyError::Config(
                "Temperature must be between 0.0 and 1.0".into(),
            ));
        }

        Ok(())
    }
}
