use crate::{ParleyError, ParleyResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Directive appended to the system prompt for [`ResponseStyle::Concise`].
pub const CONCISE_DIRECTIVE: &str = "Always respond concisely.";

/// The selectable models, keyed by their user-facing label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelChoice {
    /// Claude 3.7 Sonnet, the only choice with extended thinking.
    #[serde(rename = "claude-3.7-sonnet")]
    Claude37Sonnet,
    /// Claude 3.5 Sonnet.
    #[default]
    #[serde(rename = "claude-3.5-sonnet")]
    Claude35Sonnet,
    /// Claude 3.5 Haiku.
    #[serde(rename = "claude-3.5-haiku")]
    Claude35Haiku,
}

impl ModelChoice {
    /// Every selectable model, in menu order.
    pub const ALL: [ModelChoice; 3] = [
        ModelChoice::Claude37Sonnet,
        ModelChoice::Claude35Sonnet,
        ModelChoice::Claude35Haiku,
    ];

    /// User-facing label.
    pub fn label(self) -> &'static str {
        match self {
            ModelChoice::Claude37Sonnet => "claude-3.7-sonnet",
            ModelChoice::Claude35Sonnet => "claude-3.5-sonnet",
            ModelChoice::Claude35Haiku => "claude-3.5-haiku",
        }
    }

    /// Model identifier sent to the API.
    pub fn api_id(self) -> &'static str {
        match self {
            ModelChoice::Claude37Sonnet => "claude-3-7-sonnet-latest",
            ModelChoice::Claude35Sonnet => "claude-3-5-sonnet-latest",
            ModelChoice::Claude35Haiku => "claude-3-5-haiku-latest",
        }
    }

    /// Whether the model accepts an extended-thinking budget.
    pub fn supports_extended_thinking(self) -> bool {
        matches!(self, ModelChoice::Claude37Sonnet)
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ModelChoice {
    type Err = ParleyError;

    fn from_str(s: &str) -> ParleyResult<Self> {
        ModelChoice::ALL
            .into_iter()
            .find(|m| m.label() == s.trim())
            .ok_or_else(|| ParleyError::Config(format!("Unknown model '{s}'")))
    }
}

/// How the assistant is asked to phrase its answers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum ResponseStyle {
    /// No extra directive.
    Normal,
    /// Ask for concise answers.
    #[default]
    Concise,
    /// User-supplied free-text directive.
    Custom(String),
}

impl ResponseStyle {
    /// The directive appended to the base system prompt, if any.
    pub fn directive(&self) -> Option<&str> {
        match self {
            ResponseStyle::Normal => None,
            ResponseStyle::Concise => Some(CONCISE_DIRECTIVE),
            ResponseStyle::Custom(text) => {
                let text = text.trim();
                (!text.is_empty()).then_some(text)
            }
        }
    }

    /// Short name of the style (`normal`, `concise` or `custom`).
    pub fn name(&self) -> &'static str {
        match self {
            ResponseStyle::Normal => "normal",
            ResponseStyle::Concise => "concise",
            ResponseStyle::Custom(_) => "custom",
        }
    }

    /// Builds a style from its name and optional custom text.
    pub fn from_parts(name: &str, custom_text: Option<&str>) -> ParleyResult<Self> {
        match name.trim() {
            "normal" => Ok(ResponseStyle::Normal),
            "concise" => Ok(ResponseStyle::Concise),
            "custom" => Ok(ResponseStyle::Custom(
                custom_text.unwrap_or_default().to_string(),
            )),
            other => Err(ParleyError::Config(format!("Unknown style '{other}'"))),
        }
    }
}
