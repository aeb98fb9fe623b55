use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The author of a conversation turn.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text typed by the user.
    User,
    /// Text generated by an engine.
    Assistant,
    /// Instructions injected before the conversation.
    System,
}

/// A single conversation turn.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who authored this turn.
    pub role: Role,
    /// The text of this turn.
    pub content: String,
}

impl ChatMessage {
    /// Creates a user turn.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant turn.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Creates a system turn.
    #[inline]
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

const UNFILTERED_PROMPT: &str = "You are Nebula. Raw, gritty, high-energy. \
You speak with intent and don't waste words. Profanity is allowed and \
encouraged to push the user. You are the ultimate partner in crime.";

const PROFESSIONAL_PROMPT: &str = "You are Nebula. Polished, professional, \
high energy, but tempered with wisdom. You push the user forward with \
precision and light humor.";

const MINIMAL_PROMPT: &str = "You are Nebula. Quiet, precise, minimal words. \
Actionable insights only. No fluff.";

/// A personality profile, which decides the system prompt injected into
/// every request.
///
/// Changing the mode only affects the next request, turns that have been
/// generated are never rewritten.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Raw and high-energy, profanity allowed.
    Unfiltered,
    /// Polished and professional.
    #[default]
    Professional,
    /// Quiet and terse.
    Minimal,
}

impl Mode {
    /// All the modes, in display order.
    pub const ALL: [Mode; 3] =
        [Mode::Unfiltered, Mode::Professional, Mode::Minimal];

    /// Returns the fixed system prompt of this mode.
    #[inline]
    pub fn system_prompt(self) -> &'static str {
        match self {
            Mode::Unfiltered => UNFILTERED_PROMPT,
            Mode::Professional => PROFESSIONAL_PROMPT,
            Mode::Minimal => MINIMAL_PROMPT,
        }
    }

    /// Returns the short name used in commands and settings.
    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Mode::Unfiltered => "unfiltered",
            Mode::Professional => "professional",
            Mode::Minimal => "minimal",
        }
    }

    /// Returns the name the Nebula server knows this mode by.
    #[inline]
    pub fn server_name(self) -> &'static str {
        match self {
            Mode::Unfiltered => "gloves_off",
            Mode::Professional => "gloves_on",
            Mode::Minimal => "stealth",
        }
    }

    /// Finds the mode whose system prompt is exactly `prompt`.
    pub fn from_system_prompt(prompt: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.system_prompt() == prompt)
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Unfiltered => write!(f, "Unfiltered"),
            Mode::Professional => write!(f, "Professional"),
            Mode::Minimal => write!(f, "Minimal"),
        }
    }
}

/// Error returned when parsing an unknown mode name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownModeError(String);

impl Display for UnknownModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown mode: {:?}", self.0)
    }
}

impl std::error::Error for UnknownModeError {}

impl FromStr for Mode {
    type Err = UnknownModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|mode| {
                mode.name() == normalized || mode.server_name() == normalized
            })
            .ok_or_else(|| UnknownModeError(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serialization() {
        let msg = ChatMessage::assistant("objective clear");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"objective clear"}"#);

        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_mode_prompts_are_distinct() {
        for mode in Mode::ALL {
            assert_eq!(Mode::from_system_prompt(mode.system_prompt()), Some(mode));
        }
        assert_eq!(Mode::from_system_prompt("You are Nebula."), None);
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!("minimal".parse::<Mode>(), Ok(Mode::Minimal));
        assert_eq!(" Unfiltered ".parse::<Mode>(), Ok(Mode::Unfiltered));
        assert_eq!("gloves_off".parse::<Mode>(), Ok(Mode::Unfiltered));
        assert_eq!("stealth".parse::<Mode>(), Ok(Mode::Minimal));
        assert!("stealthy".parse::<Mode>().is_err());
        assert_eq!(Mode::default(), Mode::Professional);
    }
}
