use nebula_model::{ChatMessage, Mode, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The text used when the server answers without a usable `text` field.
pub const FALLBACK_TEXT: &str = "Nebula is thinking... but hit a snag.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProxyRequest {
    pub prompt: String,
    pub user_id: String,
    pub mode: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct ProxyReply {
    text: Option<Value>,
}

/// Builds the request from the latest user turn and the mode carried by the
/// injected system turn.
///
/// Returns `None` if there is no user turn at all.
pub fn create_request(
    conversation: &[ChatMessage],
    user_id: &str,
) -> Option<ProxyRequest> {
    let prompt = conversation
        .iter()
        .rev()
        .find(|msg| msg.role == Role::User)?;
    let mode = conversation
        .first()
        .filter(|msg| msg.role == Role::System)
        .map(|msg| extract_mode(&msg.content))
        .unwrap_or_else(|| Mode::default().server_name().to_owned());
    Some(ProxyRequest {
        prompt: prompt.content.clone(),
        user_id: user_id.to_owned(),
        mode,
    })
}

/// Extracts the server mode name from the first `|`-delimited segment of a
/// system turn.
///
/// A registered prompt maps to its mode's server name, anything else is
/// normalized and passed through.
pub fn extract_mode(system: &str) -> String {
    let segment = system.split('|').next().unwrap_or_default().trim();
    if let Some(mode) = Mode::from_system_prompt(segment) {
        return mode.server_name().to_owned();
    }
    segment.to_lowercase().replace(' ', "_")
}

/// Turns a response body into the chunks of the simulated stream.
///
/// Every word of the reply text is followed by a single space. When the
/// reply has no usable `text` (missing, blank, not a string, or the body is
/// not JSON at all), [`FALLBACK_TEXT`] is delivered verbatim as the only
/// chunk.
pub fn reply_chunks(body: &[u8]) -> Vec<String> {
    let reply = match serde_json::from_slice::<ProxyReply>(body) {
        Ok(reply) => reply,
        Err(err) => {
            warn!("unreadable reply from server: {err}");
            ProxyReply::default()
        }
    };
    match reply.text {
        Some(Value::String(text)) if !text.trim().is_empty() => text
            .split_whitespace()
            .map(|word| format!("{word} "))
            .collect(),
        other => {
            debug!("no usable text in reply: {other:?}");
            vec![FALLBACK_TEXT.to_owned()]
        }
    }
}
