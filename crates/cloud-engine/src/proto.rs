use nebula_model::{ChatMessage, Role};
use serde::{Deserialize, Serialize};

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamChunk {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub error: Option<ApiError>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
}

impl StreamChunk {
    /// Concatenates the text parts of the first candidate.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }
}

// --------------------------------
// Types sent to (and from) the server
// --------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GenerateContentRequest {
    contents: Vec<Content>,
}

// -----------
// Conversions
// -----------

/// Converts the conversation into a streaming request. All turns but the
/// last one become the chat history, and the last turn is sent as the new
/// prompt.
///
/// Returns `None` if the conversation is empty.
pub fn create_request(
    conversation: &[ChatMessage],
) -> Option<GenerateContentRequest> {
    let (prompt, history) = conversation.split_last()?;
    let mut contents: Vec<_> = history.iter().map(create_content).collect();
    contents.push(Content {
        role: "user",
        parts: vec![Part {
            text: Some(prompt.content.clone()),
        }],
    });
    Some(GenerateContentRequest { contents })
}

#[inline]
fn create_content(msg: &ChatMessage) -> Content {
    let role = match msg.role {
        Role::Assistant => "model",
        Role::User | Role::System => "user",
    };
    Content {
        role,
        parts: vec![Part {
            text: Some(msg.content.clone()),
        }],
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_create_request() {
        let conversation = [
            ChatMessage::system("You are Nebula."),
            ChatMessage::user("Hello"),
            ChatMessage::assistant("Hi."),
            ChatMessage::user("Status?"),
        ];
        let request = create_request(&conversation).unwrap();
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "contents": [
                    { "role": "user", "parts": [{ "text": "You are Nebula." }] },
                    { "role": "user", "parts": [{ "text": "Hello" }] },
                    { "role": "model", "parts": [{ "text": "Hi." }] },
                    { "role": "user", "parts": [{ "text": "Status?" }] },
                ]
            })
        );

        assert_eq!(create_request(&[]), None);
    }

    #[test]
    fn test_chunk_text() {
        let chunk: StreamChunk = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "text": "objective " }, { "text": "clear" }]
                },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(chunk.text(), "objective clear");
        assert_eq!(chunk.candidates[0].finish_reason.as_deref(), Some("STOP"));

        let chunk: StreamChunk = serde_json::from_value(json!({
            "error": { "code": 400, "message": "API key not valid" }
        }))
        .unwrap();
        assert_eq!(chunk.text(), "");
        assert_eq!(chunk.error.unwrap().code, Some(400));
    }
}
