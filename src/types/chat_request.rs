use serde::{Deserialize, Serialize};

use crate::types::Message;

/// Request body for an OpenAI-compatible `chat/completions` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Provider model identifier.
    pub model: String,

    /// System prompt, windowed history and the new user turn, in order.
    pub messages: Vec<Message>,

    /// Sampling temperature.
    pub temperature: f32,

    /// Cap on generated tokens.
    pub max_tokens: u32,

    /// Whether the endpoint should answer with a stream of delta frames.
    pub stream: bool,
}

impl ChatRequest {
    /// Returns the number of messages carried by the request.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Returns the trailing user message, which is the turn being asked.
    pub fn user_text(&self) -> Option<&str> {
        self.messages.last().map(|m| m.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn request_wire_shape() {
        let request = ChatRequest {
            model: "openai/gpt-4".to_string(),
            messages: vec![Message::system("Be brief."), Message::user("Hi")],
            temperature: 0.5,
            max_tokens: 4000,
            stream: false,
        };
        assert_eq!(
            to_value(&request).unwrap(),
            json!({
                "model": "openai/gpt-4",
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": "Hi"}
                ],
                "temperature": 0.5,
                "max_tokens": 4000,
                "stream": false
            })
        );
        assert_eq!(request.message_count(), 2);
        assert_eq!(request.user_text(), Some("Hi"));
    }
}
