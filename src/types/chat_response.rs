use serde::Deserialize;

use crate::error::{Error, Result};

/// Non-streaming response body of a `chat/completions` call.
///
/// Only the fields the client reads are modelled; everything else the
/// provider sends (usage, ids, provider metadata) is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatResponse {
    /// Generated choices; the client reads the first.
    pub choices: Vec<Choice>,
}

/// A single generated choice.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Choice {
    /// The generated message.
    pub message: ChoiceMessage,
}

/// Message carried by a [`Choice`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChoiceMessage {
    /// Text content; providers send `null` for tool-only replies.
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// Extracts the first choice's message content.
    pub fn into_content(self) -> Result<String> {
        let choice = self.choices.into_iter().next().ok_or_else(|| {
            Error::serialization("response contained no choices", None)
        })?;
        choice.message.content.ok_or_else(|| {
            Error::serialization("first choice carried no message content", None)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_choice_content_is_extracted() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"id":"gen-1","choices":[{"message":{"role":"assistant","content":"Hello"}},{"message":{"content":"ignored"}}],"usage":{"total_tokens":3}}"#,
        )
        .unwrap();
        assert_eq!(response.into_content().unwrap(), "Hello");
    }

    #[test]
    fn empty_choices_is_a_parsing_error() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        let err = response.into_content().unwrap_err();
        assert!(err.is_malformed_response());
    }

    #[test]
    fn null_content_is_a_parsing_error() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(response.into_content().is_err());
    }

    #[test]
    fn missing_choices_fails_to_parse() {
        assert!(serde_json::from_str::<ChatResponse>(r#"{"error":"nope"}"#).is_err());
    }
}
