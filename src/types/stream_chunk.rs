use serde::Deserialize;

/// One decoded `data:` frame of a streaming `chat/completions` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StreamChunk {
    /// Incremental choices; the client reads the first.
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

/// An incremental choice within a [`StreamChunk`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StreamChoice {
    /// The content delta for this frame.
    #[serde(default)]
    pub delta: Delta,
}

/// Content delta carried by a [`StreamChoice`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Delta {
    /// Text appended by this frame, if any.
    #[serde(default)]
    pub content: Option<String>,
}

impl StreamChunk {
    /// Returns the first choice's non-empty content delta.
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
            .filter(|content| !content.is_empty())
    }

    /// Consumes the chunk, returning the first choice's non-empty content delta.
    pub fn into_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
    }
}
