//! The active conversation session.
//!
//! A [`Session`] is the unit of persisted conversation state: identifier,
//! model, mode and history.  History is append-only and grows one turn (a
//! user message followed by its assistant message) at a time.

use time::macros::format_description;
use time::format_description::FormatItem;
use time::{Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::types::Message;

/// Number of trailing history entries submitted with each request.
pub const HISTORY_WINDOW: usize = 10;

const SESSION_ID_FORMAT: &[FormatItem<'static>] = format_description!(
    "[year][month][day]_[hour][minute][second]_[subsecond digits:3]"
);

/// Conversation state for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Timestamp-derived identifier; sorts in creation order.
    pub id: String,
    /// Provider model identifier.
    pub model: String,
    /// Active mode name.
    pub mode: String,
    history: Vec<Message>,
    /// When the session was last mutated.
    pub last_modified: OffsetDateTime,
}

impl Session {
    /// Creates an empty session with a fresh identifier.
    pub fn new(model: impl Into<String>, mode: impl Into<String>) -> Self {
        Self::with_id(fresh_session_id(None), model, mode)
    }

    /// Creates an empty session under an explicit identifier.
    pub fn with_id(
        id: impl Into<String>,
        model: impl Into<String>,
        mode: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            mode: mode.into(),
            history: Vec::new(),
            last_modified: OffsetDateTime::now_utc(),
        }
    }

    /// Reassembles a session read back from storage.
    pub fn from_parts(
        id: impl Into<String>,
        model: impl Into<String>,
        mode: impl Into<String>,
        history: Vec<Message>,
        last_modified: OffsetDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            mode: mode.into(),
            history,
            last_modified,
        }
    }

    /// The full history in chronological order.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// The last `last_n` history entries (fewer if the history is shorter).
    pub fn window(&self, last_n: usize) -> &[Message] {
        let start = self.history.len().saturating_sub(last_n);
        &self.history[start..]
    }

    /// Appends one turn: the user message immediately followed by the assistant reply.
    pub fn record_turn(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.history.reserve(2);
        self.history.push(Message::user(user));
        self.history.push(Message::assistant(assistant));
        self.touch();
    }

    /// Supersedes this session with an empty one under a new, strictly greater identifier.
    ///
    /// Model and mode carry over.
    pub fn renew(&mut self) {
        self.id = fresh_session_id(Some(&self.id));
        self.history.clear();
        self.touch();
    }

    /// Marks the session as modified now.
    pub fn touch(&mut self) {
        self.last_modified = OffsetDateTime::now_utc();
    }
}

/// Generates a session identifier from the current UTC time.
///
/// The identifier is strictly greater than `previous` (when given), even if the
/// clock has not advanced or has gone backwards, so that "most recent" and
/// "lexicographically last" stay the same thing.
pub fn fresh_session_id(previous: Option<&str>) -> String {
    let candidate = format_session_id(OffsetDateTime::now_utc());
    let Some(previous) = previous else {
        return candidate;
    };
    if candidate.as_str() > previous {
        return candidate;
    }
    match parse_session_id(previous) {
        Some(at) => format_session_id(at + Duration::milliseconds(1)),
        None => format!("{previous}_1"),
    }
}

/// Formats an instant as a session identifier (`YYYYMMDD_HHMMSS_mmm`, UTC).
pub fn format_session_id(at: OffsetDateTime) -> String {
    let at = at.to_offset(UtcOffset::UTC);
    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}_{:03}",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second(),
        at.millisecond()
    )
}

/// Parses a session identifier back into the instant it encodes.
pub fn parse_session_id(id: &str) -> Option<OffsetDateTime> {
    PrimitiveDateTime::parse(id, SESSION_ID_FORMAT)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}
