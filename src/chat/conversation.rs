//! Conversation control.
//!
//! This module provides the [`Conversation`] struct which owns the active
//! session, runs exchanges through the completion client and persists history
//! after each one.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::{Completion, CompletionClient};
use crate::config::DEFAULT_TEMPERATURE;
use crate::error::{Error, Result};
use crate::observability::{
    CONVERSATION_BUSY_REJECTIONS, CONVERSATION_RECOVERED_ERRORS, CONVERSATION_TURNS,
};
use crate::registry::{DEFAULT_MODE, ModeRegistry, ModelRegistry};
use crate::session::Session;
use crate::store::SessionStore;
use crate::types::Message;

/// Whether a mutation reached disk.
///
/// Persistence failures never undo the in-memory change; they are reported so
/// the shell can warn about them.
#[derive(Debug, Clone)]
pub enum Persistence {
    /// The session was written to this file.
    Saved(PathBuf),
    /// Writing the session failed.
    Failed(Error),
}

impl Persistence {
    /// The persistence failure, if any.
    pub fn error(&self) -> Option<&Error> {
        match self {
            Persistence::Saved(_) => None,
            Persistence::Failed(err) => Some(err),
        }
    }
}

impl From<Result<PathBuf>> for Persistence {
    fn from(result: Result<PathBuf>) -> Self {
        match result {
            Ok(path) => Persistence::Saved(path),
            Err(err) => Persistence::Failed(err),
        }
    }
}

/// What happened during one exchange.
#[derive(Debug, Clone)]
pub struct TurnReport {
    /// The assistant content recorded for the turn.
    pub reply: String,
    /// Wall-clock time of the exchange.
    pub elapsed: Duration,
    /// The failure folded into `reply`, if the exchange did not succeed.
    pub recovered_error: Option<Error>,
    /// Outcome of persisting the session after the turn.
    pub persistence: Persistence,
}

impl TurnReport {
    fn new(completion: Completion, elapsed: Duration, persistence: Persistence) -> Self {
        Self {
            reply: completion.text,
            elapsed,
            recovered_error: completion.error,
            persistence,
        }
    }
}

/// A snapshot of the active session for display.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// The session identifier.
    pub id: String,
    /// The model used for requests.
    pub model: String,
    /// The active mode.
    pub mode: String,
    /// The number of messages in the history.
    pub message_count: usize,
    /// The sampling temperature.
    pub temperature: f32,
    /// Whether a streamed response is still in flight.
    pub streaming: bool,
    /// The file the session persists to.
    pub path: PathBuf,
}

/// A streaming exchange running in the background.
///
/// Awaiting the handle yields the [`TurnReport`] once the reply has been
/// recorded and persisted.
#[derive(Debug)]
pub struct StreamHandle {
    task: JoinHandle<TurnReport>,
    cancel: CancellationToken,
}

impl StreamHandle {
    /// Asks the exchange to stop; the partial reply is still recorded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns true once the exchange has been recorded.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Future for StreamHandle {
    type Output = Result<TurnReport>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.task)
            .poll(cx)
            .map(|joined| joined.map_err(|e| Error::unknown(format!("stream task failed: {e}"))))
    }
}

/// Holds the single exchange slot; released on drop.
struct ExchangeGuard {
    slot: Arc<AtomicBool>,
}

impl ExchangeGuard {
    fn acquire(slot: &Arc<AtomicBool>) -> Result<Self> {
        if slot
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            CONVERSATION_BUSY_REJECTIONS.click();
            return Err(Error::busy("a response is still streaming"));
        }
        Ok(Self {
            slot: Arc::clone(slot),
        })
    }
}

impl Drop for ExchangeGuard {
    fn drop(&mut self) {
        self.slot.store(false, Ordering::Release);
    }
}

/// The conversation controller.
///
/// Exchanges are serialized: while a streamed reply is outstanding, further
/// exchanges, resets and loads are rejected with [`Error::Busy`].
pub struct Conversation {
    client: CompletionClient,
    store: SessionStore,
    models: ModelRegistry,
    session: Arc<Mutex<Session>>,
    temperature: f32,
    exchange: Arc<AtomicBool>,
    cancel: Option<CancellationToken>,
}

impl Conversation {
    /// Creates a controller around `session`.
    ///
    /// A session whose mode is no longer registered falls back to the default mode.
    pub fn new(client: CompletionClient, store: SessionStore, mut session: Session) -> Self {
        normalize_mode(&client.config().modes, &mut session);
        Self {
            client,
            store,
            models: ModelRegistry::builtin(),
            session: Arc::new(Mutex::new(session)),
            temperature: DEFAULT_TEMPERATURE,
            exchange: Arc::new(AtomicBool::new(false)),
            cancel: None,
        }
    }

    /// Replaces the model registry.
    pub fn with_models(mut self, models: ModelRegistry) -> Self {
        self.models = models;
        self
    }

    /// Sends `text` and waits for the whole reply.
    ///
    /// Transport and parsing failures are recorded as the assistant's reply, so
    /// the only error this returns is [`Error::Busy`].
    pub async fn ask(&mut self, text: &str) -> Result<TurnReport> {
        let _guard = ExchangeGuard::acquire(&self.exchange)?;
        let start = Instant::now();
        let request = {
            let session = lock(&self.session);
            self.client.build_request(&session, text, self.temperature, false)
        };
        let completion = self.client.execute(&request).await;
        let persistence = record(&self.session, &self.store, text, &completion);
        Ok(TurnReport::new(completion, start.elapsed(), persistence))
    }

    /// Sends `text` and streams the reply to `on_chunk` from a background task.
    ///
    /// The turn is recorded when the stream ends, whether it completed, failed
    /// or was cancelled.
    pub fn ask_streaming<F>(&mut self, text: &str, on_chunk: F) -> Result<StreamHandle>
    where
        F: FnMut(&str) + Send + 'static,
    {
        let guard = ExchangeGuard::acquire(&self.exchange)?;
        let request = {
            let session = lock(&self.session);
            self.client.build_request(&session, text, self.temperature, true)
        };
        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());

        let client = self.client.clone();
        let store = self.store.clone();
        let session = Arc::clone(&self.session);
        let user_text = text.to_string();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            let start = Instant::now();
            let completion = client.stream(&request, &token, on_chunk).await;
            let persistence = record(&session, &store, &user_text, &completion);
            TurnReport::new(completion, start.elapsed(), persistence)
        });
        Ok(StreamHandle { task, cancel })
    }

    /// Switches to a registered mode.
    pub fn set_mode(&mut self, name: &str) -> Result<Persistence> {
        let name = name.trim();
        if !self.client.config().modes.contains(name) {
            return Err(Error::validation(
                format!("unknown mode {name:?}"),
                Some("mode".to_string()),
            ));
        }
        let mut session = lock(&self.session);
        session.mode = name.to_string();
        session.touch();
        Ok(self.store.save(&session).into())
    }

    /// Switches model by registry key, `custom <id>`, or bare identifier.
    pub fn set_model(&mut self, key_or_id: &str) -> Result<Persistence> {
        let model = self.models.resolve(key_or_id)?;
        let mut session = lock(&self.session);
        session.model = model;
        session.touch();
        Ok(self.store.save(&session).into())
    }

    /// Sets the sampling temperature for subsequent requests.
    pub fn set_temperature(&mut self, temperature: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&temperature) {
            return Err(Error::validation(
                format!("temperature must be between 0.0 and 1.0, got {temperature}"),
                Some("temperature".to_string()),
            ));
        }
        self.temperature = temperature;
        Ok(())
    }

    /// Starts a new, empty session under a fresh identifier.
    ///
    /// The previous session's file is left as it was.
    pub fn reset(&mut self) -> Result<Persistence> {
        let _guard = ExchangeGuard::acquire(&self.exchange)?;
        let mut session = lock(&self.session);
        session.renew();
        tracing::debug!(id = %session.id, "started new session");
        Ok(self.store.save(&session).into())
    }

    /// Writes the active session to disk.
    pub fn save(&self) -> Result<PathBuf> {
        let session = lock(&self.session);
        self.store.save(&session)
    }

    /// Replaces the active session by the stored session `id`, or the latest one.
    pub fn load(&mut self, id: Option<&str>) -> Result<()> {
        let _guard = ExchangeGuard::acquire(&self.exchange)?;
        let mut loaded = match id {
            Some(id) => self.store.load(id.trim())?,
            None => self.store.try_load_latest()?.ok_or_else(|| {
                Error::validation("no saved sessions to load", Some("id".to_string()))
            })?,
        };
        normalize_mode(&self.client.config().modes, &mut loaded);
        *lock(&self.session) = loaded;
        Ok(())
    }

    /// The last `last_n` history entries, or the whole history.
    pub fn history_window(&self, last_n: Option<usize>) -> Vec<Message> {
        let session = lock(&self.session);
        let last_n = last_n.unwrap_or(session.history().len());
        session.window(last_n).to_vec()
    }

    /// Returns the current session snapshot.
    pub fn info(&self) -> SessionInfo {
        let session = lock(&self.session);
        SessionInfo {
            id: session.id.clone(),
            model: session.model.clone(),
            mode: session.mode.clone(),
            message_count: session.history().len(),
            temperature: self.temperature,
            streaming: self.is_busy(),
            path: self.store.path_for(&session.id),
        }
    }

    pub fn model(&self) -> String {
        lock(&self.session).model.clone()
    }

    pub fn mode(&self) -> String {
        lock(&self.session).mode.clone()
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn modes(&self) -> &ModeRegistry {
        &self.client.config().modes
    }

    /// Returns true while a streamed reply is outstanding.
    pub fn is_busy(&self) -> bool {
        self.exchange.load(Ordering::Acquire)
    }

    /// Cancels the outstanding stream, if any.
    pub fn cancel_stream(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}

impl Drop for Conversation {
    fn drop(&mut self) {
        self.cancel_stream();
    }
}

fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

fn normalize_mode(modes: &ModeRegistry, session: &mut Session) {
    if !modes.contains(&session.mode) {
        tracing::warn!(mode = %session.mode, "unknown mode; using {DEFAULT_MODE}");
        session.mode = DEFAULT_MODE.to_string();
    }
}

/// Appends the turn and persists under the session lock, so writes never interleave.
fn record(
    session: &Mutex<Session>,
    store: &SessionStore,
    user_text: &str,
    completion: &Completion,
) -> Persistence {
    CONVERSATION_TURNS.click();
    if completion.is_recovered() {
        CONVERSATION_RECOVERED_ERRORS.click();
    }
    let mut session = lock(session);
    session.record_turn(user_text, completion.text.as_str());
    store.save(&session).into()
}
