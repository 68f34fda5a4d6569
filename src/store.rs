//! On-disk session persistence.
//!
//! Each session lives in its own pretty-printed JSON file named
//! `session_<id>.json` inside the store directory.  Because identifiers are
//! timestamp-derived, the lexicographically last file is the most recent
//! session.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{from_reader, to_writer_pretty};
use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::observability::{
    SESSION_LOAD_ERRORS, SESSION_LOADS, SESSION_SAVE_ERRORS, SESSION_SAVES,
};
use crate::registry::{DEFAULT_MODE, DEFAULT_MODEL};
use crate::session::Session;
use crate::types::Message;

const FILE_PREFIX: &str = "session_";
const FILE_SUFFIX: &str = ".json";

/// Serialized form of a session.
#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    model: String,
    #[serde(default)]
    mode: String,
    #[serde(default)]
    history: Vec<Message>,
    #[serde(with = "crate::utils::time", default = "OffsetDateTime::now_utc")]
    timestamp: OffsetDateTime,
}

impl SessionFile {
    fn new(session: &Session) -> Self {
        Self {
            model: session.model.clone(),
            mode: session.mode.clone(),
            history: session.history().to_vec(),
            timestamp: session.last_modified,
        }
    }

    fn into_session(self, id: &str) -> Session {
        let model = if self.model.is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            self.model
        };
        let mode = if self.mode.is_empty() {
            DEFAULT_MODE.to_string()
        } else {
            self.mode
        };
        Session::from_parts(id, model, mode, self.history, self.timestamp)
    }
}

/// Directory-backed store of session files.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Creates a store rooted at `dir`.  The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory holding session files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file a session with identifier `id` is persisted to.
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{id}{FILE_SUFFIX}"))
    }

    /// Writes `session` to its file, replacing any previous contents.
    ///
    /// The file is written next to its destination and renamed into place.
    pub fn save(&self, session: &Session) -> Result<PathBuf> {
        let result = self.write(session);
        match &result {
            Ok(path) => {
                SESSION_SAVES.click();
                tracing::debug!(
                    path = %path.display(),
                    messages = session.history().len(),
                    "session saved"
                );
            }
            Err(err) => {
                SESSION_SAVE_ERRORS.click();
                tracing::warn!(id = %session.id, error = %err, "failed to save session");
            }
        }
        result
    }

    fn write(&self, session: &Session) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .map_err(|err| Error::io("failed to create sessions directory", err))?;
        let path = self.path_for(&session.id);
        let tmp_path = path.with_extension("json.tmp");
        let file = File::create(&tmp_path)
            .map_err(|err| Error::io("failed to create session file", err))?;
        let mut writer = BufWriter::new(file);
        to_writer_pretty(&mut writer, &SessionFile::new(session)).map_err(|err| {
            Error::serialization("failed to serialize session", Some(Box::new(err)))
        })?;
        writer
            .flush()
            .map_err(|err| Error::io("failed to write session file", err))?;
        drop(writer);
        fs::rename(&tmp_path, &path)
            .map_err(|err| Error::io("failed to move session file into place", err))?;
        Ok(path)
    }

    /// Reads the session stored under `id`.
    pub fn load(&self, id: &str) -> Result<Session> {
        let path = self.path_for(id);
        let file = File::open(&path)
            .map_err(|err| Error::io(format!("failed to open {}", path.display()), err))?;
        let reader = BufReader::new(file);
        let stored: SessionFile = from_reader(reader).map_err(|err| {
            Error::serialization(
                format!("failed to parse {}", path.display()),
                Some(Box::new(err)),
            )
        })?;
        SESSION_LOADS.click();
        Ok(stored.into_session(id))
    }

    /// Identifiers of all stored sessions in ascending (oldest first) order.
    ///
    /// A missing directory holds no sessions.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(Error::io("failed to read sessions directory", err)),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| Error::io("failed to read sessions directory", err))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(id) = session_id_from_file_name(name) {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Loads the most recent session, propagating any failure.
    pub fn try_load_latest(&self) -> Result<Option<Session>> {
        match self.list()?.pop() {
            Some(id) => self.load(&id).map(Some),
            None => Ok(None),
        }
    }

    /// Loads the most recent session for a warm start.
    ///
    /// Failures are logged and counted, never propagated: an unreadable store
    /// simply means starting fresh.
    pub fn load_latest(&self) -> Option<Session> {
        match self.try_load_latest() {
            Ok(session) => session,
            Err(err) => {
                SESSION_LOAD_ERRORS.click();
                tracing::warn!(
                    dir = %self.dir.display(),
                    error = %err,
                    "could not load latest session"
                );
                None
            }
        }
    }
}

fn session_id_from_file_name(name: &str) -> Option<&str> {
    name.strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_map_to_ids() {
        assert_eq!(
            session_id_from_file_name("session_20240101_120000_000.json"),
            Some("20240101_120000_000")
        );
        assert_eq!(
            session_id_from_file_name("session_20240101_120000.json"),
            Some("20240101_120000")
        );
        assert_eq!(session_id_from_file_name("session_x.json.tmp"), None);
        assert_eq!(session_id_from_file_name("notes.json"), None);
        assert_eq!(session_id_from_file_name("session_.json"), None);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sessions"));
        let mut session = Session::new("openai/gpt-4", "coder");
        session.record_turn("hello", "hi there");

        let path = store.save(&session).unwrap();
        assert_eq!(path, store.path_for(&session.id));
        assert!(path.exists());

        let loaded = store.load(&session.id).unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.model, "openai/gpt-4");
        assert_eq!(loaded.mode, "coder");
        assert_eq!(loaded.history(), session.history());
    }

    #[test]
    fn saved_file_has_the_documented_shape() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let mut session = Session::new("m", "general");
        session.record_turn("q", "a");
        let path = store.save(&session).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        let object = value.as_object().unwrap();
        let keys: Vec<&str> = object.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["model", "mode", "history", "timestamp"]);
        assert_eq!(value["history"][0]["role"], "user");
        assert_eq!(value["history"][1]["content"], "a");
    }

    #[test]
    fn save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let mut session = Session::new("m", "general");
        store.save(&session).unwrap();
        session.record_turn("q", "a");
        store.save(&session).unwrap();
        assert_eq!(store.list().unwrap(), vec![session.id.clone()]);
        assert_eq!(store.load(&session.id).unwrap().history().len(), 2);
    }

    #[test]
    fn missing_directory_has_no_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("absent"));
        assert!(store.list().unwrap().is_empty());
        assert!(store.try_load_latest().unwrap().is_none());
        assert!(store.load_latest().is_none());
    }

    #[test]
    fn corrupt_latest_is_swallowed_by_load_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        fs::write(store.path_for("20240101_000000_000"), "{not json").unwrap();
        assert!(store.try_load_latest().is_err());
        assert!(store.load_latest().is_none());
    }

    #[test]
    fn legacy_file_loads_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        fs::write(
            dir.path().join("session_20240101_120000.json"),
            r#"{"history":[{"role":"user","content":"q"},{"role":"assistant","content":"a"}],"timestamp":"2024-01-01T12:00:00.123456"}"#,
        )
        .unwrap();
        let session = store.load_latest().unwrap();
        assert_eq!(session.id, "20240101_120000");
        assert_eq!(session.model, DEFAULT_MODEL);
        assert_eq!(session.mode, DEFAULT_MODE);
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn unrelated_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        fs::write(dir.path().join("zzz.json"), "{}").unwrap();
        fs::write(dir.path().join("session_zzz.json.tmp"), "{}").unwrap();
        assert!(store.load_latest().is_none());
    }
}
