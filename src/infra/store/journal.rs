//! File-backed store backend using JSON lines.
//!
//! Every commit appends the full record. On load the last line for each
//! order or subscriber wins; [`JournalBackend::compact`] rewrites the file
//! with only those latest versions.

use std::collections::BTreeMap;
use std::fs::{create_dir_all, rename, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::{EngineError, EngineResult, LoadedState, Session, StoreBackend, Subscriber};

fn backend_err(e: impl std::fmt::Display) -> EngineError {
    EngineError::Backend(e.to_string())
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum JournalRecord {
    Session(Session),
    Subscriber(Subscriber),
}

/// Append-only JSONL journal.
#[derive(Debug)]
pub struct JournalBackend {
    path: PathBuf,
    writer: Mutex<()>,
}

impl JournalBackend {
    /// Open (or create) the journal at `path`.
    pub fn new(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent).map_err(backend_err)?;
        }
        Ok(Self {
            path,
            writer: Mutex::new(()),
        })
    }

    /// Journal file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, record: &JournalRecord) -> EngineResult<()> {
        let line = serde_json::to_string(record).map_err(backend_err)?;
        let _guard = self.writer.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(backend_err)?;
        writeln!(file, "{line}").map_err(backend_err)
    }

    fn read_latest(&self) -> EngineResult<LoadedState> {
        if !self.path.exists() {
            return Ok(LoadedState::default());
        }
        let file = File::open(&self.path).map_err(backend_err)?;
        let mut sessions = BTreeMap::new();
        let mut subscribers = BTreeMap::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(backend_err)?;
            if line.trim().is_empty() {
                continue;
            }
            let record: JournalRecord = serde_json::from_str(&line)
                .map_err(|e| EngineError::Backend(format!("{}:{}: {e}", self.path.display(), n + 1)))?;
            match record {
                JournalRecord::Session(s) => {
                    sessions.insert(s.order_id, s);
                }
                JournalRecord::Subscriber(s) => {
                    subscribers.insert(s.id, s);
                }
            }
        }
        Ok(LoadedState {
            sessions: sessions.into_values().collect(),
            subscribers: subscribers.into_values().collect(),
        })
    }

    /// Rewrite the journal keeping only the latest version of each record.
    /// Returns the number of records kept.
    pub fn compact(&self) -> EngineResult<usize> {
        let _guard = self.writer.lock();
        let state = self.read_latest()?;
        let tmp = self.path.with_extension("jsonl.tmp");
        {
            let mut out = BufWriter::new(File::create(&tmp).map_err(backend_err)?);
            for s in &state.subscribers {
                let line = serde_json::to_string(&JournalRecord::Subscriber(s.clone())).map_err(backend_err)?;
                writeln!(out, "{line}").map_err(backend_err)?;
            }
            for s in &state.sessions {
                let line = serde_json::to_string(&JournalRecord::Session(s.clone())).map_err(backend_err)?;
                writeln!(out, "{line}").map_err(backend_err)?;
            }
            out.flush().map_err(backend_err)?;
        }
        rename(&tmp, &self.path).map_err(backend_err)?;
        let kept = state.sessions.len() + state.subscribers.len();
        tracing::info!(path = %self.path.display(), records = kept, "journal compacted");
        Ok(kept)
    }
}

impl StoreBackend for JournalBackend {
    fn load(&self) -> EngineResult<LoadedState> {
        let _guard = self.writer.lock();
        self.read_latest()
    }

    fn persist_session(&self, session: &Session) -> EngineResult<()> {
        self.append(&JournalRecord::Session(session.clone()))
    }

    fn persist_subscriber(&self, subscriber: &Subscriber) -> EngineResult<()> {
        self.append(&JournalRecord::Subscriber(subscriber.clone()))
    }
}
