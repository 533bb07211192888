//! Diagnostic log that survives player crashes.
//!
//! Lines are kept oldest first and capped; the whole list is written to the
//! key-value store on every change.

use crate::error::{MediaError, Result};
use crate::kv::KeyValueStore;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::warn;

pub const LOG_KEY: &str = "debug_logs";
pub const MAX_LOG_ENTRIES: usize = 500;

const EMPTY_TEXT: &str = "No logs available.\n\nPlay a video and perform actions to generate logs.";

pub struct PlayerLog {
    cap: usize,
    lines: Mutex<Vec<String>>,
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for PlayerLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerLog")
            .field("cap", &self.cap)
            .finish_non_exhaustive()
    }
}

impl PlayerLog {
    pub fn open(store: Arc<dyn KeyValueStore>, cap: usize) -> Self {
        let mut lines = match store.get(LOG_KEY) {
            Some(raw) => serde_json::from_str::<Vec<String>>(&raw).unwrap_or_else(|err| {
                warn!(error = %err, "discarding unreadable player log");
                Vec::new()
            }),
            None => Vec::new(),
        };
        keep_newest(&mut lines, cap);
        Self {
            cap,
            lines: Mutex::new(lines),
            store,
        }
    }

    pub fn add(&self, message: &str) -> Result<()> {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        self.add_at(message, now)
    }

    pub fn add_at(&self, message: &str, at: OffsetDateTime) -> Result<()> {
        let mut lines = self.lock();
        let mut next = lines.clone();
        next.push(format!("[{}] {message}", clock_stamp(at)));
        keep_newest(&mut next, self.cap);

        let json = serde_json::to_string(&next)
            .map_err(|err| MediaError::persistence(err.to_string()))?;
        self.store.put(LOG_KEY, json)?;
        *lines = next;
        Ok(())
    }

    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn clear(&self) -> Result<()> {
        let mut lines = self.lock();
        self.store.remove(LOG_KEY)?;
        lines.clear();
        Ok(())
    }

    /// Log text with a short header, or a hint when nothing was logged.
    pub fn formatted(&self) -> String {
        let lines = self.lock();
        if lines.is_empty() {
            return EMPTY_TEXT.to_string();
        }
        let mut out = String::from("=== PLAYER LOGS ===\n");
        out.push_str(&format!("Total entries: {}\n", lines.len()));
        out.push_str("===================\n\n");
        out.push_str(&lines.join("\n"));
        out
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn keep_newest(lines: &mut Vec<String>, cap: usize) {
    if lines.len() > cap {
        let drop_count = lines.len() - cap;
        lines.drain(0..drop_count);
    }
}

fn clock_stamp(at: OffsetDateTime) -> String {
    at.format(format_description!(
        "[hour]:[minute]:[second].[subsecond digits:3]"
    ))
    .unwrap_or_else(|_| String::from("--:--:--.---"))
}
