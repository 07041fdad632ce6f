// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Call log and contacts using SQLite.

use anyhow::Result;
use chrono::{DateTime, Local, TimeZone};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::telephony::{NumberLabel, PhonebookEntry, PhonebookKind, PhonebookSource};

/// Direction of a logged call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallLogKind {
    Outgoing,
    Incoming,
    Missed,
}

impl CallLogKind {
    fn as_str(&self) -> &'static str {
        match self {
            CallLogKind::Outgoing => "OUTGOING",
            CallLogKind::Incoming => "INCOMING",
            CallLogKind::Missed => "MISSED",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "OUTGOING" => CallLogKind::Outgoing,
            "MISSED" => CallLogKind::Missed,
            _ => CallLogKind::Incoming,
        }
    }

    fn for_book(kind: PhonebookKind) -> Option<Self> {
        match kind {
            PhonebookKind::Dialed => Some(CallLogKind::Outgoing),
            PhonebookKind::Received => Some(CallLogKind::Incoming),
            PhonebookKind::Missed => Some(CallLogKind::Missed),
            PhonebookKind::Saved => None,
        }
    }
}

/// A single call log row.
#[derive(Debug, Clone)]
pub struct CallLogEntry {
    pub id: i64,
    pub timestamp: DateTime<Local>,
    pub kind: CallLogKind,
    pub number: String,
}

/// Phonebook database.
#[derive(Clone)]
pub struct PhonebookStore {
    conn: Arc<Mutex<Connection>>,
    call_log_limit: u32,
}

impl PhonebookStore {
    /// Create or open the phonebook database in `data_dir`.
    pub fn open(data_dir: &Path, call_log_limit: usize) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("phonebook.db");
        info!("Opening phonebook database: {:?}", db_path);

        Self::init(Connection::open(&db_path)?, call_log_limit)
    }

    /// A throwaway database.
    pub fn in_memory(call_log_limit: usize) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, call_log_limit)
    }

    fn init(conn: Connection, call_log_limit: usize) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS call_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                kind TEXT NOT NULL,
                number TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_call_log_timestamp ON call_log(timestamp DESC)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS contacts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                number TEXT NOT NULL,
                label TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            call_log_limit: u32::try_from(call_log_limit).unwrap_or(u32::MAX),
        })
    }

    /// Log a call.
    pub fn record_call(&self, number: &str, kind: CallLogKind) -> Result<()> {
        let conn = self.conn.lock();
        let timestamp = Local::now().timestamp_millis();

        conn.execute(
            "INSERT INTO call_log (timestamp, kind, number) VALUES (?1, ?2, ?3)",
            params![timestamp, kind.as_str(), number],
        )?;
        debug!("Logged {} call {}", kind.as_str(), number);

        Ok(())
    }

    /// Save a contact number.
    pub fn add_contact(&self, name: &str, number: &str, label: NumberLabel) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO contacts (name, number, label) VALUES (?1, ?2, ?3)",
            params![name, number, label.as_str()],
        )?;
        Ok(())
    }

    /// Most recent calls of every kind.
    pub fn recent_calls(&self, limit: u32) -> Result<Vec<CallLogEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, kind, number
             FROM call_log
             ORDER BY timestamp DESC, id DESC
             LIMIT ?1",
        )?;

        let entries = stmt
            .query_map([limit], |row| {
                let millis: i64 = row.get(1)?;
                let kind: String = row.get(2)?;

                Ok(CallLogEntry {
                    id: row.get(0)?,
                    timestamp: Local
                        .timestamp_millis_opt(millis)
                        .single()
                        .unwrap_or_else(Local::now),
                    kind: CallLogKind::from_str(&kind),
                    number: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn call_log(&self, kind: CallLogKind) -> Result<Vec<PhonebookEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT l.number,
                    (SELECT c.name FROM contacts c WHERE c.number = l.number ORDER BY c.id LIMIT 1),
                    (SELECT c.label FROM contacts c WHERE c.number = l.number ORDER BY c.id LIMIT 1)
             FROM call_log l
             WHERE l.kind = ?1
             ORDER BY l.timestamp DESC, l.id DESC
             LIMIT ?2",
        )?;

        let entries = stmt
            .query_map(params![kind.as_str(), self.call_log_limit], |row| {
                let label: Option<String> = row.get(2)?;
                Ok(PhonebookEntry {
                    number: row.get(0)?,
                    name: row.get(1)?,
                    label: label.as_deref().map(NumberLabel::from_str),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn contacts(&self) -> Result<Vec<PhonebookEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT number, name, label FROM contacts ORDER BY name COLLATE NOCASE, id",
        )?;

        let entries = stmt
            .query_map([], |row| {
                let label: String = row.get(2)?;
                Ok(PhonebookEntry {
                    number: row.get(0)?,
                    name: Some(row.get(1)?),
                    label: Some(NumberLabel::from_str(&label)),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Clear the call log.
    pub fn clear_call_log(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM call_log", [])?;
        info!("Call log cleared");
        Ok(())
    }
}

impl PhonebookSource for PhonebookStore {
    fn entries(&self, kind: PhonebookKind) -> Result<Vec<PhonebookEntry>> {
        match CallLogKind::for_book(kind) {
            Some(log) => self.call_log(log),
            None => self.contacts(),
        }
    }

    fn last_dialed(&self) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let number: Option<String> = conn
            .query_row(
                "SELECT number FROM call_log WHERE kind = ?1
                 ORDER BY timestamp DESC, id DESC LIMIT 1",
                [CallLogKind::Outgoing.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(number)
    }
}
