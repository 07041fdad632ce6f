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

//! Phonebook access for `+CPBS`/`+CPBR` and memory dialing.

use std::sync::Arc;

use tracing::{debug, error};

use crate::error::CmeError;
use crate::telephony::{number_type, PhonebookEntry, PhonebookKind, PhonebookSource};

pub const MAX_NUMBER_LEN: usize = 30;
pub const MAX_NAME_LEN: usize = 28;

/// Advertised capacity of a book when it holds fewer entries.
pub const NOMINAL_CAPACITY: usize = 100;

/// Render one `+CPBR` line.
pub fn format_entry(index: usize, entry: &PhonebookEntry) -> String {
    let number: String = entry.number.chars().take(MAX_NUMBER_LEN).collect();
    let mut name: String = entry
        .name
        .as_deref()
        .unwrap_or("")
        .chars()
        .take(MAX_NAME_LEN)
        .collect();
    if let (false, Some(label)) = (name.is_empty(), entry.label) {
        name.push('/');
        name.push(label.code());
    }
    format!(
        "+CPBR: {},\"{}\",{},\"{}\"",
        index,
        number,
        number_type(&entry.number),
        name
    )
}

/// The selected book and its last query result.
///
/// Entries are fetched when first needed and kept until the selection
/// changes or [`Phonebook::requery`] is called, so a paged `+CPBR` read
/// sees one consistent result set.
pub struct Phonebook {
    source: Arc<dyn PhonebookSource>,
    selected: PhonebookKind,
    entries: Option<Vec<PhonebookEntry>>,
}

impl Phonebook {
    pub fn new(source: Arc<dyn PhonebookSource>) -> Self {
        Self {
            source,
            selected: PhonebookKind::Saved,
            entries: None,
        }
    }

    pub fn selected(&self) -> PhonebookKind {
        self.selected
    }

    pub fn select(&mut self, kind: PhonebookKind) -> Result<(), CmeError> {
        self.selected = kind;
        self.requery()
    }

    pub fn requery(&mut self) -> Result<(), CmeError> {
        self.entries = None;
        self.load().map(|_| ())
    }

    pub fn size(&mut self) -> Result<usize, CmeError> {
        self.load().map(|entries| entries.len())
    }

    /// Entry at a 1-based index.
    pub fn entry_at(&mut self, index: usize) -> Result<PhonebookEntry, CmeError> {
        let entries = self.load()?;
        index
            .checked_sub(1)
            .and_then(|i| entries.get(i))
            .cloned()
            .ok_or(CmeError::InvalidIndex)
    }

    /// `+CPBR` lines for the 1-based range `first..=last`.
    ///
    /// `last` is clamped to the book size.
    pub fn read(&mut self, first: usize, last: usize) -> Result<Vec<String>, CmeError> {
        let entries = self.load()?;
        if first < 1 || last < first || first > entries.len() {
            return Err(CmeError::InvalidIndex);
        }
        let last = last.min(entries.len());
        Ok((first..=last)
            .map(|i| format_entry(i, &entries[i - 1]))
            .collect())
    }

    pub fn last_dialed(&self) -> Result<Option<String>, CmeError> {
        self.source.last_dialed().map_err(|e| {
            error!("Failed to look up last dialed number: {}", e);
            CmeError::SimFailure
        })
    }

    /// Drop the selection and cached entries.
    pub fn reset(&mut self) {
        self.selected = PhonebookKind::Saved;
        self.entries = None;
    }

    fn load(&mut self) -> Result<&Vec<PhonebookEntry>, CmeError> {
        if self.entries.is_none() {
            let entries = self.source.entries(self.selected).map_err(|e| {
                error!("Phonebook query for {} failed: {}", self.selected.code(), e);
                CmeError::SimFailure
            })?;
            debug!("Loaded {} entries from {}", entries.len(), self.selected.code());
            self.entries = Some(entries);
        }
        self.entries.as_ref().ok_or(CmeError::PhoneFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telephony::NumberLabel;
    use parking_lot::Mutex;

    struct FakeSource {
        saved: Mutex<Vec<PhonebookEntry>>,
        queries: Mutex<usize>,
        fail: bool,
    }

    impl PhonebookSource for FakeSource {
        fn entries(&self, kind: PhonebookKind) -> anyhow::Result<Vec<PhonebookEntry>> {
            *self.queries.lock() += 1;
            if self.fail {
                anyhow::bail!("database locked");
            }
            Ok(match kind {
                PhonebookKind::Saved => self.saved.lock().clone(),
                _ => Vec::new(),
            })
        }

        fn last_dialed(&self) -> anyhow::Result<Option<String>> {
            Ok(Some("5551234".to_string()))
        }
    }

    fn entry(number: &str, name: Option<&str>, label: Option<NumberLabel>) -> PhonebookEntry {
        PhonebookEntry {
            number: number.to_string(),
            name: name.map(str::to_string),
            label,
        }
    }

    fn source(entries: Vec<PhonebookEntry>) -> Arc<FakeSource> {
        Arc::new(FakeSource {
            saved: Mutex::new(entries),
            queries: Mutex::new(0),
            fail: false,
        })
    }

    #[test]
    fn test_format_entry() {
        assert_eq!(
            format_entry(1, &entry("+15551234", Some("Alice"), Some(NumberLabel::Mobile))),
            "+CPBR: 1,\"+15551234\",145,\"Alice/M\""
        );
        assert_eq!(
            format_entry(2, &entry("5551234", None, Some(NumberLabel::Home))),
            "+CPBR: 2,\"5551234\",129,\"\""
        );
    }

    #[test]
    fn test_format_entry_truncates() {
        let long_number = "1".repeat(40);
        let long_name = "N".repeat(40);
        let line = format_entry(
            3,
            &entry(&long_number, Some(&long_name), Some(NumberLabel::Work)),
        );
        let expected = format!(
            "+CPBR: 3,\"{}\",129,\"{}/W\"",
            "1".repeat(30),
            "N".repeat(28)
        );
        assert_eq!(line, expected);
    }

    #[test]
    fn test_read_range() {
        let src = source(vec![
            entry("1", Some("A"), None),
            entry("2", Some("B"), None),
            entry("3", Some("C"), None),
        ]);
        let mut book = Phonebook::new(src.clone());

        let lines = book.read(2, 10).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("+CPBR: 2,\"2\""));

        assert_eq!(book.read(0, 1), Err(CmeError::InvalidIndex));
        assert_eq!(book.read(3, 2), Err(CmeError::InvalidIndex));
        assert_eq!(book.read(4, 4), Err(CmeError::InvalidIndex));

        // One query serves every page.
        assert_eq!(*src.queries.lock(), 1);
    }

    #[test]
    fn test_select_requeries() {
        let src = source(vec![entry("1", None, None)]);
        let mut book = Phonebook::new(src.clone());
        assert_eq!(book.size(), Ok(1));

        src.saved.lock().push(entry("2", None, None));
        assert_eq!(book.size(), Ok(1));

        book.select(PhonebookKind::Saved).unwrap();
        assert_eq!(book.size(), Ok(2));

        book.select(PhonebookKind::Missed).unwrap();
        assert_eq!(book.size(), Ok(0));
        assert_eq!(book.selected(), PhonebookKind::Missed);
    }

    #[test]
    fn test_entry_at() {
        let mut book = Phonebook::new(source(vec![entry("42", None, None)]));
        assert_eq!(book.entry_at(1).map(|e| e.number), Ok("42".to_string()));
        assert_eq!(book.entry_at(0), Err(CmeError::InvalidIndex));
        assert_eq!(book.entry_at(2), Err(CmeError::InvalidIndex));
    }

    #[test]
    fn test_query_failure_maps_to_sim_failure() {
        let src = Arc::new(FakeSource {
            saved: Mutex::new(Vec::new()),
            queries: Mutex::new(0),
            fail: true,
        });
        let mut book = Phonebook::new(src);
        assert_eq!(book.size(), Err(CmeError::SimFailure));
        assert_eq!(book.read(1, 1), Err(CmeError::SimFailure));
    }

    #[test]
    fn test_reset() {
        let mut book = Phonebook::new(source(Vec::new()));
        book.select(PhonebookKind::Dialed).unwrap();
        book.reset();
        assert_eq!(book.selected(), PhonebookKind::Saved);
    }
}
