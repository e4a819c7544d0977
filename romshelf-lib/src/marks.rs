//! Persistent deletion marks.
//!
//! Marks live in a plain text file next to the gamelist, one line per
//! marked entry: `<id>|<name>`. The name is informational (it makes the
//! file greppable); only the id is read back. The loader is deliberately
//! forgiving: a missing file is an empty set and malformed lines are
//! ignored, so a half-written file never blocks startup.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::library::Library;

/// Set of record ids flagged for deletion.
#[derive(Debug, Clone, Default)]
pub struct MarkSet {
    ids: BTreeSet<String>,
}

impl MarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load marks from the flat file. Missing file means no marks.
    pub fn load(path: &Path) -> io::Result<Self> {
        let mut marks = MarkSet::new();
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(marks),
            Err(e) => return Err(e),
        };

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let id = line.split('|').next().unwrap_or("").trim();
            if !id.is_empty() {
                marks.ids.insert(id.to_string());
            }
        }
        Ok(marks)
    }

    /// Save marks as `<id>|<name>` lines, newline-terminated. Names come
    /// from the library; a mark whose record vanished is written id-only.
    pub fn save(&self, path: &Path, library: &Library) -> io::Result<()> {
        let mut out = String::new();
        for id in &self.ids {
            match library.by_id(id) {
                Some(record) => {
                    out.push_str(id);
                    out.push('|');
                    out.push_str(&record.name);
                }
                None => out.push_str(id),
            }
            out.push('\n');
        }
        let mut file = fs::File::create(path)?;
        file.write_all(out.as_bytes())?;
        Ok(())
    }

    /// Drop marks that no longer reference an existing record. Stale ids
    /// are discarded silently; the count removed is returned for logging.
    pub fn retain_known(&mut self, library: &Library) -> usize {
        let before = self.ids.len();
        self.ids.retain(|id| library.by_id(id).is_some());
        let dropped = before - self.ids.len();
        if dropped > 0 {
            log::debug!("dropped {dropped} stale mark(s)");
        }
        dropped
    }

    pub fn mark(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn unmark(&mut self, id: &str) -> bool {
        self.ids.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(|s| s.as_str())
    }

    /// The marked ids as an owned set (what `gamelist::remove_games` takes).
    pub fn to_id_set(&self) -> std::collections::HashSet<String> {
        self.ids.iter().cloned().collect()
    }
}

#[cfg(test)]
#[path = "tests/marks_tests.rs"]
mod tests;
