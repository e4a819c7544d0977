//! In-memory library model over one `gamelist.xml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::GamelistError;
use crate::gamelist::{self, GameRecord};
use crate::marks::MarkSet;

/// Filename of the catalog inside the library root.
pub const GAMELIST_FILENAME: &str = "gamelist.xml";

/// Filename of the mark-persistence file inside the library root.
pub const MARKS_FILENAME: &str = "checked";

/// System bucket used for records with no `<system>` element.
pub const UNKNOWN_SYSTEM: &str = "(unknown)";

/// The parsed game library plus the directory it was loaded from.
///
/// Asset paths inside records are relative to `root`.
#[derive(Debug)]
pub struct Library {
    root: PathBuf,
    records: Vec<GameRecord>,
}

/// Outcome of deleting the marked entries.
#[derive(Debug, Clone, Default)]
pub struct DeleteSummary {
    /// Number of `<game>` nodes removed from the XML.
    pub deleted: usize,
    /// Asset files removed from disk.
    pub files_removed: usize,
    /// Per-file problems; these never abort the operation.
    pub errors: Vec<String>,
}

impl Library {
    /// Load the library from `<root>/gamelist.xml`.
    pub fn load(root: &Path) -> Result<Self, GamelistError> {
        let records = gamelist::parse_gamelist(&root.join(GAMELIST_FILENAME))?;
        log::info!("loaded {} game(s) from {}", records.len(), root.display());
        Ok(Self {
            root: root.to_path_buf(),
            records,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn gamelist_path(&self) -> PathBuf {
        self.root.join(GAMELIST_FILENAME)
    }

    pub fn marks_path(&self) -> PathBuf {
        self.root.join(MARKS_FILENAME)
    }

    pub fn records(&self) -> &[GameRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn by_id(&self, id: &str) -> Option<&GameRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Records grouped by system tag, sorted by system name.
    pub fn by_system(&self) -> BTreeMap<&str, Vec<&GameRecord>> {
        let mut systems: BTreeMap<&str, Vec<&GameRecord>> = BTreeMap::new();
        for record in &self.records {
            let system = record.system.as_deref().unwrap_or(UNKNOWN_SYSTEM);
            systems.entry(system).or_default().push(record);
        }
        systems
    }

    /// Delete every marked entry: back up the XML, remove the `<game>`
    /// nodes, then remove each record's backing files (rom path, image,
    /// video). A missing backing file is not an error; other filesystem
    /// failures are collected in the summary and do not stop the run.
    ///
    /// The in-memory record list is updated to match. The caller is
    /// responsible for clearing and re-saving the mark store.
    pub fn delete_marked(&mut self, marks: &MarkSet) -> Result<DeleteSummary, GamelistError> {
        let mut summary = DeleteSummary::default();
        if marks.is_empty() {
            return Ok(summary);
        }

        let xml_path = self.gamelist_path();
        gamelist::backup_gamelist(&xml_path)?;

        let ids = marks.to_id_set();
        summary.deleted = gamelist::remove_games(&xml_path, &ids)?;

        for record in self.records.iter().filter(|r| ids.contains(&r.id)) {
            for rel in [&record.path, &record.image, &record.video]
                .into_iter()
                .flatten()
            {
                match self.remove_asset(rel) {
                    Ok(true) => summary.files_removed += 1,
                    Ok(false) => {}
                    Err(e) => summary.errors.push(format!("{rel}: {e}")),
                }
            }
        }

        self.records.retain(|r| !ids.contains(&r.id));
        log::info!(
            "deleted {} entr(ies), {} file(s) removed",
            summary.deleted,
            summary.files_removed
        );
        Ok(summary)
    }

    /// Overwrite record descriptions in memory, matching what the
    /// translation pipeline already wrote to disk.
    pub fn apply_descriptions(&mut self, updates: &std::collections::HashMap<String, String>) {
        for record in &mut self.records {
            if let Some(text) = updates.get(&record.id) {
                record.desc = Some(text.clone());
            }
        }
    }

    /// Remove one root-relative asset file. Returns whether a file was
    /// actually removed (missing files are skipped quietly).
    fn remove_asset(&self, rel: &str) -> std::io::Result<bool> {
        let full = self.root.join(rel);
        if !full.exists() {
            log::debug!("asset already missing: {}", full.display());
            return Ok(false);
        }
        fs::remove_file(&full)?;
        Ok(true)
    }
}

#[cfg(test)]
#[path = "tests/library_tests.rs"]
mod tests;
