use crate::config::{TARGET_PAGE_ID, TARGET_PAGE_TITLE};
use crate::engine::{HopOutcome, TerminalReason};
use crate::error::RecordResult;
use philhop_wiki::PageRef;
use rusqlite::{Connection, OptionalExtension, Result, params};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Sink for finished traversals.
///
/// Only outcomes with a usable, non-empty path are written; everything
/// else is a no-op.
pub trait TraversalRecord {
    fn record(&self, outcome: &HopOutcome) -> RecordResult<()>;
}

fn recordable_path(outcome: &HopOutcome) -> Option<&[PageRef]> {
    outcome.usable_path().filter(|path| !path.is_empty())
}

/// One stored traversal attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraversalRow {
    pub id: String,
    pub start_id: String,
    pub start_title: String,
    pub end_id: Option<String>,
    pub strategy: String,
    pub reason: String,
    pub hops: usize,
    pub cycle_eliminated: bool,
    pub error: Option<String>,
    pub started_at: i64,
    pub finished_at: i64,
}

impl TraversalRow {
    pub fn reason(&self) -> Option<TerminalReason> {
        TerminalReason::from_str(&self.reason)
    }
}

/// One stored selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopRow {
    pub position: usize,
    pub source_id: String,
    pub chosen_id: String,
    pub anchor_text: String,
    pub score: Option<f64>,
    pub eliminated: bool,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn drop(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
-- Every traversal attempt, successful or not
CREATE TABLE IF NOT EXISTS traversals (
    id TEXT PRIMARY KEY,
    start_id TEXT NOT NULL,
    start_title TEXT NOT NULL,
    end_id TEXT,
    strategy TEXT NOT NULL,
    reason TEXT NOT NULL CHECK(reason IN (
        'reached_target',
        'cycle_terminated',
        'extraction_failed',
        'selection_failed',
        'backend_unavailable',
        'hop_limit_exceeded',
        'cancelled'
    )),
    hops INTEGER NOT NULL,
    cycle_eliminated BOOLEAN NOT NULL DEFAULT 0,
    path TEXT NOT NULL,       -- JSON array of page ids
    error TEXT,
    started_at INTEGER NOT NULL,
    finished_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_traversals_strategy ON traversals(strategy);
CREATE INDEX IF NOT EXISTS idx_traversals_reason ON traversals(reason);

-- Selections made during a traversal
CREATE TABLE IF NOT EXISTS hops (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    traversal_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    source_id TEXT NOT NULL,
    chosen_id TEXT NOT NULL,
    anchor_text TEXT NOT NULL,
    score REAL,
    eliminated BOOLEAN NOT NULL DEFAULT 0,
    scores TEXT NOT NULL,     -- JSON array of scored candidates

    FOREIGN KEY(traversal_id) REFERENCES traversals(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_hops_traversal ON hops(traversal_id);

-- Tree of pages known to lead to the target, each pointing at its successor
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id TEXT UNIQUE NOT NULL,
    title TEXT NOT NULL,
    parent_page_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_pages_parent ON pages(parent_page_id);
            ",
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO pages (page_id, title, parent_page_id) VALUES (?1, ?2, NULL)",
            params![TARGET_PAGE_ID, TARGET_PAGE_TITLE],
        )?;
        Ok(())
    }

    pub fn get_connection(&self) -> &Connection {
        &self.conn
    }

    /// Store any outcome, with its per-hop selections. Returns the new
    /// traversal id.
    pub fn record_attempt(&self, outcome: &HopOutcome) -> RecordResult<String> {
        let traversal_id = uuid::Uuid::new_v4().to_string();
        let finished_at = chrono::Utc::now().timestamp();
        let path: Vec<&str> = outcome.path.iter().map(|p| p.id.as_str()).collect();
        let end_id = outcome.path.last().map(|p| p.id.as_str());

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO traversals (
                id, start_id, start_title, end_id, strategy, reason, hops,
                cycle_eliminated, path, error, started_at, finished_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                &traversal_id,
                &outcome.start.id,
                &outcome.start.display_title,
                end_id,
                outcome.strategy.tag(),
                outcome.reason.as_str(),
                outcome.hops_taken as i64,
                outcome.cycle_eliminated,
                serde_json::to_string(&path)?,
                &outcome.error,
                outcome.started_at,
                finished_at,
            ],
        )?;

        for (position, step) in outcome.steps.iter().enumerate() {
            tx.execute(
                "INSERT INTO hops (
                    traversal_id, position, source_id, chosen_id, anchor_text,
                    score, eliminated, scores
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    &traversal_id,
                    position as i64,
                    &step.source.id,
                    &step.selection.chosen.destination.id,
                    &step.selection.chosen.anchor_text,
                    step.selection.chosen_score(),
                    step.eliminated,
                    serde_json::to_string(&step.selection.scores)?,
                ],
            )?;
        }
        tx.commit()?;

        debug!(
            "Recorded traversal {} from {} ({})",
            traversal_id, outcome.start.id, outcome.reason
        );
        Ok(traversal_id)
    }

    /// Link `start` and every page of `path` to its successor. The last
    /// page is the root of the chain. Pages already in the tree keep their
    /// parent. Returns the number of pages added.
    ///
    /// A page visited more than once is linked to the page that follows its
    /// last visit, so loops in the path never become loops in the tree.
    pub fn record_tree(&self, start: &PageRef, path: &[PageRef]) -> Result<usize> {
        let chain: Vec<&PageRef> = std::iter::once(start).chain(path).collect();
        let last_visit: HashMap<&str, usize> = chain
            .iter()
            .enumerate()
            .map(|(i, page)| (page.id.as_str(), i))
            .collect();
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;

        for (i, page) in chain.iter().enumerate() {
            if last_visit.get(page.id.as_str()) != Some(&i) {
                continue;
            }
            let parent = chain.get(i + 1).map(|p| p.id.as_str());
            inserted += tx.execute(
                "INSERT OR IGNORE INTO pages (page_id, title, parent_page_id) VALUES (?1, ?2, ?3)",
                params![&page.id, &page.display_title, parent],
            )?;
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// `Some(None)` for a root, `None` for an unknown page.
    pub fn parent_of(&self, page_id: &str) -> Result<Option<Option<String>>> {
        self.conn
            .query_row(
                "SELECT parent_page_id FROM pages WHERE page_id = ?1",
                params![page_id],
                |row| row.get(0),
            )
            .optional()
    }

    /// Follow parents from `page_id` up to a root.
    pub fn path_to_root(&self, page_id: &str) -> Result<Vec<String>> {
        let mut path = Vec::new();
        let mut current = Some(page_id.to_string());

        while let Some(id) = current {
            if path.contains(&id) {
                break;
            }
            match self.parent_of(&id)? {
                Some(parent) => {
                    path.push(id);
                    current = parent;
                }
                None => break,
            }
        }
        Ok(path)
    }

    pub fn count_pages(&self) -> Result<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
    }

    pub fn get_traversals(&self, strategy: Option<&str>) -> Result<Vec<TraversalRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, start_id, start_title, end_id, strategy, reason, hops,
                    cycle_eliminated, error, started_at, finished_at
             FROM traversals
             WHERE ?1 IS NULL OR strategy = ?1
             ORDER BY finished_at, rowid",
        )?;

        let rows = stmt
            .query_map(params![strategy], |row| {
                Ok(TraversalRow {
                    id: row.get(0)?,
                    start_id: row.get(1)?,
                    start_title: row.get(2)?,
                    end_id: row.get(3)?,
                    strategy: row.get(4)?,
                    reason: row.get(5)?,
                    hops: row.get::<_, i64>(6)? as usize,
                    cycle_eliminated: row.get(7)?,
                    error: row.get(8)?,
                    started_at: row.get(9)?,
                    finished_at: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(rows)
    }

    pub fn get_hops(&self, traversal_id: &str) -> Result<Vec<HopRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT position, source_id, chosen_id, anchor_text, score, eliminated
             FROM hops WHERE traversal_id = ?1 ORDER BY position",
        )?;

        let rows = stmt
            .query_map(params![traversal_id], |row| {
                Ok(HopRow {
                    position: row.get::<_, i64>(0)? as usize,
                    source_id: row.get(1)?,
                    chosen_id: row.get(2)?,
                    anchor_text: row.get(3)?,
                    score: row.get(4)?,
                    eliminated: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(rows)
    }
}

impl TraversalRecord for Database {
    fn record(&self, outcome: &HopOutcome) -> RecordResult<()> {
        let Some(path) = recordable_path(outcome) else {
            return Ok(());
        };
        self.record_attempt(outcome)?;
        // Partial paths do not end at a root, so only finished ones join the tree.
        if outcome.reached_target() {
            let added = self.record_tree(&outcome.start, path)?;
            debug!("Added {} pages to the traversal tree", added);
        }
        Ok(())
    }
}

/// Appends `start_title,start_id,strategy,hops` rows to a CSV file.
pub struct CsvRecord {
    path: PathBuf,
}

pub const CSV_HEADER: &str = "start_title,start_id,strategy,hops";

impl CsvRecord {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TraversalRecord for CsvRecord {
    fn record(&self, outcome: &HopOutcome) -> RecordResult<()> {
        if recordable_path(outcome).is_none() {
            return Ok(());
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        if file.metadata()?.len() == 0 {
            writeln!(file, "{}", CSV_HEADER)?;
        }
        writeln!(
            file,
            "{},{},{},{}",
            csv_field(&outcome.start.display_title),
            csv_field(&outcome.start.id),
            csv_field(&outcome.strategy.tag()),
            outcome.hops_taken
        )?;
        Ok(())
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("Plain"), "Plain");
        assert_eq!(csv_field("Paris, Texas"), "\"Paris, Texas\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_in_memory_database_has_target_root() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.count_pages().unwrap(), 1);
        assert_eq!(db.parent_of(TARGET_PAGE_ID).unwrap(), Some(None));
        assert_eq!(db.parent_of("/wiki/Nowhere").unwrap(), None);
    }
}
