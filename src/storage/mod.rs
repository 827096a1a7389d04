//! Storage layer for Bugtrail data.
//!
//! Each repository gets its own SQLite database at
//! `<data dir>/<repo-hash>/bugs.db`, where the data dir is `BT_DATA_DIR` or
//! `~/.local/share/bugtrail`.
//!
//! ## Tables
//!
//! - `bug_reports`: one row per bug, status and severity stored as their literals
//! - `progress_notes`: the append-only trail, guarded by triggers that abort
//!   any UPDATE or DELETE
//! - `config`: repository key/value settings
//!
//! Every mutation of a bug goes through [`Storage::transition`], which runs a
//! `BEGIN IMMEDIATE` transaction and a compare-and-swap on the status column.

pub mod bugs;
pub mod queries;

pub use bugs::{AssignOutcome, BatchOutcome, BugUpdate, SkippedAssignment};
pub use queries::{AiBugView, AiQuery, AssigneeWorkload, AuditEntry, BugFilter, BugSort, WorkloadItem};

use crate::models::{
    BugReport, BugStatus, NoteKind, ProgressNote, Reporter, Role, ScreenshotRef, Severity,
};
use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default time a connection waits for a competing writer, in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "BT_DATA_DIR";

const DB_FILE: &str = "bugs.db";

/// Columns of `bug_reports` in the order [`row_to_bug`] reads them.
pub(crate) const BUG_COLUMNS: &str = "bug_id, user_id, username, session_id, title, description, \
     reproduction_steps, severity, category, system_info, log_context, screenshot_path, \
     screenshot_name, status, assigned_to, assigned_at, reported_at, updated_at";

/// SQL expression ranking severity, most severe first and untriaged last.
pub(crate) const SEVERITY_RANK_SQL: &str = "CASE severity \
     WHEN 'Critical' THEN 1 WHEN 'High' THEN 2 WHEN 'Medium' THEN 3 WHEN 'Low' THEN 4 \
     ELSE 5 END";

/// Storage manager for a single repository.
pub struct Storage {
    /// Root directory for this repository's data
    pub root: PathBuf,
    /// SQLite connection
    conn: Connection,
}

impl Storage {
    /// Open existing storage for the given repository path.
    pub fn open(repo_path: &Path) -> Result<Self> {
        let root = get_storage_dir(repo_path)?;
        Self::open_root(root)
    }

    /// Open existing storage using an explicit data directory.
    pub fn open_with_data_dir(repo_path: &Path, data_dir: &Path) -> Result<Self> {
        let root = storage_dir_in(repo_path, data_dir)?;
        Self::open_root(root)
    }

    /// Initialize storage for a new repository. Safe to run twice.
    pub fn init(repo_path: &Path) -> Result<Self> {
        let root = get_storage_dir(repo_path)?;
        Self::init_root(root)
    }

    /// Initialize storage using an explicit data directory.
    pub fn init_with_data_dir(repo_path: &Path, data_dir: &Path) -> Result<Self> {
        let root = storage_dir_in(repo_path, data_dir)?;
        Self::init_root(root)
    }

    /// Check if storage exists for the given repository.
    pub fn exists(repo_path: &Path) -> Result<bool> {
        Self::exists_in(repo_path, &data_root()?)
    }

    /// Check if storage exists under an explicit data directory.
    pub fn exists_in(repo_path: &Path, data_dir: &Path) -> Result<bool> {
        let root = storage_dir_in(repo_path, data_dir)?;
        Ok(root.join(DB_FILE).exists())
    }

    fn open_root(root: PathBuf) -> Result<Self> {
        let db_path = root.join(DB_FILE);
        if !db_path.exists() {
            return Err(Error::NotInitialized);
        }
        let conn = Self::connect(&db_path)?;
        Ok(Self { root, conn })
    }

    fn init_root(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)?;
        let conn = Self::connect(&root.join(DB_FILE))?;
        tracing::info!(root = %root.display(), "initialized bug store");
        Ok(Self { root, conn })
    }

    fn connect(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::init_schema(&conn)?;
        Ok(conn)
    }

    /// Change how long this connection waits on a locked database.
    pub fn set_busy_timeout(&self, millis: u64) -> Result<()> {
        self.conn.busy_timeout(Duration::from_millis(millis))?;
        Ok(())
    }

    /// Get the storage root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Initialize the SQLite schema.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS bug_reports (
                bug_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                username TEXT NOT NULL,
                session_id TEXT,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                reproduction_steps TEXT,
                severity TEXT CHECK (severity IS NULL OR severity IN ('Critical', 'High', 'Medium', 'Low')),
                category TEXT,
                system_info TEXT,
                log_context TEXT,
                screenshot_path TEXT,
                screenshot_name TEXT,
                status TEXT NOT NULL DEFAULT 'New' CHECK (status IN
                    ('New', 'Triaged', 'Assigned', 'In Progress', 'Good-to-Test', 'Resolved', 'Dismissed')),
                assigned_to TEXT,
                assigned_at TEXT,
                reported_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS progress_notes (
                bug_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                recorded_at TEXT NOT NULL,
                author TEXT NOT NULL,
                role TEXT NOT NULL,
                kind TEXT NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (bug_id, seq),
                FOREIGN KEY (bug_id) REFERENCES bug_reports(bug_id)
            );

            CREATE TRIGGER IF NOT EXISTS progress_notes_no_update
            BEFORE UPDATE ON progress_notes
            BEGIN
                SELECT RAISE(ABORT, 'progress notes are append-only');
            END;

            CREATE TRIGGER IF NOT EXISTS progress_notes_no_delete
            BEFORE DELETE ON progress_notes
            BEGIN
                SELECT RAISE(ABORT, 'progress notes are append-only');
            END;

            CREATE INDEX IF NOT EXISTS idx_bug_reports_status ON bug_reports(status);
            CREATE INDEX IF NOT EXISTS idx_bug_reports_severity ON bug_reports(severity);
            CREATE INDEX IF NOT EXISTS idx_bug_reports_assigned_to ON bug_reports(assigned_to);
            CREATE INDEX IF NOT EXISTS idx_bug_reports_reported_at ON bug_reports(reported_at);

            CREATE TABLE IF NOT EXISTS config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        Self::run_migrations(conn)?;

        Ok(())
    }

    /// Run database migrations for schema changes.
    /// This handles adding new columns to existing databases.
    fn run_migrations(conn: &Connection) -> Result<()> {
        // SQLite has no ADD COLUMN IF NOT EXISTS, so check the schema first
        for (column, ddl) in [
            ("assigned_at", "ALTER TABLE bug_reports ADD COLUMN assigned_at TEXT"),
            ("session_id", "ALTER TABLE bug_reports ADD COLUMN session_id TEXT"),
            ("screenshot_name", "ALTER TABLE bug_reports ADD COLUMN screenshot_name TEXT"),
        ] {
            let has_column: bool = conn
                .query_row(
                    "SELECT COUNT(*) > 0 FROM pragma_table_info('bug_reports') WHERE name = ?1",
                    [column],
                    |row| row.get(0),
                )
                .unwrap_or(false);

            if !has_column {
                conn.execute(ddl, [])?;
                tracing::info!(column, "migrated bug_reports");
            }
        }

        Ok(())
    }

    // === Bug Row Access ===

    /// Load a bug with its full progress trail.
    pub(crate) fn load_bug(conn: &Connection, id: &str) -> Result<BugReport> {
        let sql = format!("SELECT {} FROM bug_reports WHERE bug_id = ?1", BUG_COLUMNS);
        let bug = conn
            .query_row(&sql, [id], row_to_bug)
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Bug not found: {}", id)))?;
        Self::attach_notes(conn, bug)
    }

    pub(crate) fn attach_notes(conn: &Connection, mut bug: BugReport) -> Result<BugReport> {
        let mut stmt = conn.prepare_cached(
            "SELECT seq, recorded_at, author, role, kind, body
             FROM progress_notes WHERE bug_id = ?1 ORDER BY seq",
        )?;
        bug.progress_notes = stmt
            .query_map([&bug.id], row_to_note)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(bug)
    }

    fn bug_exists(conn: &Connection, id: &str) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM bug_reports WHERE bug_id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    fn insert_bug(conn: &Connection, bug: &BugReport) -> Result<()> {
        let sql = format!(
            "INSERT INTO bug_reports ({}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            BUG_COLUMNS
        );
        conn.execute(
            &sql,
            params![
                bug.id,
                bug.reporter.user_id,
                bug.reporter.display_name,
                bug.session_ref,
                bug.title,
                bug.description,
                bug.reproduction_steps,
                bug.severity.map(|s| s.as_str()),
                bug.category,
                bug.system_info,
                bug.log_context,
                bug.screenshot_ref.as_ref().map(|s| s.path.as_str()),
                bug.screenshot_ref.as_ref().map(|s| s.name.as_str()),
                bug.status.as_str(),
                bug.assigned_to,
                bug.assigned_at.map(format_ts),
                format_ts(bug.reported_at),
                format_ts(bug.updated_at),
            ],
        )?;
        Ok(())
    }

    fn insert_note(conn: &Connection, bug_id: &str, note: &ProgressNote) -> Result<()> {
        conn.execute(
            "INSERT INTO progress_notes (bug_id, seq, recorded_at, author, role, kind, body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                bug_id,
                note.seq,
                format_ts(note.timestamp),
                note.author,
                note.role.as_str(),
                note.kind.as_str(),
                note.text,
            ],
        )?;
        Ok(())
    }

    /// Insert a freshly created bug, retrying id generation on collision.
    pub(crate) fn create_bug<F>(&mut self, make: F) -> Result<BugReport>
    where
        F: Fn(String) -> BugReport,
    {
        const MAX_ATTEMPTS: usize = 8;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        for attempt in 0..MAX_ATTEMPTS {
            let id = generate_id(&format!("{}", attempt));
            if Self::bug_exists(&tx, &id)? {
                continue;
            }
            let bug = make(id);
            Self::insert_bug(&tx, &bug)?;
            for note in &bug.progress_notes {
                Self::insert_note(&tx, &bug.id, note)?;
            }
            tx.commit()?;
            return Ok(bug);
        }
        Err(Error::Storage(format!(
            "Could not generate a unique bug id after {} attempts",
            MAX_ATTEMPTS
        )))
    }

    /// Apply `change` to one bug atomically.
    ///
    /// Inside a single `BEGIN IMMEDIATE` transaction: load the current row,
    /// let `change` validate and mutate it (including appending notes), then
    /// write it back guarded by the status it was read with and insert the
    /// new note rows. Any error rolls everything back. Leaving the
    /// assignee-bearing statuses clears the assignment.
    pub(crate) fn transition<F>(&mut self, id: &str, change: F) -> Result<BugReport>
    where
        F: FnOnce(&mut BugReport) -> Result<()>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut bug = Self::load_bug(&tx, id)?;
        let read_status = bug.status;
        let known_notes = bug.progress_notes.len();

        change(&mut bug)?;

        if !bug.status.requires_assignee() {
            bug.assigned_to = None;
            bug.assigned_at = None;
        }
        bug.updated_at = crate::models::now();

        let changed = tx.execute(
            "UPDATE bug_reports
             SET severity = ?1, category = ?2, status = ?3, assigned_to = ?4,
                 assigned_at = ?5, updated_at = ?6
             WHERE bug_id = ?7 AND status = ?8",
            params![
                bug.severity.map(|s| s.as_str()),
                bug.category,
                bug.status.as_str(),
                bug.assigned_to,
                bug.assigned_at.map(format_ts),
                format_ts(bug.updated_at),
                bug.id,
                read_status.as_str(),
            ],
        )?;
        if changed != 1 {
            return Err(Error::Storage(format!(
                "Bug {} changed while being updated (expected status '{}')",
                bug.id, read_status
            )));
        }

        for note in &bug.progress_notes[known_notes..] {
            Self::insert_note(&tx, &bug.id, note)?;
        }

        tx.commit()?;
        Ok(bug)
    }

    // === Config Operations ===

    /// Get a configuration value.
    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = self
            .conn
            .query_row("SELECT value FROM config WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a configuration value.
    pub fn set_config(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO config (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// List all configuration values.
    pub fn list_configs(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM config ORDER BY key")?;
        let configs = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<(String, String)>, _>>()?;
        Ok(configs)
    }
}

/// Format a timestamp the way it is stored: RFC 3339, UTC, microseconds.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_literal<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse::<T>().map_err(|e| conversion_error(idx, e))
}

/// Map a `bug_reports` row selected with [`BUG_COLUMNS`]. Notes are attached separately.
pub(crate) fn row_to_bug(row: &Row<'_>) -> rusqlite::Result<BugReport> {
    let severity: Option<String> = row.get(7)?;
    let screenshot_path: Option<String> = row.get(11)?;
    let screenshot_name: Option<String> = row.get(12)?;
    let status: String = row.get(13)?;
    let assigned_at: Option<String> = row.get(15)?;
    let reported_at: String = row.get(16)?;
    let updated_at: String = row.get(17)?;

    let screenshot_ref = screenshot_path.map(|path| ScreenshotRef {
        name: screenshot_name.unwrap_or_else(|| path.clone()),
        path,
    });

    Ok(BugReport {
        id: row.get(0)?,
        reporter: Reporter {
            user_id: row.get(1)?,
            display_name: row.get(2)?,
        },
        session_ref: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        reproduction_steps: row.get(6)?,
        severity: severity
            .map(|s| parse_literal::<Severity>(7, &s))
            .transpose()?,
        category: row.get(8)?,
        system_info: row.get(9)?,
        log_context: row.get(10)?,
        screenshot_ref,
        status: parse_literal::<BugStatus>(13, &status)?,
        assigned_to: row.get(14)?,
        assigned_at: assigned_at.map(|s| parse_ts(15, &s)).transpose()?,
        progress_notes: Vec::new(),
        reported_at: parse_ts(16, &reported_at)?,
        updated_at: parse_ts(17, &updated_at)?,
    })
}

fn row_to_note(row: &Row<'_>) -> rusqlite::Result<ProgressNote> {
    let recorded_at: String = row.get(1)?;
    let role: String = row.get(3)?;
    let kind: String = row.get(4)?;
    Ok(ProgressNote {
        seq: row.get(0)?,
        timestamp: parse_ts(1, &recorded_at)?,
        author: row.get(2)?,
        role: parse_literal::<Role>(3, &role)?,
        kind: parse_literal::<NoteKind>(4, &kind)?,
        text: row.get(5)?,
    })
}

/// Root of all Bugtrail data: `BT_DATA_DIR` if set, else `<data dir>/bugtrail`.
pub fn data_root() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let data_dir = dirs::data_dir()
        .ok_or_else(|| Error::Other("Could not determine data directory".to_string()))?;
    Ok(data_dir.join("bugtrail"))
}

/// Walk up from `start` to the nearest directory containing `.git`.
pub fn find_git_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}

/// Get the storage directory for a repository.
///
/// Uses a hash of the repository path to create a unique directory
/// under [`data_root`].
pub fn get_storage_dir(repo_path: &Path) -> Result<PathBuf> {
    storage_dir_in(repo_path, &data_root()?)
}

/// Storage directory for a repository under an explicit data directory.
pub fn storage_dir_in(repo_path: &Path, data_dir: &Path) -> Result<PathBuf> {
    let repo_canonical = repo_path
        .canonicalize()
        .map_err(|e| Error::Other(format!("Could not canonicalize repo path: {}", e)))?;

    let mut hasher = Sha256::new();
    hasher.update(repo_canonical.to_string_lossy().as_bytes());
    let hash_hex = format!("{:x}", hasher.finalize());

    Ok(data_dir.join(&hash_hex[..12]))
}

/// Generate a bug id.
///
/// Format: `bug-<8 hex chars>`, hashed from a random UUID, the caller's seed
/// and the current time.
pub fn generate_id(seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(uuid::Uuid::new_v4().as_bytes());
    hasher.update(seed.as_bytes());
    hasher.update(
        Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or(0)
            .to_le_bytes(),
    );
    let hash_hex = format!("{:x}", hasher.finalize());
    format!("bug-{}", &hash_hex[..8])
}
