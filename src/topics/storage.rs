//! SQLite storage for files, topics and tags.
//!
//! Schema:
//! ```text
//! files       (id, file_path UNIQUE, file_name, file_type, original_content, processed_at)
//! topics      (id, file_id -> files, title, summary, questions JSON,
//!              next_review_date, ease_factor, repetitions, last_reviewed)
//! tags        (id, name UNIQUE)
//! topic_tags  (topic_id -> topics, tag_id -> tags)
//! ```
//!
//! Timestamps are stored as UTC RFC 3339 text with a fixed number of
//! fractional digits, so comparing the text compares the instants.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Params, Row, TransactionBehavior};
use thiserror::Error;

use super::models::{
    latest_review_date, FileRecord, NewFile, NewTopic, ReviewState, ReviewUpdate, Tag, Topic,
    MIN_EASE_FACTOR,
};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// How long a writer waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const TOPIC_COLUMNS: &str = "id, file_id, title, summary, questions, next_review_date, \
                             ease_factor, repetitions, last_reviewed";

const FILE_COLUMNS: &str = "id, file_path, file_name, file_type, original_content, processed_at";

/// Relational store for processed files and their topics.
pub struct TopicStorage {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl TopicStorage {
    /// Open (or create) the database at the given path.
    pub fn open(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_path)?;
        let storage = Self::init(conn, Some(db_path))?;
        log::info!("Opened topic database at {:?}", storage.db_path);
        Ok(storage)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_path TEXT NOT NULL UNIQUE,
                file_name TEXT NOT NULL,
                file_type TEXT NOT NULL,
                original_content TEXT NOT NULL,
                processed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS topics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                summary TEXT NOT NULL,
                -- JSON array of strings
                questions TEXT NOT NULL,
                next_review_date TEXT NOT NULL,
                ease_factor REAL NOT NULL DEFAULT 2.5,
                repetitions INTEGER NOT NULL DEFAULT 0,
                last_reviewed TEXT DEFAULT NULL,
                FOREIGN KEY (file_id) REFERENCES files(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS topic_tags (
                topic_id INTEGER NOT NULL,
                tag_id INTEGER NOT NULL,
                PRIMARY KEY (topic_id, tag_id),
                FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_topics_next_review ON topics(next_review_date);
            CREATE INDEX IF NOT EXISTS idx_topics_file_id ON topics(file_id);
            "#,
        )?;

        Ok(Self { conn, db_path })
    }

    /// Path of the database file, if not in memory.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    // ==================== File Operations ====================

    pub fn insert_file(&self, file: &NewFile, processed_at: DateTime<Utc>) -> Result<i64> {
        insert_file(&self.conn, file, processed_at)
    }

    /// Insert a file unless one with the same path already exists.
    ///
    /// Returns `None` when the path is taken.
    pub fn insert_new_file(
        &mut self,
        file: &NewFile,
        processed_at: DateTime<Utc>,
    ) -> Result<Option<FileRecord>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        if find_file_by_path(&tx, &file.file_path)?.is_some() {
            return Ok(None);
        }

        let id = insert_file(&tx, file, processed_at)?;
        let record = get_file(&tx, id)?
            .ok_or_else(|| StorageError::InvalidRecord(format!("file {} vanished after insert", id)))?;
        tx.commit()?;

        Ok(Some(record))
    }

    pub fn get_file(&self, file_id: i64) -> Result<Option<FileRecord>> {
        get_file(&self.conn, file_id)
    }

    pub fn find_file_by_path(&self, file_path: &str) -> Result<Option<FileRecord>> {
        find_file_by_path(&self.conn, file_path)
    }

    /// List files, most recently processed first.
    pub fn list_files(&self, limit: Option<usize>) -> Result<Vec<FileRecord>> {
        // SQLite treats a negative LIMIT as no limit
        let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM files ORDER BY processed_at DESC, id DESC LIMIT ?1",
            FILE_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![limit], FileRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(FileRow::into_record).collect()
    }

    // ==================== Topic Operations ====================

    pub fn insert_topic(
        &self,
        topic: &NewTopic,
        state: ReviewState,
        next_review_date: DateTime<Utc>,
    ) -> Result<i64> {
        insert_topic(&self.conn, topic, state, next_review_date)
    }

    /// Insert a topic and link all of its tags in one transaction.
    ///
    /// A tag that fails to link is logged and skipped; the topic is kept.
    pub fn create_topic_with_tags(
        &mut self,
        topic: &NewTopic,
        state: ReviewState,
        next_review_date: DateTime<Utc>,
    ) -> Result<Topic> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let topic_id = insert_topic(&tx, topic, state, next_review_date)?;

        for name in normalize_tags(&topic.tags) {
            let linked = get_or_create_tag(&tx, &name).and_then(|tag| link_tag(&tx, topic_id, tag.id));
            if let Err(e) = linked {
                log::warn!("Failed to link tag '{}' to topic {}: {}", name, topic_id, e);
            }
        }

        let created = get_topic(&tx, topic_id)?
            .ok_or_else(|| StorageError::InvalidRecord(format!("topic {} vanished after insert", topic_id)))?;
        tx.commit()?;

        Ok(created)
    }

    pub fn get_topic(&self, topic_id: i64) -> Result<Option<Topic>> {
        get_topic(&self.conn, topic_id)
    }

    pub fn get_topic_state(&self, topic_id: i64) -> Result<Option<ReviewState>> {
        get_topic_state(&self.conn, topic_id)
    }

    /// Write scheduling fields. Returns false if the topic does not exist.
    pub fn update_topic_state(&self, topic_id: i64, update: &ReviewUpdate) -> Result<bool> {
        update_topic_state(&self.conn, topic_id, update)
    }

    /// Read a topic's state, compute its update and write it back, all under
    /// one write lock.
    ///
    /// Returns `None` without writing anything if the topic does not exist.
    pub fn apply_review<F>(&mut self, topic_id: i64, review: F) -> Result<Option<ReviewUpdate>>
    where
        F: FnOnce(ReviewState) -> ReviewUpdate,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(state) = get_topic_state(&tx, topic_id)? else {
            return Ok(None);
        };

        let update = review(state);
        if !update_topic_state(&tx, topic_id, &update)? {
            return Ok(None);
        }
        tx.commit()?;

        Ok(Some(update))
    }

    /// Topics due at `now`, earliest first, ties in insertion order.
    pub fn query_due_topics(&self, now: DateTime<Utc>) -> Result<Vec<Topic>> {
        // Stored dates never pass the latest schedulable date
        let now = now.min(latest_review_date());
        query_topics(
            &self.conn,
            &format!(
                "SELECT {} FROM topics WHERE next_review_date <= ?1 ORDER BY next_review_date ASC, id ASC",
                TOPIC_COLUMNS
            ),
            params![encode_time(now)?],
        )
    }

    pub fn query_topics_by_file(&self, file_id: i64) -> Result<Vec<Topic>> {
        query_topics(
            &self.conn,
            &format!("SELECT {} FROM topics WHERE file_id = ?1 ORDER BY id ASC", TOPIC_COLUMNS),
            params![file_id],
        )
    }

    // ==================== Tag Operations ====================

    pub fn get_or_create_tag(&self, name: &str) -> Result<Tag> {
        get_or_create_tag(&self.conn, name)
    }

    /// Link a topic to a tag. Linking twice is a no-op.
    pub fn link_tag(&self, topic_id: i64, tag_id: i64) -> Result<()> {
        link_tag(&self.conn, topic_id, tag_id)
    }

    pub fn query_all_tags(&self) -> Result<Vec<Tag>> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM tags ORDER BY id")?;
        let tags = stmt
            .query_map([], |row| {
                Ok(Tag {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }
}

// Statement helpers shared by plain and transactional paths. `Transaction`
// derefs to `Connection`, so each helper works in both.

fn insert_file(conn: &Connection, file: &NewFile, processed_at: DateTime<Utc>) -> Result<i64> {
    conn.execute(
        "INSERT INTO files (file_path, file_name, file_type, original_content, processed_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            file.file_path,
            file.file_name,
            file.file_type,
            file.original_content,
            encode_time(processed_at)?,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn get_file(conn: &Connection, file_id: i64) -> Result<Option<FileRecord>> {
    conn.query_row(
        &format!("SELECT {} FROM files WHERE id = ?1", FILE_COLUMNS),
        params![file_id],
        FileRow::from_row,
    )
    .optional()?
    .map(FileRow::into_record)
    .transpose()
}

fn find_file_by_path(conn: &Connection, file_path: &str) -> Result<Option<FileRecord>> {
    conn.query_row(
        &format!("SELECT {} FROM files WHERE file_path = ?1", FILE_COLUMNS),
        params![file_path],
        FileRow::from_row,
    )
    .optional()?
    .map(FileRow::into_record)
    .transpose()
}

fn insert_topic(
    conn: &Connection,
    topic: &NewTopic,
    state: ReviewState,
    next_review_date: DateTime<Utc>,
) -> Result<i64> {
    let questions_json = serde_json::to_string(&topic.questions)?;

    conn.execute(
        "INSERT INTO topics (file_id, title, summary, questions, next_review_date, ease_factor, repetitions, last_reviewed) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL)",
        params![
            topic.file_id,
            topic.title,
            topic.summary,
            questions_json,
            encode_time(next_review_date)?,
            state.ease_factor,
            state.repetitions,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn get_topic(conn: &Connection, topic_id: i64) -> Result<Option<Topic>> {
    let mut topics = query_topics(
        conn,
        &format!("SELECT {} FROM topics WHERE id = ?1", TOPIC_COLUMNS),
        params![topic_id],
    )?;
    Ok(topics.pop())
}

fn get_topic_state(conn: &Connection, topic_id: i64) -> Result<Option<ReviewState>> {
    let row = conn
        .query_row(
            "SELECT repetitions, ease_factor FROM topics WHERE id = ?1",
            params![topic_id],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?)),
        )
        .optional()?;

    row.map(|(repetitions, ease_factor)| {
        Ok(ReviewState {
            repetitions: decode_repetitions(topic_id, repetitions)?,
            ease_factor: decode_ease_factor(topic_id, ease_factor)?,
        })
    })
    .transpose()
}

fn update_topic_state(conn: &Connection, topic_id: i64, update: &ReviewUpdate) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE topics SET next_review_date = ?1, repetitions = ?2, ease_factor = ?3, last_reviewed = ?4 WHERE id = ?5",
        params![
            encode_time(update.next_review_date)?,
            update.repetitions,
            update.ease_factor,
            encode_time(update.last_reviewed)?,
            topic_id,
        ],
    )?;
    Ok(changed > 0)
}

fn get_or_create_tag(conn: &Connection, name: &str) -> Result<Tag> {
    conn.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", params![name])?;
    let id = conn.query_row("SELECT id FROM tags WHERE name = ?1", params![name], |row| {
        row.get(0)
    })?;
    Ok(Tag {
        id,
        name: name.to_string(),
    })
}

fn link_tag(conn: &Connection, topic_id: i64, tag_id: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO topic_tags (topic_id, tag_id) VALUES (?1, ?2)",
        params![topic_id, tag_id],
    )?;
    Ok(())
}

fn load_tags(conn: &Connection, topic_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT tg.name FROM topic_tags tt JOIN tags tg ON tg.id = tt.tag_id WHERE tt.topic_id = ?1 ORDER BY tg.name",
    )?;
    let names = stmt
        .query_map(params![topic_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

fn query_topics<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Topic>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, TopicRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|row| {
            let tags = load_tags(conn, row.id)?;
            row.into_topic(tags)
        })
        .collect()
}

/// Trim, drop blanks and deduplicate, keeping first occurrences.
fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !seen.iter().any(|s: &String| s == tag) {
            seen.push(tag.to_string());
        }
    }
    seen
}

/// Fixed-width text form of a timestamp. Only four-digit years keep text
/// order equal to time order, so anything else is refused.
pub(crate) fn encode_time(time: DateTime<Utc>) -> Result<String> {
    if !(0..=9999).contains(&time.year()) {
        return Err(StorageError::InvalidRecord(format!(
            "timestamp out of storable range: {}",
            time
        )));
    }
    Ok(time.to_rfc3339_opts(SecondsFormat::Nanos, true))
}

fn decode_time(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidRecord(format!("{}: '{}': {}", field, value, e)))
}

fn decode_repetitions(topic_id: i64, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        StorageError::InvalidRecord(format!("topic {}: repetitions out of range: {}", topic_id, value))
    })
}

fn decode_ease_factor(topic_id: i64, value: f64) -> Result<f64> {
    if value.is_finite() && value >= MIN_EASE_FACTOR {
        Ok(value)
    } else {
        Err(StorageError::InvalidRecord(format!(
            "topic {}: ease factor below minimum: {}",
            topic_id, value
        )))
    }
}

/// Raw topic columns, validated by `into_topic`
struct TopicRow {
    id: i64,
    file_id: i64,
    title: String,
    summary: String,
    questions: String,
    next_review_date: String,
    ease_factor: f64,
    repetitions: i64,
    last_reviewed: Option<String>,
}

impl TopicRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            file_id: row.get(1)?,
            title: row.get(2)?,
            summary: row.get(3)?,
            questions: row.get(4)?,
            next_review_date: row.get(5)?,
            ease_factor: row.get(6)?,
            repetitions: row.get(7)?,
            last_reviewed: row.get(8)?,
        })
    }

    fn into_topic(self, tags: Vec<String>) -> Result<Topic> {
        let questions: Vec<String> = serde_json::from_str(&self.questions).map_err(|e| {
            StorageError::InvalidRecord(format!("topic {}: questions: {}", self.id, e))
        })?;

        Ok(Topic {
            id: self.id,
            file_id: self.file_id,
            title: self.title,
            summary: self.summary,
            questions,
            tags,
            ease_factor: decode_ease_factor(self.id, self.ease_factor)?,
            repetitions: decode_repetitions(self.id, self.repetitions)?,
            next_review_date: decode_time("next_review_date", &self.next_review_date)?,
            last_reviewed: self
                .last_reviewed
                .as_deref()
                .map(|t| decode_time("last_reviewed", t))
                .transpose()?,
        })
    }
}

struct FileRow {
    id: i64,
    file_path: String,
    file_name: String,
    file_type: String,
    original_content: String,
    processed_at: String,
}

impl FileRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            file_path: row.get(1)?,
            file_name: row.get(2)?,
            file_type: row.get(3)?,
            original_content: row.get(4)?,
            processed_at: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<FileRecord> {
        Ok(FileRecord {
            processed_at: decode_time("processed_at", &self.processed_at)?,
            id: self.id,
            file_path: self.file_path,
            file_name: self.file_name,
            file_type: self.file_type,
            original_content: self.original_content,
        })
    }
}
