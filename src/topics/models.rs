//! Data models for topics, tags and processed files

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ease factor every new topic starts with
pub const INITIAL_EASE_FACTOR: f64 = 2.5;

/// Lowest ease factor a topic can ever have
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// 9999-12-31T23:59:59Z, the last instant with a four-digit year
pub const LATEST_REVIEW_TIMESTAMP: i64 = 253_402_300_799;

/// Latest date a review can be scheduled for. Storage keeps dates as
/// four-digit-year text, so nothing later can be written.
pub fn latest_review_date() -> DateTime<Utc> {
    DateTime::from_timestamp(LATEST_REVIEW_TIMESTAMP, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// A unit of study material under spaced repetition tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: i64,
    pub file_id: i64,
    pub title: String,
    pub summary: String,
    /// Recall prompts, in the order they were generated
    #[serde(default)]
    pub questions: Vec<String>,
    /// Tag names, sorted and deduplicated
    #[serde(default)]
    pub tags: Vec<String>,
    /// SM-2 ease factor (default 2.5, never below 1.3)
    pub ease_factor: f64,
    /// Current streak of successful reviews
    pub repetitions: u32,
    /// When the topic is due for review
    pub next_review_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reviewed: Option<DateTime<Utc>>,
}

impl Topic {
    /// Check if the topic is due for review at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_review_date
    }

    /// Scheduling state of this topic
    pub fn review_state(&self) -> ReviewState {
        ReviewState {
            repetitions: self.repetitions,
            ease_factor: self.ease_factor,
        }
    }
}

/// Content of a topic that is about to be inserted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTopic {
    pub file_id: i64,
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// The memory-strength parameters the scheduler reads
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    pub repetitions: u32,
    pub ease_factor: f64,
}

impl Default for ReviewState {
    fn default() -> Self {
        Self {
            repetitions: 0,
            ease_factor: INITIAL_EASE_FACTOR,
        }
    }
}

/// Fields written back to a topic after a review
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewUpdate {
    pub repetitions: u32,
    pub ease_factor: f64,
    pub next_review_date: DateTime<Utc>,
    pub last_reviewed: DateTime<Utc>,
}

/// A deduplicated label shared between topics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// An uploaded note, before it is stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFile {
    pub file_path: String,
    pub file_name: String,
    pub file_type: String,
    pub original_content: String,
}

/// An uploaded note as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: i64,
    pub file_path: String,
    pub file_name: String,
    pub file_type: String,
    #[serde(default, skip_serializing)]
    pub original_content: String,
    pub processed_at: DateTime<Utc>,
}

/// A file together with the topics extracted from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileWithTopics {
    #[serde(flatten)]
    pub file: FileRecord,
    #[serde(default)]
    pub topics: Vec<Topic>,
}
