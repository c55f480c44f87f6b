//! Topic lifecycle: creation, review submission and queries

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use super::algorithm::{compute_next_review, InvalidQuality, Quality};
use super::models::{FileRecord, FileWithTopics, NewFile, NewTopic, ReviewState, ReviewUpdate, Tag, Topic};
use super::storage::{StorageError, TopicStorage};
use crate::clock::Clock;

/// Seconds before a freshly created topic is first due
pub const DEFAULT_INITIAL_REVIEW_DELAY_SECS: i64 = 300;

#[derive(Error, Debug)]
pub enum TopicError {
    #[error("Topic not found: {0}")]
    TopicNotFound(i64),

    #[error(transparent)]
    InvalidQuality(#[from] InvalidQuality),

    #[error("File already processed: {0}")]
    DuplicateFile(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, TopicError>;

/// Owns topic state in storage and applies the scheduler to it.
///
/// `submit_review` is the only path that changes a topic's scheduling
/// fields.
pub struct TopicManager {
    storage: Mutex<TopicStorage>,
    clock: Arc<dyn Clock>,
    initial_delay: Duration,
}

impl TopicManager {
    pub fn new(storage: TopicStorage, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage: Mutex::new(storage),
            clock,
            initial_delay: Duration::seconds(DEFAULT_INITIAL_REVIEW_DELAY_SECS),
        }
    }

    /// Override the delay before a new topic is first due
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn storage(&self) -> Result<MutexGuard<'_, TopicStorage>> {
        self.storage
            .lock()
            .map_err(|_| TopicError::Storage(StorageError::LockPoisoned))
    }

    /// Store an uploaded file. Fails if its path was already processed.
    pub fn register_file(&self, file: &NewFile) -> Result<FileRecord> {
        let now = self.clock.now();
        let record = self
            .storage()?
            .insert_new_file(file, now)?
            .ok_or_else(|| TopicError::DuplicateFile(file.file_path.clone()))?;

        log::info!("Registered file {} ({})", record.id, record.file_path);
        Ok(record)
    }

    /// Create a topic with the initial scheduling state and link its tags
    pub fn create_topic(&self, topic: &NewTopic) -> Result<Topic> {
        let next_review_date = self.clock.now() + self.initial_delay;

        let created = self.storage()?.create_topic_with_tags(
            topic,
            ReviewState::default(),
            next_review_date,
        )?;

        log::info!(
            "Created topic {} '{}' for file {} with {} tags",
            created.id,
            created.title,
            created.file_id,
            created.tags.len()
        );
        Ok(created)
    }

    /// Record review feedback for a topic and return its next due date
    pub fn submit_review(&self, topic_id: i64, quality: i32) -> Result<DateTime<Utc>> {
        let quality = Quality::try_from(quality)?;
        let now = self.clock.now();

        let update = self
            .storage()?
            .apply_review(topic_id, |state| {
                let outcome = compute_next_review(state, quality, now);
                ReviewUpdate {
                    repetitions: outcome.repetitions,
                    ease_factor: outcome.ease_factor,
                    next_review_date: outcome.next_review_date,
                    last_reviewed: now,
                }
            })?
            .ok_or(TopicError::TopicNotFound(topic_id))?;

        log::debug!(
            "Reviewed topic {} with quality {}: repetitions={}, ease={:.2}, next={}",
            topic_id,
            quality,
            update.repetitions,
            update.ease_factor,
            update.next_review_date
        );
        Ok(update.next_review_date)
    }

    /// Topics due now, earliest due first
    pub fn list_due_topics(&self) -> Result<Vec<Topic>> {
        let now = self.clock.now();
        Ok(self.storage()?.query_due_topics(now)?)
    }

    pub fn get_topic_with_tags(&self, topic_id: i64) -> Result<Option<Topic>> {
        Ok(self.storage()?.get_topic(topic_id)?)
    }

    pub fn list_topics_for_file(&self, file_id: i64) -> Result<Vec<Topic>> {
        Ok(self.storage()?.query_topics_by_file(file_id)?)
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        Ok(self.storage()?.query_all_tags()?)
    }

    /// Processed files with their topics, most recent first
    pub fn list_files(&self, limit: Option<usize>) -> Result<Vec<FileWithTopics>> {
        let storage = self.storage()?;
        let files = storage.list_files(limit)?;

        let mut result = Vec::with_capacity(files.len());
        for file in files {
            let topics = storage.query_topics_by_file(file.id)?;
            result.push(FileWithTopics { file, topics });
        }
        Ok(result)
    }

    pub fn get_file(&self, file_id: i64) -> Result<Option<FileWithTopics>> {
        let storage = self.storage()?;
        let Some(file) = storage.get_file(file_id)? else {
            return Ok(None);
        };
        let topics = storage.query_topics_by_file(file_id)?;
        Ok(Some(FileWithTopics { file, topics }))
    }
}
