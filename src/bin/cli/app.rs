use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use revisu_lib::clock::SystemClock;
use revisu_lib::config::Config;
use revisu_lib::extraction::{ContentExtractor, ExtractedContent, GeminiExtractor, StaticExtractor};
use revisu_lib::pipeline::NoteProcessor;
use revisu_lib::topics::{FileWithTopics, Tag, Topic, TopicManager, TopicStorage};

/// Shared application state for CLI commands
pub struct App {
    pub config: Config,
    pub manager: Arc<TopicManager>,
}

impl App {
    /// Load configuration and open the topic database
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load(config_path).context("Failed to load configuration")?;

        let db_path = config
            .database_path()
            .context("Failed to resolve database path")?;
        let storage = TopicStorage::open(db_path.clone())
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

        let manager = TopicManager::new(storage, Arc::new(SystemClock))
            .with_initial_delay(config.initial_review_delay());

        Ok(Self {
            config,
            manager: Arc::new(manager),
        })
    }

    /// Build the note processor. Without a usable extraction service every
    /// note gets fallback content.
    pub fn processor(&self) -> NoteProcessor {
        let extractor: Arc<dyn ContentExtractor> = match GeminiExtractor::new(&self.config.extraction) {
            Ok(gemini) => {
                log::info!("Using Gemini model {} for content extraction", gemini.model());
                Arc::new(gemini)
            }
            Err(e) => {
                log::warn!("Content extraction unavailable ({}); notes will get placeholder content", e);
                Arc::new(StaticExtractor::new(ExtractedContent::fallback()))
            }
        };

        NoteProcessor::new(
            Arc::clone(&self.manager),
            extractor,
            self.config.extraction.timeout(),
        )
    }

    pub fn due_topics(&self) -> Result<Vec<Topic>> {
        self.manager.list_due_topics().context("Failed to list due topics")
    }

    pub fn find_topic(&self, topic_id: i64) -> Result<Topic> {
        self.manager
            .get_topic_with_tags(topic_id)
            .context("Failed to load topic")?
            .with_context(|| format!("Topic {} not found", topic_id))
    }

    pub fn find_file(&self, file_id: i64) -> Result<FileWithTopics> {
        self.manager
            .get_file(file_id)
            .context("Failed to load file")?
            .with_context(|| format!("File {} not found", file_id))
    }

    pub fn list_files(&self, limit: Option<usize>) -> Result<Vec<FileWithTopics>> {
        self.manager.list_files(limit).context("Failed to list files")
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        self.manager.list_tags().context("Failed to list tags")
    }
}
