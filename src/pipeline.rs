//! Note processing: store an uploaded note, extract its content and create
//! the topic that schedules it for review.

use std::sync::Arc;
use std::time::Duration;

use crate::extraction::{ContentExtractor, ExtractedContent, ExtractionError};
use crate::topics::{FileWithTopics, NewFile, NewTopic, TopicError, TopicManager};

/// Runs uploaded notes through extraction into topics.
pub struct NoteProcessor {
    manager: Arc<TopicManager>,
    extractor: Arc<dyn ContentExtractor>,
    timeout: Duration,
}

impl NoteProcessor {
    pub fn new(
        manager: Arc<TopicManager>,
        extractor: Arc<dyn ContentExtractor>,
        timeout: Duration,
    ) -> Self {
        Self {
            manager,
            extractor,
            timeout,
        }
    }

    pub fn manager(&self) -> &TopicManager {
        &self.manager
    }

    /// Store a new file and create its topic.
    ///
    /// The file row is committed before extraction starts, so it survives
    /// if this future is dropped part way. Extraction failures never fail
    /// the call; the topic gets fallback content instead. Database work runs
    /// on the blocking pool.
    pub async fn process_new_file(&self, file: NewFile) -> Result<FileWithTopics, TopicError> {
        let record = {
            let file = file.clone();
            self.with_manager(move |manager| manager.register_file(&file))
                .await?
        };

        let content = self.extract_or_fallback(&file.original_content).await;

        let new_topic = NewTopic {
            file_id: record.id,
            title: content.title,
            summary: content.summary,
            questions: content.questions,
            tags: content.tags,
        };
        let topic = self
            .with_manager(move |manager| manager.create_topic(&new_topic))
            .await?;

        Ok(FileWithTopics {
            file: record,
            topics: vec![topic],
        })
    }

    async fn with_manager<T, F>(&self, f: F) -> Result<T, TopicError>
    where
        T: Send + 'static,
        F: FnOnce(&TopicManager) -> Result<T, TopicError> + Send + 'static,
    {
        let manager = Arc::clone(&self.manager);
        tokio::task::spawn_blocking(move || f(&manager)).await?
    }

    /// Extract content under the configured timeout, substituting the
    /// fallback on any failure
    pub async fn extract_or_fallback(&self, note: &str) -> ExtractedContent {
        let error = match tokio::time::timeout(self.timeout, self.extractor.extract(note)).await {
            Ok(Ok(content)) => return content,
            Ok(Err(e)) => e,
            Err(_) => ExtractionError::Timeout(self.timeout),
        };

        log::warn!("Content extraction failed, using fallback content: {}", error);
        ExtractedContent::fallback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::extraction::StaticExtractor;
    use crate::topics::TopicStorage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingExtractor;

    #[async_trait]
    impl ContentExtractor for FailingExtractor {
        async fn extract(&self, _content: &str) -> crate::extraction::Result<ExtractedContent> {
            Err(ExtractionError::Malformed("not json".to_string()))
        }
    }

    struct HangingExtractor;

    #[async_trait]
    impl ContentExtractor for HangingExtractor {
        async fn extract(&self, _content: &str) -> crate::extraction::Result<ExtractedContent> {
            std::future::pending().await
        }
    }

    #[derive(Default)]
    struct CountingExtractor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ContentExtractor for CountingExtractor {
        async fn extract(&self, _content: &str) -> crate::extraction::Result<ExtractedContent> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(sample_content())
        }
    }

    fn sample_content() -> ExtractedContent {
        ExtractedContent {
            title: "Plate tectonics".to_string(),
            summary: "The lithosphere is split into moving plates.".to_string(),
            tags: vec!["geology".to_string(), "earth".to_string()],
            questions: vec![
                "What drives plate motion?".to_string(),
                "What happens at a subduction zone?".to_string(),
            ],
        }
    }

    fn note(path: &str) -> NewFile {
        NewFile {
            file_path: path.to_string(),
            file_name: "tectonics.md".to_string(),
            file_type: "md".to_string(),
            original_content: "Plates move a few centimetres a year.".to_string(),
        }
    }

    fn processor(extractor: Arc<dyn ContentExtractor>, timeout: Duration) -> NoteProcessor {
        let storage = TopicStorage::open_in_memory().unwrap();
        let manager = Arc::new(TopicManager::new(storage, Arc::new(SystemClock)));
        NoteProcessor::new(manager, extractor, timeout)
    }

    #[tokio::test]
    async fn test_process_new_file() {
        let processor = processor(
            Arc::new(StaticExtractor::new(sample_content())),
            Duration::from_secs(5),
        );

        let processed = processor.process_new_file(note("notes/tectonics.md")).await.unwrap();

        assert_eq!(processed.file.file_path, "notes/tectonics.md");
        assert_eq!(processed.topics.len(), 1);
        let topic = &processed.topics[0];
        assert_eq!(topic.title, "Plate tectonics");
        assert_eq!(topic.tags, vec!["earth", "geology"]);
        assert_eq!(topic.questions.len(), 2);
        assert_eq!(topic.repetitions, 0);

        let stored = processor.manager().get_file(processed.file.id).unwrap().unwrap();
        assert_eq!(stored.topics, processed.topics);
    }

    #[tokio::test]
    async fn test_extraction_failure_uses_fallback() {
        let processor = processor(Arc::new(FailingExtractor), Duration::from_secs(5));

        let processed = processor.process_new_file(note("notes/a.md")).await.unwrap();

        let fallback = ExtractedContent::fallback();
        assert_eq!(processed.topics[0].title, fallback.title);
        assert_eq!(processed.topics[0].tags, fallback.tags);
        assert_eq!(processed.topics[0].questions, fallback.questions);
    }

    #[tokio::test]
    async fn test_extraction_timeout_uses_fallback() {
        let processor = processor(Arc::new(HangingExtractor), Duration::from_millis(20));

        let processed = processor.process_new_file(note("notes/slow.md")).await.unwrap();

        assert_eq!(processed.topics[0].title, ExtractedContent::fallback().title);
        assert_eq!(processor.manager().list_files(None).unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_processing() {
        let processor = Arc::new(processor(
            Arc::new(StaticExtractor::new(sample_content())),
            Duration::from_secs(5),
        ));

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let processor = Arc::clone(&processor);
                tokio::spawn(async move {
                    processor
                        .process_new_file(note(&format!("notes/{}.md", i)))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let files = processor.manager().list_files(None).unwrap();
        assert_eq!(files.len(), 6);
        assert!(files.iter().all(|f| f.topics.len() == 1));
        assert_eq!(processor.manager().list_tags().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_file_skips_extraction() {
        let extractor = Arc::new(CountingExtractor::default());
        let processor = processor(extractor.clone(), Duration::from_secs(5));

        processor.process_new_file(note("notes/dup.md")).await.unwrap();
        let err = processor.process_new_file(note("notes/dup.md")).await.unwrap_err();

        assert!(matches!(err, TopicError::DuplicateFile(_)));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    }
}
