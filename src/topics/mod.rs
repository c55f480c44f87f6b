//! Topics and spaced repetition for revisu
//!
//! This module provides:
//! - Topic, tag and file records
//! - SM-2 review scheduling
//! - SQLite storage for files, topics and tags
//! - The lifecycle manager that ties scheduling to storage

pub mod algorithm;
pub mod manager;
pub mod models;
pub mod storage;

pub use algorithm::{compute_next_review, InvalidQuality, Quality, ReviewOutcome};
pub use manager::{TopicError, TopicManager};
pub use models::*;
pub use storage::{StorageError, TopicStorage};
