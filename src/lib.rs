//! Spaced-repetition review of personal notes.
//!
//! Uploaded notes are condensed into topics by a content extractor and
//! scheduled with the SM-2 algorithm. Topics, files and tags live in a
//! single SQLite database.

pub mod clock;
pub mod config;
pub mod extraction;
pub mod pipeline;
pub mod topics;
