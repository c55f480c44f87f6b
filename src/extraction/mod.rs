//! Content extraction: turning a raw note into topic content with a
//! generative-text service.
//!
//! Extraction is allowed to fail. Callers substitute
//! [`ExtractedContent::fallback`] so that topic creation never depends on
//! the service being reachable or well-behaved.

mod gemini;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use gemini::GeminiExtractor;

/// Most tags kept from a response
pub const MAX_TAGS: usize = 8;

/// Most questions kept from a response
pub const MAX_QUESTIONS: usize = 5;

/// Longest title derived from the note itself
const MAX_DERIVED_TITLE_CHARS: usize = 50;

const DEFAULT_TITLE: &str = "New Topic";
const DEFAULT_SUMMARY: &str = "Summary not found.";
const DEFAULT_TAGS: [&str; 2] = ["untagged", "general"];
const DEFAULT_QUESTIONS: [&str; 2] = [
    "Rephrase your note so questions can be generated.",
    "No questions could be extracted.",
];

const FALLBACK_TITLE: &str = "Extraction failed - default title";
const FALLBACK_SUMMARY: &str =
    "This summary is a placeholder because content extraction failed or returned an invalid format.";
const FALLBACK_TAG: &str = "extraction-error";
const FALLBACK_QUESTION: &str = "Content extraction failed. Process this note again to generate questions.";

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Extraction timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("No API key configured for content extraction")]
    MissingApiKey,
}

pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Title, summary, tags and questions generated for a note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedContent {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub questions: Vec<String>,
}

impl ExtractedContent {
    /// Fixed content used when extraction fails
    pub fn fallback() -> Self {
        Self {
            title: FALLBACK_TITLE.to_string(),
            summary: FALLBACK_SUMMARY.to_string(),
            tags: vec![FALLBACK_TAG.to_string()],
            questions: vec![FALLBACK_QUESTION.to_string()],
        }
    }
}

/// A service that generates topic content from a note
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, content: &str) -> Result<ExtractedContent>;
}

/// Extractor that always returns the same content. Useful offline and in tests.
#[derive(Debug, Clone)]
pub struct StaticExtractor {
    content: ExtractedContent,
}

impl StaticExtractor {
    pub fn new(content: ExtractedContent) -> Self {
        Self { content }
    }
}

#[async_trait]
impl ContentExtractor for StaticExtractor {
    async fn extract(&self, _content: &str) -> Result<ExtractedContent> {
        Ok(self.content.clone())
    }
}

/// Build the instruction sent to the model for a note
pub fn build_prompt(content: &str, max_chars: usize) -> String {
    format!(
        r#"You are a study assistant focused on spaced repetition.
Given the note below, produce a single JSON object with:
1. "title": a concise title for the note's topic.
2. "summary": a detailed summary of the main content.
3. "tags": a list of 5 to 8 relevant keywords.
4. "questions": a list of 3 to 5 open or multiple-choice questions that support active recall.

Respond with valid JSON only.

Note content:
{}"#,
        truncate_chars(content, max_chars)
    )
}

/// The first `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Parse a model response into topic content.
///
/// `note` is the original note, used to derive a title when the response
/// has none. Fails only when the response is not a JSON object; missing or
/// oddly shaped fields fall back to defaults.
pub fn parse_extraction(raw: &str, note: &str) -> Result<ExtractedContent> {
    let json_str = strip_code_fence(raw);
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| ExtractionError::Malformed(format!("invalid JSON: {}", e)))?;

    let Value::Object(fields) = value else {
        return Err(ExtractionError::Malformed("expected a JSON object".to_string()));
    };

    let title = non_empty_str(fields.get("title")).unwrap_or_else(|| derive_title(note));
    let summary = non_empty_str(fields.get("summary")).unwrap_or_else(|| DEFAULT_SUMMARY.to_string());

    let mut questions = string_list(fields.get("questions"), '\n')
        .unwrap_or_else(|| DEFAULT_QUESTIONS.iter().map(|q| q.to_string()).collect());
    questions.truncate(MAX_QUESTIONS);

    let mut tags = string_list(fields.get("tags"), ',')
        .unwrap_or_else(|| DEFAULT_TAGS.iter().map(|t| t.to_string()).collect());
    tags.truncate(MAX_TAGS);

    Ok(ExtractedContent {
        title,
        summary,
        tags,
        questions,
    })
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !(trimmed.starts_with("```") && trimmed.ends_with("```") && trimmed.len() >= 6) {
        return trimmed;
    }

    let inner = &trimmed[3..trimmed.len() - 3];
    // Drop the language tag on the opening line, e.g. ```json
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim()
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A list of strings, or a single string split on `separator`.
///
/// `None` when the field is missing or holds anything else.
fn string_list(value: Option<&Value>, separator: char) -> Option<Vec<String>> {
    let items: Vec<String> = match value? {
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()?,
        Value::String(joined) => joined.split(separator).map(str::to_string).collect(),
        _ => return None,
    };

    Some(
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

fn derive_title(note: &str) -> String {
    let first_line = note.lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        truncate_chars(first_line, MAX_DERIVED_TITLE_CHARS).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTE: &str = "Photosynthesis basics\nPlants convert light into chemical energy.";

    #[test]
    fn test_parse_plain_json() {
        let raw = r#"{
            "title": "Photosynthesis",
            "summary": "Plants turn light into sugar.",
            "tags": ["biology", "plants"],
            "questions": ["What is chlorophyll?", "Where does it happen?"]
        }"#;

        let parsed = parse_extraction(raw, NOTE).unwrap();

        assert_eq!(parsed.title, "Photosynthesis");
        assert_eq!(parsed.summary, "Plants turn light into sugar.");
        assert_eq!(parsed.tags, vec!["biology", "plants"]);
        assert_eq!(parsed.questions.len(), 2);
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "```json\n{\"title\": \"Cells\", \"summary\": \"s\", \"tags\": [\"a\"], \"questions\": [\"q\"]}\n```";

        let parsed = parse_extraction(raw, NOTE).unwrap();
        assert_eq!(parsed.title, "Cells");

        let bare_fence = "```\n{\"title\": \"Cells\"}\n```";
        assert_eq!(parse_extraction(bare_fence, NOTE).unwrap().title, "Cells");
    }

    #[test]
    fn test_parse_string_lists() {
        let raw = r#"{
            "title": "T",
            "summary": "S",
            "tags": "biology, plants , ,energy",
            "questions": "What is light?\n\nWhy green?\n"
        }"#;

        let parsed = parse_extraction(raw, NOTE).unwrap();

        assert_eq!(parsed.tags, vec!["biology", "plants", "energy"]);
        assert_eq!(parsed.questions, vec!["What is light?", "Why green?"]);
    }

    #[test]
    fn test_parse_missing_fields_use_defaults() {
        let parsed = parse_extraction("{}", NOTE).unwrap();

        assert_eq!(parsed.title, "Photosynthesis basics");
        assert_eq!(parsed.summary, DEFAULT_SUMMARY);
        assert_eq!(parsed.tags, vec!["untagged", "general"]);
        assert_eq!(parsed.questions.len(), 2);

        assert_eq!(parse_extraction("{}", "").unwrap().title, DEFAULT_TITLE);
    }

    #[test]
    fn test_parse_mixed_list_uses_defaults() {
        let parsed = parse_extraction(r#"{"tags": ["ok", 3], "questions": 7}"#, NOTE).unwrap();

        assert_eq!(parsed.tags, vec!["untagged", "general"]);
        assert_eq!(parsed.questions[0], DEFAULT_QUESTIONS[0]);
    }

    #[test]
    fn test_parse_caps_list_lengths() {
        let tags: Vec<String> = (0..12).map(|i| format!("tag{}", i)).collect();
        let questions: Vec<String> = (0..9).map(|i| format!("q{}?", i)).collect();
        let raw = serde_json::json!({ "title": "T", "tags": tags, "questions": questions }).to_string();

        let parsed = parse_extraction(&raw, NOTE).unwrap();
        assert_eq!(parsed.tags.len(), MAX_TAGS);
        assert_eq!(parsed.questions.len(), MAX_QUESTIONS);
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(matches!(
            parse_extraction("Sure! Here is your summary.", NOTE),
            Err(ExtractionError::Malformed(_))
        ));
        assert!(matches!(
            parse_extraction("[1, 2]", NOTE),
            Err(ExtractionError::Malformed(_))
        ));
    }

    #[test]
    fn test_derived_title_is_truncated() {
        let note = "x".repeat(80);
        let parsed = parse_extraction("{}", &note).unwrap();
        assert_eq!(parsed.title.chars().count(), MAX_DERIVED_TITLE_CHARS);
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_build_prompt_truncates_note() {
        let note = "a".repeat(5000);
        let prompt = build_prompt(&note, 3000);
        assert!(prompt.ends_with(&"a".repeat(3000)));
        assert!(!prompt.contains(&"a".repeat(3001)));
    }

    #[test]
    fn test_fallback_content() {
        let fallback = ExtractedContent::fallback();
        assert_eq!(fallback.tags, vec![FALLBACK_TAG]);
        assert_eq!(fallback.questions.len(), 1);
        assert!(!fallback.title.is_empty());
    }

    #[tokio::test]
    async fn test_static_extractor() {
        let content = ExtractedContent {
            title: "Fixed".to_string(),
            summary: "Always the same".to_string(),
            tags: vec!["static".to_string()],
            questions: vec!["Is it fixed?".to_string()],
        };
        let extractor = StaticExtractor::new(content.clone());

        assert_eq!(extractor.extract("anything").await.unwrap(), content);
    }
}
