use chrono::{DateTime, Utc};

use revisu_lib::topics::algorithm::{format_interval, preview_intervals};
use revisu_lib::topics::{FileWithTopics, Topic};

/// ANSI color codes
#[allow(dead_code)]
pub struct Color;

#[allow(dead_code)]
impl Color {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
}

pub fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color, text, Color::RESET)
    } else {
        text.to_string()
    }
}

pub fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Relative due time, e.g. "due", "in 3d"
pub fn due_label(topic: &Topic, now: DateTime<Utc>) -> String {
    if topic.is_due(now) {
        "due".to_string()
    } else {
        format!("in {}", format_interval(topic.next_review_date - now))
    }
}

fn format_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|t| format!("#{}", t))
        .collect::<Vec<_>>()
        .join(" ")
}

/// One-line summary of a topic
pub fn render_topic_line(topic: &Topic, now: DateTime<Utc>, use_color: bool) -> String {
    let label = due_label(topic, now);
    let label_color = if topic.is_due(now) { Color::YELLOW } else { Color::DIM };

    let mut line = format!(
        "{:>5}  {:<40} {:<10}",
        topic.id,
        topic.title,
        paint(&label, label_color, use_color)
    );
    if !topic.tags.is_empty() {
        line.push(' ');
        line.push_str(&paint(&format_tags(&topic.tags), Color::DIM, use_color));
    }
    line
}

/// Full topic view with questions and the interval each rating would give
pub fn render_topic_detail(topic: &Topic, now: DateTime<Utc>, use_color: bool) -> String {
    let mut lines = vec![paint(&topic.title, Color::BOLD, use_color)];

    if !topic.tags.is_empty() {
        lines.push(paint(&format_tags(&topic.tags), Color::DIM, use_color));
    }

    lines.push(String::new());
    lines.push(topic.summary.clone());

    if !topic.questions.is_empty() {
        lines.push(String::new());
        lines.push(paint("Questions", Color::BOLD, use_color));
        for (i, question) in topic.questions.iter().enumerate() {
            lines.push(format!("  {}. {}", i + 1, question));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Next review:  {} ({})",
        format_time(topic.next_review_date),
        due_label(topic, now)
    ));
    lines.push(format!(
        "Last review:  {}",
        topic
            .last_reviewed
            .map(format_time)
            .unwrap_or_else(|| "never".to_string())
    ));
    lines.push(format!(
        "Repetitions:  {}   Ease: {:.2}",
        topic.repetitions, topic.ease_factor
    ));

    let preview = preview_intervals(topic.review_state(), now)
        .iter()
        .enumerate()
        .map(|(quality, interval)| {
            let text = format!("{}={}", quality, format_interval(*interval));
            let color = if quality < 3 { Color::RED } else { Color::GREEN };
            paint(&text, color, use_color)
        })
        .collect::<Vec<_>>()
        .join("  ");
    lines.push(format!("If rated:     {}", preview));

    lines.join("\n")
}

/// A file header followed by its topics
pub fn render_file(file: &FileWithTopics, now: DateTime<Utc>, use_color: bool) -> String {
    let mut lines = vec![format!(
        "{} {}  {}",
        paint(&format!("[{}]", file.file.id), Color::CYAN, use_color),
        paint(&file.file.file_name, Color::BOLD, use_color),
        paint(
            &format!("{} · {}", file.file.file_type, format_time(file.file.processed_at)),
            Color::DIM,
            use_color
        ),
    )];

    if file.topics.is_empty() {
        lines.push("       (no topics)".to_string());
    }
    for topic in &file.topics {
        lines.push(render_topic_line(topic, now, use_color));
    }

    lines.join("\n")
}
