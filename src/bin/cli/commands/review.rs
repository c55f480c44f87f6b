use anyhow::{Context, Result};

use revisu_lib::topics::TopicError;

use crate::app::App;
use crate::render::terminal;
use crate::OutputFormat;

pub fn run(
    app: &App,
    topic_id: i64,
    quality: i32,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let next_review = match app.manager.submit_review(topic_id, quality) {
        Ok(next) => next,
        Err(TopicError::TopicNotFound(id)) => anyhow::bail!("Topic {} not found", id),
        Err(TopicError::InvalidQuality(e)) => anyhow::bail!("{}", e),
        Err(e) => return Err(e).context("Failed to record review"),
    };

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "topicId": topic_id,
                "quality": quality,
                "nextReview": next_review,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            let color = if quality < 3 {
                terminal::Color::RED
            } else {
                terminal::Color::GREEN
            };
            println!(
                "Review recorded. Next review {}",
                terminal::paint(&terminal::format_time(next_review), color, use_color)
            );
        }
    }

    Ok(())
}
