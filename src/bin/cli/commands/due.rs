use anyhow::Result;

use crate::app::App;
use crate::render::terminal;
use crate::OutputFormat;

pub fn run(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let topics = app.due_topics()?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&topics)?);
        }
        OutputFormat::Plain => {
            if topics.is_empty() {
                println!("Nothing to review right now.");
                return Ok(());
            }

            let now = app.manager.now();
            for topic in &topics {
                println!("{}", terminal::render_topic_line(topic, now, use_color));
            }
            println!("\n{} topics due", topics.len());
        }
    }

    Ok(())
}
