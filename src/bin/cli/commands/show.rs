use anyhow::Result;

use crate::app::App;
use crate::render::terminal;
use crate::OutputFormat;

pub fn run(app: &App, topic_id: i64, format: &OutputFormat, use_color: bool) -> Result<()> {
    let topic = app.find_topic(topic_id)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&topic)?),
        OutputFormat::Plain => {
            let now = app.manager.now();
            println!("{}", terminal::render_topic_detail(&topic, now, use_color));
        }
    }

    Ok(())
}
