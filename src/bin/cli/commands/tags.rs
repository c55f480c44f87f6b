use anyhow::Result;

use crate::app::App;
use crate::OutputFormat;

pub fn run(app: &App, format: &OutputFormat) -> Result<()> {
    let mut tags = app.list_tags()?;
    tags.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&tags)?);
        }
        OutputFormat::Plain => {
            if tags.is_empty() {
                println!("No tags found.");
                return Ok(());
            }

            for tag in &tags {
                println!("#{}", tag.name);
            }

            println!("\n{} tags total", tags.len());
        }
    }

    Ok(())
}
