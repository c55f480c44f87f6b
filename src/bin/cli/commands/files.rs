use anyhow::Result;

use crate::app::App;
use crate::render::terminal;
use crate::OutputFormat;

pub fn run_list(
    app: &App,
    limit: Option<usize>,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let files = app.list_files(limit)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&files)?),
        OutputFormat::Plain => {
            if files.is_empty() {
                println!("No files processed yet.");
                return Ok(());
            }

            let now = app.manager.now();
            let rendered: Vec<String> = files
                .iter()
                .map(|f| terminal::render_file(f, now, use_color))
                .collect();
            println!("{}", rendered.join("\n\n"));
        }
    }

    Ok(())
}

pub fn run_show(app: &App, file_id: i64, format: &OutputFormat, use_color: bool) -> Result<()> {
    let file = app.find_file(file_id)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&file)?),
        OutputFormat::Plain => {
            println!("{}", terminal::render_file(&file, app.manager.now(), use_color));
        }
    }

    Ok(())
}
