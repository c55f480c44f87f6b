use std::path::Path;

use anyhow::{Context, Result};

use revisu_lib::topics::{NewFile, TopicError};

use crate::app::App;
use crate::render::terminal;
use crate::OutputFormat;

/// File type from the extension, lowercased ("txt" when there is none)
fn detect_file_type(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_else(|| "txt".to_string())
}

pub fn run(
    app: &App,
    path: &Path,
    file_type: Option<&str>,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let full_path = std::fs::canonicalize(path)
        .with_context(|| format!("Failed to resolve {}", path.display()))?;

    let file = NewFile {
        file_path: full_path.to_string_lossy().into_owned(),
        file_name: path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| full_path.to_string_lossy().into_owned()),
        file_type: file_type
            .map(str::to_string)
            .unwrap_or_else(|| detect_file_type(path)),
        original_content: content,
    };

    let processor = app.processor();
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let processed = match runtime.block_on(processor.process_new_file(file)) {
        Ok(processed) => processed,
        Err(TopicError::DuplicateFile(path)) => {
            anyhow::bail!("{} has already been processed", path)
        }
        Err(e) => return Err(e).context("Failed to process file"),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&processed)?),
        OutputFormat::Plain => {
            println!(
                "{}",
                terminal::render_file(&processed, app.manager.now(), use_color)
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_file_type() {
        assert_eq!(detect_file_type(Path::new("notes/cells.MD")), "md");
        assert_eq!(detect_file_type(Path::new("notes/readme")), "txt");
        assert_eq!(detect_file_type(Path::new("a.tar.gz")), "gz");
    }
}
