use std::path::Path;

use crate::core::error::BatchError;

/// Parses worklist text into locators. Blank lines are dropped, lines starting
/// with `#` (after leading whitespace) are logged and dropped.
pub fn parse_worklist(contents: &str) -> Vec<String> {
    let mut locators = Vec::new();

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            tracing::info!("Skipping line \"{}\"", comment);
            continue;
        }
        locators.push(line.to_string());
    }

    locators
}

pub async fn load_worklist(path: &Path) -> Result<Vec<String>, BatchError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(BatchError::WorklistNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    Ok(parse_worklist(&contents))
}
