//! Line-delimited JSON persistence.
//!
//! One serialized row per line, trailing newline after the last row. Blank
//! lines are tolerated on read; anything else that fails to parse reports
//! its 1-based line number.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Failure while reading or writing a JSONL file.
#[derive(Debug, thiserror::Error)]
pub enum JsonlError {
    /// Filesystem trouble.
    #[error("jsonl io: {0}")]
    Io(#[from] std::io::Error),

    /// A row that would not serialize, or a line that would not parse.
    #[error("jsonl line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Read every row of a JSONL file into memory.
pub async fn read_jsonl<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>, JsonlError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let mut rows = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row = serde_json::from_str(line).map_err(|source| JsonlError::Line {
            line: idx + 1,
            source,
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Write rows to a JSONL file, creating parent directories as needed.
/// An existing file is replaced wholesale.
pub async fn write_jsonl<T: Serialize>(
    path: impl AsRef<Path>,
    rows: &[T],
) -> Result<(), JsonlError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut out = String::new();
    for (idx, row) in rows.iter().enumerate() {
        let line = serde_json::to_string(row).map_err(|source| JsonlError::Line {
            line: idx + 1,
            source,
        })?;
        out.push_str(&line);
        out.push('\n');
    }
    tokio::fs::write(path, out).await?;
    Ok(())
}
