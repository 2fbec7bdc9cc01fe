//! Transcript serialization: plain text lines or a JSON record list.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use parlance_core::types::{Turn, TurnRecord};

use crate::error::ChatError;

/// Supported transcript formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// One `role: text` line per turn.
    Text,
    /// Array of `{role, text, timestamp}` records.
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Json => "json",
        }
    }

    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, ChatError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        ext.parse()
    }
}

impl FromStr for ExportFormat {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_start_matches('.').to_ascii_lowercase();
        match normalized.as_str() {
            "txt" | "text" => Ok(ExportFormat::Text),
            "json" => Ok(ExportFormat::Json),
            _ => Err(ChatError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Serialize turns in the requested format. An empty slice yields `""` for
/// text and `[]` for JSON.
pub fn export_turns(turns: &[Turn], format: ExportFormat) -> Result<String, ChatError> {
    match format {
        ExportFormat::Text => Ok(to_text(turns)),
        ExportFormat::Json => to_json(turns),
    }
}

/// Each turn on its own newline-terminated line. Embedded line breaks are
/// written as a literal `\n` so a turn never spans lines.
pub fn to_text(turns: &[Turn]) -> String {
    let mut out = String::new();
    for turn in turns {
        let text = turn.text().replace("\r\n", "\n").replace('\n', "\\n");
        out.push_str(turn.role().as_str());
        out.push_str(": ");
        out.push_str(&text);
        out.push('\n');
    }
    out
}

pub fn to_json(turns: &[Turn]) -> Result<String, ChatError> {
    let records: Vec<TurnRecord> = turns.iter().map(Turn::record).collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

/// Parse a JSON transcript back into records.
pub fn parse_json(json: &str) -> Result<Vec<TurnRecord>, ChatError> {
    Ok(serde_json::from_str(json)?)
}
