//! Output formats.

use serde::{Deserialize, Serialize};

/// Requested artifact format
///
/// Tags outside the closed set parse into [`OutputFormat::Unsupported`],
/// which the renderer skips without error.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OutputFormat {
    /// Comma-separated rows with a header line
    Csv,
    /// Row array as JSON
    Json,
    /// Spreadsheet workbook
    Excel,
    /// Placeholder document
    Pdf,
    /// Anything else, kept verbatim
    Unsupported(String),
}

impl OutputFormat {
    /// Canonical tag
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Excel => "excel",
            Self::Pdf => "pdf",
            Self::Unsupported(name) => name,
        }
    }

    /// File extension, `None` for unsupported formats
    #[must_use]
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Self::Csv => Some("csv"),
            Self::Json => Some("json"),
            Self::Excel => Some("xls"),
            Self::Pdf => Some("pdf"),
            Self::Unsupported(_) => None,
        }
    }

    /// Whether the renderer can produce this format
    #[must_use]
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }
}

impl From<String> for OutputFormat {
    fn from(tag: String) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "csv" => Self::Csv,
            "json" => Self::Json,
            "excel" | "xls" | "xlsx" => Self::Excel,
            "pdf" => Self::Pdf,
            _ => Self::Unsupported(tag),
        }
    }
}

impl From<&str> for OutputFormat {
    fn from(tag: &str) -> Self {
        Self::from(tag.to_string())
    }
}

impl From<OutputFormat> for String {
    fn from(format: OutputFormat) -> Self {
        format.as_str().to_string()
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
