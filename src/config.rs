//! Source and sink settings.
//!
//! These replace process-wide flag state: the binary fills them in from its
//! command line and passes them by value to `CsvSource` and `CsvSink`.

use crate::error::{PipelineError, Result};

/// Settings for reading delimited input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceConfig {
    /// Field separator byte.
    pub delimiter: u8,
    /// Tolerate quotes that do not follow the strict quoting rules.
    pub lazy_quotes: bool,
    /// Reject rows whose width differs from the first row.
    pub strict_len: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            delimiter: b',',
            lazy_quotes: false,
            strict_len: false,
        }
    }
}

/// Settings for writing delimited output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    pub delimiter: u8,
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig { delimiter: b',' }
    }
}

/// Parse a separator argument into a delimiter byte.
///
/// Only the first character is used. `\t` and `tab` mean a tab.
pub fn parse_delimiter(arg: &str) -> Result<u8> {
    if arg == "\\t" || arg.eq_ignore_ascii_case("tab") {
        return Ok(b'\t');
    }
    match arg.chars().next() {
        Some(c) if c.is_ascii() => Ok(c as u8),
        _ => Err(PipelineError::InvalidDelimiter(arg.to_string())),
    }
}
