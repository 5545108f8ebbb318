//! File-name identifier parsing
//!
//! A file selected for attachment is matched to a database record through an
//! identifying field (e.g. a catalog number). The identifier is read from the
//! file name: the extension is stripped, surrounding whitespace trimmed and
//! the configured [`IdentifierFormat`] applied.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How the identifying field is formatted on the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdentifierFormat {
    /// Any non-empty stem is taken verbatim
    #[default]
    Text,
    /// ASCII digits, left-padded with zeros to `width`
    Numeric {
        /// Total width of the formatted value
        width: usize,
    },
}

impl fmt::Display for IdentifierFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierFormat::Text => write!(f, "text"),
            IdentifierFormat::Numeric { width } => write!(f, "numeric({width})"),
        }
    }
}

impl IdentifierFormat {
    /// Parses an identifier out of a file name
    ///
    /// Returns `None` when the name does not conform to the format.
    pub fn parse_file_name(&self, file_name: &str) -> Option<String> {
        let stem = strip_extension(file_name).trim();
        if stem.is_empty() {
            return None;
        }

        match self {
            IdentifierFormat::Text => Some(stem.to_string()),
            IdentifierFormat::Numeric { width } => {
                if !stem.chars().all(|c| c.is_ascii_digit()) || stem.len() > *width {
                    return None;
                }
                Some(format!("{stem:0>width$}", width = *width))
            }
        }
    }
}

/// Removes the final `.ext` segment, keeping dot-files intact
fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(pos) => &file_name[..pos],
    }
}
