//! Error type shared by every stage of the codec.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading layouts, encoding, decoding or moving files.
#[derive(Error, Debug)]
pub enum CnabError {
    /// A layout resource is missing, unparseable or violates the tiling rules.
    #[error("schema error in {resource}: {reason}")]
    Schema { resource: String, reason: String },

    /// A field has no value in the record and no default in the layout.
    #[error("missing value for field '{field}'")]
    MissingField { field: String },

    /// A numeric value has more digits than its column allows.
    #[error("value {value:?} does not fit field '{field}' (width {width})")]
    FieldOverflow {
        field: String,
        value: String,
        width: usize,
    },

    /// A numeric field received something other than digits.
    #[error("field '{field}' expects digits, got {value:?}")]
    InvalidNumeric { field: String, value: String },

    /// Alphanumeric text carrying a control character such as CR or LF.
    #[error("field '{field}' contains control character {ch:?} at offset {offset}")]
    ControlCharacter {
        field: String,
        ch: char,
        offset: usize,
    },

    /// A line handed to the decoder does not match the record width.
    #[error("line {line} has width {actual}, expected {expected}")]
    LineWidth {
        line: usize,
        expected: usize,
        actual: usize,
    },

    /// A character has no single-character ASCII equivalent.
    #[error("cannot transliterate {ch:?} at offset {offset} to a single ASCII character")]
    Transliteration { ch: char, offset: usize },

    #[error("unknown bank '{0}'")]
    UnknownBank(String),

    #[error("unknown reference table '{0}'")]
    UnknownTable(String),

    /// Records placed where the file structure does not allow them.
    #[error("layout error: {0}")]
    Layout(String),

    #[error("unable to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CnabError {
    pub(crate) fn schema(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            resource: resource.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CnabError>;
