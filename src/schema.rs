//! Record layouts: which field lives in which columns, and how it is padded.
//!
//! A layout resource is a JSON document listing the fields of one record:
//!
//! ```text
//! {
//!   "fields": [
//!     {"name": "record_type", "start": 0, "width": 1, "kind": "numeric", "default": 1},
//!     {"name": "payer_name", "start": 1, "width": 40, "kind": "alphanumeric"},
//!     ...
//!   ]
//! }
//! ```
//!
//! - `start` is a 0-based column, `width` a character count
//! - `kind` is `numeric` or `alphanumeric`
//! - `align`/`pad` are optional; numeric fields default to right/zero and
//!   alphanumeric fields to left/space
//! - zero padding is only accepted on right-aligned numeric fields, the one
//!   combination whose padding can be stripped without losing digits
//! - `default` is optional and may be a string or an integer
//!
//! The fields of a record must tile it: no gaps, no overlaps, and the last
//! field ends exactly at the record width.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CnabError, Result};
use crate::record::FieldValue;

/// CNAB layout family, named after its record width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    #[serde(rename = "240")]
    Cnab240,
    #[serde(rename = "400")]
    Cnab400,
}

impl Format {
    /// Record width in characters.
    pub fn width(self) -> usize {
        match self {
            Format::Cnab240 => 240,
            Format::Cnab400 => 400,
        }
    }

    /// Whether detail records are grouped in lots with their own header and trailer.
    pub fn has_lots(self) -> bool {
        matches!(self, Format::Cnab240)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.width())
    }
}

impl FromStr for Format {
    type Err = CnabError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "240" => Ok(Format::Cnab240),
            "400" => Ok(Format::Cnab400),
            other => Err(CnabError::Layout(format!(
                "unsupported format '{other}' (expected 240 or 400)"
            ))),
        }
    }
}

/// Whether a file goes to the bank or comes back from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Remittance,
    Return,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Remittance => "remittance",
            Direction::Return => "return",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = CnabError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remittance" | "remessa" => Ok(Direction::Remittance),
            "return" | "retorno" => Ok(Direction::Return),
            other => Err(CnabError::Layout(format!("unknown direction '{other}'"))),
        }
    }
}

/// Position of a record in the file hierarchy.
///
/// Detail records may carry a segment letter (CNAB240 segments P, Q, T, U...).
/// Serialized as the resource name: `file-header`, `detail`, `detail-p`...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RecordRole {
    FileHeader,
    LotHeader,
    Detail(Option<char>),
    LotTrailer,
    FileTrailer,
}

impl RecordRole {
    /// A detail record without a segment.
    pub fn detail() -> Self {
        RecordRole::Detail(None)
    }

    /// A detail record of the given segment.
    pub fn segment(letter: char) -> Self {
        RecordRole::Detail(Some(letter.to_ascii_uppercase()))
    }

    pub fn is_detail(self) -> bool {
        matches!(self, RecordRole::Detail(_))
    }

    /// Name of the layout resource for this role.
    pub fn resource_name(self) -> String {
        match self {
            RecordRole::FileHeader => "file-header".to_string(),
            RecordRole::LotHeader => "lot-header".to_string(),
            RecordRole::Detail(None) => "detail".to_string(),
            RecordRole::Detail(Some(seg)) => format!("detail-{}", seg.to_ascii_lowercase()),
            RecordRole::LotTrailer => "lot-trailer".to_string(),
            RecordRole::FileTrailer => "file-trailer".to_string(),
        }
    }
}

impl fmt::Display for RecordRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource_name())
    }
}

impl FromStr for RecordRole {
    type Err = CnabError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "file-header" => Ok(RecordRole::FileHeader),
            "lot-header" => Ok(RecordRole::LotHeader),
            "detail" => Ok(RecordRole::Detail(None)),
            "lot-trailer" => Ok(RecordRole::LotTrailer),
            "file-trailer" => Ok(RecordRole::FileTrailer),
            other => {
                let mut seg = other.strip_prefix("detail-").unwrap_or("").chars();
                match (seg.next(), seg.next()) {
                    (Some(letter), None) if letter.is_ascii_alphanumeric() => {
                        Ok(RecordRole::segment(letter))
                    }
                    _ => Err(CnabError::Layout(format!("unknown record role '{other}'"))),
                }
            }
        }
    }
}

impl TryFrom<String> for RecordRole {
    type Error = CnabError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RecordRole> for String {
    fn from(role: RecordRole) -> Self {
        role.resource_name()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Numeric,
    Alphanumeric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pad {
    Zero,
    Space,
}

impl Align {
    pub fn as_str(self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Right => "right",
        }
    }
}

impl Pad {
    pub fn as_str(self) -> &'static str {
        match self {
            Pad::Zero => "zero",
            Pad::Space => "space",
        }
    }

    pub fn char(self) -> char {
        match self {
            Pad::Zero => '0',
            Pad::Space => ' ',
        }
    }
}

/// One column range of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    pub start: usize,
    pub width: usize,
    pub kind: FieldKind,
    pub align: Align,
    pub pad: Pad,
    pub default: Option<FieldValue>,
}

impl FieldSpec {
    /// Digits, right-aligned and zero-padded.
    pub fn numeric(name: impl Into<String>, start: usize, width: usize) -> Self {
        Self {
            name: name.into(),
            start,
            width,
            kind: FieldKind::Numeric,
            align: Align::Right,
            pad: Pad::Zero,
            default: None,
        }
    }

    /// Text, left-aligned and space-padded.
    pub fn alphanumeric(name: impl Into<String>, start: usize, width: usize) -> Self {
        Self {
            name: name.into(),
            start,
            width,
            kind: FieldKind::Alphanumeric,
            align: Align::Left,
            pad: Pad::Space,
            default: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_alignment(mut self, align: Align, pad: Pad) -> Self {
        self.align = align;
        self.pad = pad;
        self
    }

    /// Whether decoding can strip the padding without eating value characters.
    ///
    /// Zero padding is only safe in front of a number: a left-aligned number
    /// would gain trailing zeros and text may legitimately contain zeros.
    pub fn is_reversible(&self) -> bool {
        match (self.kind, self.pad) {
            (_, Pad::Space) => true,
            (FieldKind::Numeric, Pad::Zero) => self.align == Align::Right,
            (FieldKind::Alphanumeric, Pad::Zero) => false,
        }
    }

    /// First column after this field.
    pub fn end(&self) -> usize {
        self.start + self.width
    }
}

/// The complete layout of one record.
///
/// Immutable once built; fields are kept in column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSchema {
    role: RecordRole,
    width: usize,
    fields: Vec<FieldSpec>,
}

impl RecordSchema {
    /// Validate and build a layout of `width` columns.
    pub fn new(width: usize, fields: Vec<FieldSpec>) -> Result<Self> {
        Self::validated("record schema", width, fields)
    }

    /// Parse a JSON layout resource for a record of `width` columns.
    pub fn from_json(resource: &str, text: &str, width: usize) -> Result<Self> {
        let raw: RawSchema = serde_json::from_str(text)
            .map_err(|e| CnabError::schema(resource, format!("invalid JSON: {e}")))?;

        let fields = raw
            .fields
            .into_iter()
            .enumerate()
            .map(|(index, field)| field.resolve(resource, index))
            .collect::<Result<Vec<_>>>()?;

        Self::validated(resource, width, fields)
    }

    fn validated(resource: &str, width: usize, mut fields: Vec<FieldSpec>) -> Result<Self> {
        if width == 0 {
            return Err(CnabError::schema(resource, "record width must be positive"));
        }
        if fields.is_empty() {
            return Err(CnabError::schema(resource, "no fields declared"));
        }

        let mut names = HashSet::new();
        for field in &fields {
            if field.name.is_empty() {
                return Err(CnabError::schema(resource, "field with an empty name"));
            }
            if field.width == 0 {
                return Err(CnabError::schema(
                    resource,
                    format!("field '{}' has zero width", field.name),
                ));
            }
            if field.width > width || field.start > width - field.width {
                return Err(CnabError::schema(
                    resource,
                    format!(
                        "field '{}' at column {} with width {} runs past the record width {}",
                        field.name, field.start, field.width, width
                    ),
                ));
            }
            if !field.is_reversible() {
                return Err(CnabError::schema(
                    resource,
                    format!(
                        "field '{}' cannot be {} aligned with {} padding",
                        field.name,
                        field.align.as_str(),
                        field.pad.as_str()
                    ),
                ));
            }
            if !names.insert(field.name.as_str()) {
                return Err(CnabError::schema(
                    resource,
                    format!("field '{}' declared twice", field.name),
                ));
            }
        }

        fields.sort_by_key(|f| f.start);

        // Strict tiling: each field starts where the previous one ended.
        let mut cursor = 0;
        for field in &fields {
            if field.start < cursor {
                return Err(CnabError::schema(
                    resource,
                    format!(
                        "field '{}' at column {} overlaps the previous field ending at {}",
                        field.name, field.start, cursor
                    ),
                ));
            }
            if field.start > cursor {
                return Err(CnabError::schema(
                    resource,
                    format!(
                        "gap at columns {}..{} before field '{}'",
                        cursor, field.start, field.name
                    ),
                ));
            }
            cursor = field.end();
        }
        if cursor != width {
            return Err(CnabError::schema(
                resource,
                format!("fields cover {cursor} columns, record width is {width}"),
            ));
        }

        Ok(Self {
            role: RecordRole::detail(),
            width,
            fields,
        })
    }

    /// Tag the layout with the record role it describes.
    pub fn with_role(mut self, role: RecordRole) -> Self {
        self.role = role;
        self
    }

    pub fn role(&self) -> RecordRole {
        self.role
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSchema {
    fields: Vec<RawField>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawField {
    name: Option<String>,
    start: Option<usize>,
    width: Option<usize>,
    kind: Option<FieldKind>,
    align: Option<Align>,
    pad: Option<Pad>,
    default: Option<FieldValue>,
}

impl RawField {
    fn resolve(self, resource: &str, index: usize) -> Result<FieldSpec> {
        let label = match &self.name {
            Some(name) => format!("field #{index} ('{name}')"),
            None => format!("field #{index}"),
        };
        let missing =
            |attr: &str| CnabError::schema(resource, format!("{label} is missing '{attr}'"));

        let name = self.name.clone().ok_or_else(|| missing("name"))?;
        let start = self.start.ok_or_else(|| missing("start"))?;
        let width = self.width.ok_or_else(|| missing("width"))?;
        let kind = self.kind.ok_or_else(|| missing("kind"))?;

        let base = match kind {
            FieldKind::Numeric => FieldSpec::numeric(name, start, width),
            FieldKind::Alphanumeric => FieldSpec::alphanumeric(name, start, width),
        };
        Ok(FieldSpec {
            align: self.align.unwrap_or(base.align),
            pad: self.pad.unwrap_or(base.pad),
            default: self.default,
            ..base
        })
    }
}
