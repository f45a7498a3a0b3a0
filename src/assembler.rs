//! File assembly: ordering records into the CNAB hierarchy and back.
//!
//! A file is a file header, zero or more lots, and a file trailer. In
//! CNAB240 every lot is framed by a lot header and a lot trailer; CNAB400
//! files have no lot records and their details sit directly between the
//! file header and trailer.
//!
//! ```text
//! FILE HEADER
//!   LOT HEADER        (240 only)
//!     DETAIL ...
//!   LOT TRAILER       (240 only)
//! FILE TRAILER
//! ```
//!
//! Lines are joined with CRLF and the joined text is normalized exactly
//! once. Sequence numbers and counters are ordinary fields filled by the
//! caller; the assembler never invents values.

use std::io;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::codec::{decode_line, encode};
use crate::error::{CnabError, Result};
use crate::loader::SchemaLoader;
use crate::normalize::normalize;
use crate::record::Record;
use crate::schema::{Direction, Format, RecordRole, RecordSchema};
use crate::store::FileStore;

/// Separator between lines of a CNAB file.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Column holding the record type in CNAB240 lines.
const CNAB240_TYPE_COLUMN: usize = 7;
/// Column holding the segment letter of CNAB240 detail lines.
const CNAB240_SEGMENT_COLUMN: usize = 13;

/// A group of detail records, framed by a lot header and trailer in CNAB240.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<Record>,
    #[serde(default)]
    pub details: Vec<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailer: Option<Record>,
}

impl Lot {
    /// A CNAB400 lot: details only.
    pub fn details(details: Vec<Record>) -> Self {
        Self {
            header: None,
            details,
            trailer: None,
        }
    }

    /// A CNAB240 lot.
    pub fn framed(header: Record, details: Vec<Record>, trailer: Record) -> Self {
        Self {
            header: Some(header),
            details,
            trailer: Some(trailer),
        }
    }
}

/// Every record of one file, in structural order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecords {
    pub header: Record,
    #[serde(default)]
    pub lots: Vec<Lot>,
    pub trailer: Record,
}

impl FileRecords {
    /// Records in the order they are written.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        let lots = self.lots.iter().flat_map(|lot| {
            lot.header
                .iter()
                .chain(lot.details.iter())
                .chain(lot.trailer.iter())
        });
        std::iter::once(&self.header)
            .chain(lots)
            .chain(std::iter::once(&self.trailer))
    }

    /// Number of lines the file has; never zero, given the header and trailer.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.records().count()
    }
}

/// Builds and parses the files of one bank, format and direction.
#[derive(Debug)]
pub struct FileAssembler<'a> {
    loader: &'a SchemaLoader,
    bank: String,
    format: Format,
    direction: Direction,
}

impl<'a> FileAssembler<'a> {
    pub fn new(
        loader: &'a SchemaLoader,
        bank: impl Into<String>,
        format: Format,
        direction: Direction,
    ) -> Self {
        Self {
            loader,
            bank: bank.into(),
            format,
            direction,
        }
    }

    pub fn bank(&self) -> &str {
        &self.bank
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    fn schema(&self, role: RecordRole) -> Result<Arc<RecordSchema>> {
        self.loader
            .load_for(&self.bank, self.format, self.direction, role)
    }

    /// Encode every record and return the normalized file text.
    ///
    /// Fails on the first record that cannot be encoded; no partial text is
    /// ever returned.
    pub fn build(&self, records: &FileRecords) -> Result<String> {
        self.check_structure(records)?;

        let lines = records
            .records()
            .enumerate()
            .map(|(index, record)| {
                let schema = self.schema(record.role())?;
                let line = encode(&schema, record)?;
                // The record-type and segment columns are plain fields a record
                // can override; the line must still read back as its own role.
                let found = self.classify(&line, index + 1)?;
                if found != record.role() {
                    return Err(CnabError::Layout(format!(
                        "line {}: {} record encodes as a {found} line",
                        index + 1,
                        record.role()
                    )));
                }
                Ok(line)
            })
            .collect::<Result<Vec<_>>>()?;
        let text = normalize(&lines.join(LINE_TERMINATOR))?;

        info!(
            bank = %self.bank,
            format = %self.format,
            direction = %self.direction,
            lines = lines.len(),
            "file built"
        );
        Ok(text)
    }

    /// Split file text into lines, accepting CRLF or LF.
    ///
    /// A trailing terminator does not produce an empty last line. Widths are
    /// not checked here; the decoder does that per line.
    pub fn split(text: &str) -> Vec<&str> {
        let mut lines: Vec<&str> = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect();
        if lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        lines
    }

    /// Decode every line of `text` with the layout its record type selects.
    pub fn parse(&self, text: &str) -> Result<Vec<Record>> {
        Self::split(text)
            .into_iter()
            .enumerate()
            .map(|(index, line)| {
                let number = index + 1;
                let role = self.classify(line, number)?;
                let schema = self.schema(role)?;
                decode_line(&schema, line, number)
            })
            .collect()
    }

    /// Decode `text` and regroup its records into the file hierarchy.
    pub fn parse_file(&self, text: &str) -> Result<FileRecords> {
        group(self.format, self.parse(text)?)
    }

    /// Role of a raw line, read from the format's record-type column.
    pub fn classify(&self, line: &str, number: usize) -> Result<RecordRole> {
        let too_short = || CnabError::LineWidth {
            line: number,
            expected: self.format.width(),
            actual: line.chars().count(),
        };
        let unknown = |kind: char| {
            CnabError::Layout(format!("line {number}: unknown record type '{kind}'"))
        };

        match self.format {
            Format::Cnab400 => match line.chars().next() {
                Some('0') => Ok(RecordRole::FileHeader),
                Some('1') => Ok(RecordRole::detail()),
                Some('9') => Ok(RecordRole::FileTrailer),
                Some(other) => Err(unknown(other)),
                None => Err(too_short()),
            },
            Format::Cnab240 => match line.chars().nth(CNAB240_TYPE_COLUMN) {
                Some('0') => Ok(RecordRole::FileHeader),
                Some('1') => Ok(RecordRole::LotHeader),
                Some('3') => line
                    .chars()
                    .nth(CNAB240_SEGMENT_COLUMN)
                    .map(RecordRole::segment)
                    .ok_or_else(too_short),
                Some('5') => Ok(RecordRole::LotTrailer),
                Some('9') => Ok(RecordRole::FileTrailer),
                Some(other) => Err(unknown(other)),
                None => Err(too_short()),
            },
        }
    }

    /// Build and write the file in a single store operation.
    pub fn save<S>(&self, store: &S, path: &Path, records: &FileRecords) -> Result<()>
    where
        S: FileStore + ?Sized,
    {
        let text = self.build(records)?;
        store.write(path, text.as_bytes())?;
        info!(path = %path.display(), bytes = text.len(), "file saved");
        Ok(())
    }

    /// Read and parse the file at `path`.
    pub fn open<S>(&self, store: &S, path: &Path) -> Result<FileRecords>
    where
        S: FileStore + ?Sized,
    {
        let bytes = store.read(path)?;
        let text = String::from_utf8(bytes).map_err(|e| CnabError::Read {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;
        let records = self.parse_file(&text)?;
        info!(path = %path.display(), records = records.len(), "file loaded");
        Ok(records)
    }

    fn check_structure(&self, records: &FileRecords) -> Result<()> {
        expect_role(&records.header, RecordRole::FileHeader)?;
        expect_role(&records.trailer, RecordRole::FileTrailer)?;

        for (index, lot) in records.lots.iter().enumerate() {
            let number = index + 1;
            if self.format.has_lots() {
                match (&lot.header, &lot.trailer) {
                    (Some(header), Some(trailer)) => {
                        expect_role(header, RecordRole::LotHeader)?;
                        expect_role(trailer, RecordRole::LotTrailer)?;
                    }
                    _ => {
                        return Err(CnabError::Layout(format!(
                            "lot {number}: CNAB240 lots need a lot header and a lot trailer"
                        )));
                    }
                }
            } else if lot.header.is_some() || lot.trailer.is_some() {
                return Err(CnabError::Layout(format!(
                    "lot {number}: CNAB{} files have no lot header or trailer",
                    self.format
                )));
            }

            if let Some(stray) = lot.details.iter().find(|r| !r.role().is_detail()) {
                return Err(CnabError::Layout(format!(
                    "lot {number}: {} record among the details",
                    stray.role()
                )));
            }
        }
        Ok(())
    }
}

fn expect_role(record: &Record, role: RecordRole) -> Result<()> {
    if record.role() == role {
        Ok(())
    } else {
        Err(CnabError::Layout(format!(
            "expected a {role} record, found {}",
            record.role()
        )))
    }
}

/// Rebuild the hierarchy from records in file order.
fn group(format: Format, records: Vec<Record>) -> Result<FileRecords> {
    let mut records = records.into_iter();
    let header = records
        .next()
        .filter(|r| r.role() == RecordRole::FileHeader)
        .ok_or_else(|| CnabError::Layout("file does not start with a file header".to_string()))?;

    let mut body: Vec<Record> = records.collect();
    let trailer = body
        .pop()
        .filter(|r| r.role() == RecordRole::FileTrailer)
        .ok_or_else(|| CnabError::Layout("file does not end with a file trailer".to_string()))?;

    let mut lots = Vec::new();
    if format.has_lots() {
        let mut open: Option<Lot> = None;
        for record in body {
            match record.role() {
                RecordRole::LotHeader => {
                    if open.is_some() {
                        return Err(CnabError::Layout(
                            "lot header found before the previous lot trailer".to_string(),
                        ));
                    }
                    open = Some(Lot {
                        header: Some(record),
                        ..Lot::default()
                    });
                }
                RecordRole::Detail(_) => open
                    .as_mut()
                    .ok_or_else(|| {
                        CnabError::Layout("detail record outside of a lot".to_string())
                    })?
                    .details
                    .push(record),
                RecordRole::LotTrailer => {
                    let mut lot = open.take().ok_or_else(|| {
                        CnabError::Layout("lot trailer without a lot header".to_string())
                    })?;
                    lot.trailer = Some(record);
                    lots.push(lot);
                }
                role => {
                    return Err(CnabError::Layout(format!(
                        "unexpected {role} record inside the file"
                    )));
                }
            }
        }
        if open.is_some() {
            return Err(CnabError::Layout(
                "last lot has no lot trailer".to_string(),
            ));
        }
    } else {
        if let Some(stray) = body.iter().find(|r| !r.role().is_detail()) {
            return Err(CnabError::Layout(format!(
                "unexpected {} record inside the file",
                stray.role()
            )));
        }
        if !body.is_empty() {
            lots.push(Lot::details(body));
        }
    }

    Ok(FileRecords {
        header,
        lots,
        trailer,
    })
}
