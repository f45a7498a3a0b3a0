//! # cnab-rs
//!
//! A schema-driven codec for CNAB remittance and return files.
//!
//! CNAB is the family of fixed-width text layouts Brazilian banks use to
//! exchange billing instructions (remittance files, sent to the bank) and
//! processing results (return files, sent back). Every line has the same
//! width, 240 or 400 characters, and every field owns a fixed column range.
//!
//! ## Overview
//!
//! - **Layouts are data**: each bank, format, direction and record role has a
//!   JSON layout resource; bank differences never need code
//! - **Record codec**: field values in, exact-width line out, and back
//! - **File assembly**: header, lots, details and trailers joined by CRLF,
//!   then transliterated to uppercase ASCII in one width-preserving pass
//! - **Reference tables**: per-bank code descriptions for channels, species,
//!   instructions, rejections and occurrences
//!
//! ## Example
//!
//! ```
//! use cnab_rs::{FieldSpec, Record, RecordRole, RecordSchema, encode, normalize};
//!
//! // Layout: code(3, numeric) name(10, alphanumeric)
//! let schema = RecordSchema::new(
//!     13,
//!     vec![
//!         FieldSpec::numeric("code", 0, 3),
//!         FieldSpec::alphanumeric("name", 3, 10),
//!     ],
//! )?;
//!
//! let record = Record::new(RecordRole::detail())
//!     .with("code", 2u64)
//!     .with("name", "João");
//!
//! let line = normalize(&encode(&schema, &record)?)?;
//! assert_eq!(line, "002JOAO      ");
//! # Ok::<(), cnab_rs::CnabError>(())
//! ```

pub mod assembler;
pub mod codec;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod record;
pub mod schema;
pub mod store;
pub mod tables;

pub use assembler::{FileAssembler, FileRecords, LINE_TERMINATOR, Lot};
pub use codec::{decode, encode};
pub use error::{CnabError, Result};
pub use loader::{BuiltinSource, DirSource, MemorySource, SchemaKey, SchemaLoader, SchemaSource};
pub use normalize::{normalize, transliterate};
pub use record::{FieldValue, Record};
pub use schema::{Align, Direction, FieldKind, FieldSpec, Format, Pad, RecordRole, RecordSchema};
pub use store::{FileStore, FsStore, MemoryStore};
pub use tables::{ReferenceTables, TableName};
