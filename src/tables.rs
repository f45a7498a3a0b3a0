//! Bank reference tables: code to description lookups.
//!
//! Each supported bank ships one JSON asset with its payment channels,
//! document species, billing instructions, rejection reasons and occurrence
//! codes, plus the field defaults the bank expects. The registry is built
//! once, on first access, and never changes afterwards; callers get shared
//! `'static` references.
//!
//! Encoding and decoding never consult these tables. They exist so callers
//! can validate input and present codes to people.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::Deserialize;
use tracing::error;

use crate::error::{CnabError, Result};
use crate::record::FieldValue;

/// Reference table assets, keyed by bank COMPE code.
static BUILTIN_TABLES: &[(&str, &str)] = &[("104", include_str!("../tables/104.json"))];

/// Parsed assets; a malformed one keeps its parse error so every lookup of
/// that bank reports it.
type Registry = HashMap<&'static str, std::result::Result<ReferenceTables, String>>;

static REGISTRY: LazyLock<Registry> = LazyLock::new(|| build_registry(BUILTIN_TABLES));

fn build_registry(assets: &[(&'static str, &str)]) -> Registry {
    assets
        .iter()
        .map(|&(bank, text)| {
            let parsed = serde_json::from_str::<ReferenceTables>(text).map_err(|e| {
                error!(bank, error = %e, "malformed reference table asset");
                e.to_string()
            });
            (bank, parsed)
        })
        .collect()
}

fn lookup<'r>(registry: &'r Registry, bank: &str) -> Result<&'r ReferenceTables> {
    match registry.get(bank) {
        Some(Ok(tables)) => Ok(tables),
        Some(Err(reason)) => Err(CnabError::schema(
            format!("tables/{bank}.json"),
            reason.as_str(),
        )),
        None => Err(CnabError::UnknownBank(bank.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableName {
    Channels,
    Species,
    Instructions,
    RejectionCodes,
    RemittanceOccurrences,
    ReturnOccurrences,
}

impl TableName {
    pub const ALL: [TableName; 6] = [
        TableName::Channels,
        TableName::Species,
        TableName::Instructions,
        TableName::RejectionCodes,
        TableName::RemittanceOccurrences,
        TableName::ReturnOccurrences,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TableName::Channels => "channels",
            TableName::Species => "species",
            TableName::Instructions => "instructions",
            TableName::RejectionCodes => "rejection-codes",
            TableName::RemittanceOccurrences => "remittance-occurrences",
            TableName::ReturnOccurrences => "return-occurrences",
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableName {
    type Err = CnabError;

    fn from_str(s: &str) -> Result<Self> {
        TableName::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CnabError::UnknownTable(s.to_string()))
    }
}

/// The reference data of one bank.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ReferenceTables {
    bank: String,
    name: String,
    channels: BTreeMap<String, String>,
    species: BTreeMap<String, String>,
    instructions: BTreeMap<String, String>,
    rejection_codes: BTreeMap<String, String>,
    remittance_occurrences: BTreeMap<String, String>,
    return_occurrences: BTreeMap<String, String>,
    defaults: BTreeMap<String, FieldValue>,
}

impl ReferenceTables {
    /// Tables of the bank with COMPE code `bank`.
    pub fn for_bank(bank: &str) -> Result<&'static ReferenceTables> {
        lookup(&REGISTRY, bank)
    }

    /// COMPE codes of every bank with reference data, sorted.
    pub fn banks() -> Vec<&'static str> {
        let mut banks: Vec<_> = REGISTRY.keys().copied().collect();
        banks.sort_unstable();
        banks
    }

    pub fn bank(&self) -> &str {
        &self.bank
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn codes(&self, table: TableName) -> &BTreeMap<String, String> {
        match table {
            TableName::Channels => &self.channels,
            TableName::Species => &self.species,
            TableName::Instructions => &self.instructions,
            TableName::RejectionCodes => &self.rejection_codes,
            TableName::RemittanceOccurrences => &self.remittance_occurrences,
            TableName::ReturnOccurrences => &self.return_occurrences,
        }
    }

    /// Lookup by table name as written in configuration or on the command line.
    pub fn codes_named(&self, table: &str) -> Result<&BTreeMap<String, String>> {
        Ok(self.codes(table.parse()?))
    }

    pub fn describe(&self, table: TableName, code: &str) -> Option<&str> {
        self.codes(table).get(code).map(String::as_str)
    }

    /// Field values the bank expects when the caller gives none.
    pub fn defaults(&self) -> &BTreeMap<String, FieldValue> {
        &self.defaults
    }
}
