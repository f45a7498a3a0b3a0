//! Structured record data: field name to value, tagged with its role.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::RecordRole;

/// A raw field value as supplied by the caller or recovered by the decoder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(u64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for FieldValue {
    fn from(n: u64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<u32> for FieldValue {
    fn from(n: u32) -> Self {
        FieldValue::Number(u64::from(n))
    }
}

impl From<u16> for FieldValue {
    fn from(n: u16) -> Self {
        FieldValue::Number(u64::from(n))
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

/// One logical record of a CNAB file.
///
/// Holds only the values the caller supplied; layout defaults are applied
/// by the encoder, not stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    role: RecordRole,
    #[serde(default)]
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new(role: RecordRole) -> Self {
        Self {
            role,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn role(&self) -> RecordRole {
        self.role
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Copy in every default the record does not already set.
    ///
    /// Used with a bank's reference defaults (species, instructions...).
    pub fn fill_defaults(&mut self, defaults: &BTreeMap<String, FieldValue>) {
        for (name, value) in defaults {
            self.fields
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_accessors() {
        let record = Record::new(RecordRole::detail())
            .with("amount", 1500u64)
            .with("payer_name", "Maria");
        assert_eq!(record.role(), RecordRole::detail());
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("amount"), Some(&FieldValue::Number(1500)));
        assert_eq!(record.get("payer_name").unwrap().to_string(), "Maria");
        assert!(record.get("due_date").is_none());
    }

    #[test]
    fn test_fill_defaults_keeps_explicit_values() {
        let mut defaults = BTreeMap::new();
        defaults.insert("species".to_string(), FieldValue::from("01"));
        defaults.insert("instruction1".to_string(), FieldValue::from("02"));

        let mut record = Record::new(RecordRole::detail()).with("species", "02");
        record.fill_defaults(&defaults);

        assert_eq!(record.get("species"), Some(&FieldValue::from("02")));
        assert_eq!(record.get("instruction1"), Some(&FieldValue::from("02")));
    }

    #[test]
    fn test_json_shape() {
        let record = Record::new(RecordRole::segment('P'))
            .with("sequence", 1u64)
            .with("document_number", "NF-1");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"role":"detail-p","fields":{"document_number":"NF-1","sequence":1}}"#
        );
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
