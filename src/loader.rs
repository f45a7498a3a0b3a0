//! Layout resolution and caching.
//!
//! A layout is identified by bank, format, direction and record role, and
//! resolved through a [`SchemaSource`] to the text of a JSON resource at
//! `<bank>/<format>/<direction>/<role>.json`. Parsed layouts are cached for
//! the lifetime of the loader; the cache only ever grows, and concurrent
//! loads of one key must agree on its contents.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{CnabError, Result};
use crate::schema::{Direction, Format, RecordRole, RecordSchema};

/// Identity of one layout resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaKey {
    pub bank: String,
    pub format: Format,
    pub direction: Direction,
    pub role: RecordRole,
}

impl SchemaKey {
    pub fn new(
        bank: impl Into<String>,
        format: Format,
        direction: Direction,
        role: RecordRole,
    ) -> Self {
        Self {
            bank: bank.into(),
            format,
            direction,
            role,
        }
    }

    /// Relative path of the resource, e.g. `104/400/remittance/detail.json`.
    pub fn resource_path(&self) -> String {
        format!(
            "{}/{}/{}/{}.json",
            self.bank, self.format, self.direction, self.role
        )
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource_path())
    }
}

/// Where layout resources come from.
pub trait SchemaSource: Send + Sync {
    /// Return the raw text of the resource for `key`.
    ///
    /// A resource that does not exist is a [`CnabError::Schema`].
    fn fetch(&self, key: &SchemaKey) -> Result<String>;
}

macro_rules! builtin_schemas {
    ($($path:literal),* $(,)?) => {
        &[$(($path, include_str!(concat!("../schemas/", $path)))),*]
    };
}

/// Layouts compiled into the library.
static BUILTIN_SCHEMAS: &[(&str, &str)] = builtin_schemas![
    "104/400/remittance/file-header.json",
    "104/400/remittance/detail.json",
    "104/400/remittance/file-trailer.json",
    "104/400/return/file-header.json",
    "104/400/return/detail.json",
    "104/400/return/file-trailer.json",
    "104/240/remittance/file-header.json",
    "104/240/remittance/lot-header.json",
    "104/240/remittance/detail-p.json",
    "104/240/remittance/detail-q.json",
    "104/240/remittance/lot-trailer.json",
    "104/240/remittance/file-trailer.json",
];

/// Source backed by the layouts shipped with the library.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinSource;

impl BuiltinSource {
    /// Paths of every embedded resource.
    pub fn resources() -> impl Iterator<Item = &'static str> {
        BUILTIN_SCHEMAS.iter().map(|(path, _)| *path)
    }
}

impl SchemaSource for BuiltinSource {
    fn fetch(&self, key: &SchemaKey) -> Result<String> {
        let path = key.resource_path();
        BUILTIN_SCHEMAS
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, text)| (*text).to_string())
            .ok_or_else(|| CnabError::schema(path, "resource not found"))
    }
}

/// Source reading a directory tree laid out like the builtin resources.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SchemaSource for DirSource {
    fn fetch(&self, key: &SchemaKey) -> Result<String> {
        let path = self.root.join(key.resource_path());
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(CnabError::schema(
                path.display().to_string(),
                "resource not found",
            )),
            Err(source) => Err(CnabError::Read { path, source }),
        }
    }
}

/// Source holding resources in memory, keyed by resource path.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    resources: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &SchemaKey, text: impl Into<String>) {
        self.resources.insert(key.resource_path(), text.into());
    }

    pub fn with(mut self, key: &SchemaKey, text: impl Into<String>) -> Self {
        self.insert(key, text);
        self
    }
}

impl SchemaSource for MemorySource {
    fn fetch(&self, key: &SchemaKey) -> Result<String> {
        let path = key.resource_path();
        self.resources
            .get(&path)
            .cloned()
            .ok_or_else(|| CnabError::schema(path, "resource not found"))
    }
}

/// Resolves, parses and caches record layouts.
pub struct SchemaLoader {
    source: Box<dyn SchemaSource>,
    cache: RwLock<HashMap<SchemaKey, Arc<RecordSchema>>>,
}

impl SchemaLoader {
    pub fn new(source: impl SchemaSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Loader over the layouts shipped with the library.
    pub fn builtin() -> Self {
        Self::new(BuiltinSource)
    }

    /// Remittance layout of `role` for `bank` in `format`.
    pub fn load(&self, bank: &str, format: Format, role: RecordRole) -> Result<Arc<RecordSchema>> {
        self.load_for(bank, format, Direction::Remittance, role)
    }

    pub fn load_for(
        &self,
        bank: &str,
        format: Format,
        direction: Direction,
        role: RecordRole,
    ) -> Result<Arc<RecordSchema>> {
        self.load_key(&SchemaKey::new(bank, format, direction, role))
    }

    pub fn load_key(&self, key: &SchemaKey) -> Result<Arc<RecordSchema>> {
        if let Some(schema) = self.cache.read().get(key) {
            debug!(resource = %key, "layout served from cache");
            return Ok(Arc::clone(schema));
        }

        // Parse outside the lock; a racing loader may get there first.
        let text = self.source.fetch(key)?;
        let schema = RecordSchema::from_json(&key.resource_path(), &text, key.format.width())?
            .with_role(key.role);
        debug!(
            resource = %key,
            fields = schema.fields().len(),
            "layout parsed"
        );

        Ok(self.remember(key, schema))
    }

    /// Cache `schema` under `key`, keeping an entry that is already there.
    ///
    /// # Panics
    ///
    /// If the cached entry differs from `schema`: one key must always
    /// resolve to one layout.
    fn remember(&self, key: &SchemaKey, schema: RecordSchema) -> Arc<RecordSchema> {
        let mut cache = self.cache.write();
        match cache.entry(key.clone()) {
            Entry::Occupied(entry) => {
                assert_eq!(
                    **entry.get(),
                    schema,
                    "conflicting layouts loaded for {key}"
                );
                Arc::clone(entry.get())
            }
            Entry::Vacant(entry) => Arc::clone(entry.insert(Arc::new(schema))),
        }
    }

    /// Number of layouts parsed so far.
    pub fn cached(&self) -> usize {
        self.cache.read().len()
    }
}

impl fmt::Debug for SchemaLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaLoader")
            .field("cached", &self.cached())
            .finish_non_exhaustive()
    }
}
