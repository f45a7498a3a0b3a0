use std::path::Path;

use cnab_rs::{
    CnabError, Direction, DirSource, FileAssembler, FileRecords, FileStore, Format,
    ReferenceTables, SchemaLoader, TableName,
};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Cnab(#[from] CnabError),

    #[error("invalid records document {path}: {source}")]
    Records {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot serialize output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Which layouts a command works with.
#[derive(Debug, Clone)]
pub struct Layout {
    pub bank: String,
    pub format: Format,
    pub direction: Direction,
}

impl Layout {
    fn assembler<'a>(&self, loader: &'a SchemaLoader) -> FileAssembler<'a> {
        FileAssembler::new(loader, self.bank.clone(), self.format, self.direction)
    }
}

/// Builtin layouts, or a directory tree of layout resources when given.
pub fn loader_for(schema_dir: Option<&Path>) -> SchemaLoader {
    match schema_dir {
        Some(dir) => {
            debug!(dir = %dir.display(), "loading layouts from directory");
            SchemaLoader::new(DirSource::new(dir))
        }
        None => SchemaLoader::builtin(),
    }
}

/// Encode the JSON records document at `input` into the CNAB file `output`.
///
/// With `bank_defaults`, detail records get the bank's default values for
/// any field they leave unset. Returns the number of lines written.
pub fn encode_file<S>(
    loader: &SchemaLoader,
    layout: &Layout,
    store: &S,
    input: &Path,
    output: &Path,
    bank_defaults: bool,
) -> Result<usize, CliError>
where
    S: FileStore + ?Sized,
{
    let bytes = store.read(input)?;
    let mut records: FileRecords =
        serde_json::from_slice(&bytes).map_err(|source| CliError::Records {
            path: input.display().to_string(),
            source,
        })?;

    if bank_defaults {
        let defaults = ReferenceTables::for_bank(&layout.bank)?.defaults();
        for detail in records.lots.iter_mut().flat_map(|lot| lot.details.iter_mut()) {
            detail.fill_defaults(defaults);
        }
    }

    layout.assembler(loader).save(store, output, &records)?;
    info!(
        input = %input.display(),
        output = %output.display(),
        lines = records.len(),
        "encoded"
    );
    Ok(records.len())
}

/// Decode the CNAB file at `input` and render its records as JSON.
pub fn decode_file<S>(
    loader: &SchemaLoader,
    layout: &Layout,
    store: &S,
    input: &Path,
    pretty: bool,
) -> Result<String, CliError>
where
    S: FileStore + ?Sized,
{
    let records = layout.assembler(loader).open(store, input)?;
    let json = if pretty {
        serde_json::to_string_pretty(&records)?
    } else {
        serde_json::to_string(&records)?
    };
    Ok(json)
}

/// Render one reference table, or all of them with the bank defaults.
pub fn show_tables(bank: &str, table: Option<&str>) -> Result<String, CliError> {
    let tables = ReferenceTables::for_bank(bank)?;
    let value = match table {
        Some(name) => serde_json::to_value(tables.codes_named(name)?)?,
        None => {
            let mut all = serde_json::Map::new();
            for name in TableName::ALL {
                all.insert(
                    name.as_str().to_string(),
                    serde_json::to_value(tables.codes(name))?,
                );
            }
            all.insert(
                "defaults".to_string(),
                serde_json::to_value(tables.defaults())?,
            );
            serde_json::Value::Object(all)
        }
    };
    Ok(serde_json::to_string_pretty(&value)?)
}
