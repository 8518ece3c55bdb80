use crate::error::{CliError, Result};
use partsgenie::core::models::protein::{ProteinCatalog, ProteinRecord, ProteinSequence};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct CatalogEntry {
    id: String,
    sequence: String,
    name: Option<String>,
    description: Option<String>,
    organism: Option<String>,
    #[serde(default)]
    ec_numbers: Vec<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    proteins: Vec<CatalogEntry>,
}

/// Reads a TOML list of `[[proteins]]` annotations.
pub fn load_catalog(path: &Path) -> Result<ProteinCatalog> {
    let content = std::fs::read_to_string(path)?;
    let parsed = parse_catalog(&content).map_err(|source| CliError::FileParsing {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), proteins = parsed.len(), "Loaded protein catalog.");
    Ok(parsed)
}

fn parse_catalog(content: &str) -> anyhow::Result<ProteinCatalog> {
    let file: CatalogFile = toml::from_str(content)?;
    file.proteins
        .into_iter()
        .map(|entry| -> anyhow::Result<ProteinRecord> {
            let sequence = ProteinSequence::parse(&entry.id, &entry.sequence)?;
            let mut record = ProteinRecord::new(&entry.id, sequence);
            if let Some(name) = entry.name {
                record.name = name;
            }
            record.description = entry.description;
            record.organism = entry.organism;
            record.ec_numbers = entry.ec_numbers;
            Ok(record)
        })
        .collect()
}
