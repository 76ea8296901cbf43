//! Reading definitions from files and strings.

use std::io::BufReader;
use std::path::Path;

use tracing::debug;

use crate::definition::TreeDefinition;
use crate::error::{Result, SchemaError};

/// Parses a JSON definition.
///
/// # Errors
///
/// Returns [`SchemaError::JsonError`] on malformed input or unknown fields.
pub fn from_json_str(text: &str) -> Result<TreeDefinition> {
    Ok(serde_json::from_str(text)?)
}

/// Parses a YAML definition.
///
/// # Errors
///
/// Returns [`SchemaError::YamlError`] on malformed input or unknown fields.
pub fn from_yaml_str(text: &str) -> Result<TreeDefinition> {
    Ok(serde_yaml::from_str(text)?)
}

/// Loads a definition, choosing the format from the file extension
/// (`.json`, `.yaml` or `.yml`).
///
/// # Errors
///
/// Returns [`SchemaError::IoError`] if the file cannot be opened,
/// [`SchemaError::UnsupportedFormat`] for any other extension, or the
/// parser's error.
pub fn load(path: impl AsRef<Path>) -> Result<TreeDefinition> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let definition = match extension.as_deref() {
        Some("json") => {
            let reader = BufReader::new(std::fs::File::open(path)?);
            serde_json::from_reader(reader)?
        }
        Some("yaml" | "yml") => {
            let reader = BufReader::new(std::fs::File::open(path)?);
            serde_yaml::from_reader(reader)?
        }
        _ => return Err(SchemaError::UnsupportedFormat(path.to_path_buf())),
    };
    debug!(path = %path.display(), "loaded tree definition");
    Ok(definition)
}
