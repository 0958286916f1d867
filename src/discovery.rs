//! Directory-based unit discovery shared by the controller and model registries.

use crate::error::{CrudrouteError, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Extension recognized for controller and model units.
pub const MANIFEST_EXTENSION: &str = "toml";

/// A loadable file found in a unit directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    /// File stem, used as the registration name.
    pub name: String,
    pub path: PathBuf,
}

/// List the units in `dir` whose extension is `extension`.
///
/// Dot-files and anything that is not a regular file are skipped. The result
/// is sorted by file name so registration order does not depend on the
/// platform's directory listing order.
pub fn discover_units(dir: &Path, extension: &str) -> Result<Vec<Unit>> {
    let read_err = |source| CrudrouteError::Discovery {
        path: dir.to_path_buf(),
        source,
    };

    let mut units = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            tracing::warn!("Skipping non UTF-8 file name in {}", dir.display());
            continue;
        };
        if file_name.starts_with('.') || !entry.file_type().map_err(read_err)?.is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        units.push(Unit {
            name: name.to_string(),
            path,
        });
    }

    units.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(units)
}

/// Parse a TOML unit manifest.
pub fn read_manifest<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)?;
    toml::from_str(&raw).map_err(|source| CrudrouteError::Manifest {
        path: path.to_path_buf(),
        source,
    })
}
