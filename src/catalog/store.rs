//! Persistence for the collection maps.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::catalog::Collection;
use crate::error::Result;
use crate::exchange::{ExchangeId, Symbol};

/// File holding the multi-venue map.
pub const COLLECTIONS_FILE: &str = "collections.json";

/// File holding the single-venue map.
pub const SINGLETONS_FILE: &str = "singularly_available_markets.json";

/// Reads and writes the two collection JSON files under one directory.
#[derive(Debug, Clone)]
pub struct CollectionStore {
    dir: PathBuf,
}

impl CollectionStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn collections_path(&self) -> PathBuf {
        self.dir.join(COLLECTIONS_FILE)
    }

    #[must_use]
    pub fn singletons_path(&self) -> PathBuf {
        self.dir.join(SINGLETONS_FILE)
    }

    /// Persist both maps.
    pub fn write(&self, collection: &Collection) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        write_json(&self.collections_path(), collection.markets())?;
        write_json(&self.singletons_path(), collection.singletons())?;
        debug!(dir = %self.dir.display(), "Persisted collection");
        Ok(())
    }

    /// Load the persisted collection.
    ///
    /// Returns `Ok(None)` when either file is missing so callers fall
    /// back to a live build; a present-but-unparseable file is an
    /// error.
    pub fn load(&self) -> Result<Option<Collection>> {
        let collections_path = self.collections_path();
        let singletons_path = self.singletons_path();
        if !collections_path.exists() || !singletons_path.exists() {
            debug!(dir = %self.dir.display(), "No persisted collection");
            return Ok(None);
        }

        let markets: HashMap<Symbol, Vec<ExchangeId>> =
            serde_json::from_str(&std::fs::read_to_string(collections_path)?)?;
        let singletons: HashMap<Symbol, ExchangeId> =
            serde_json::from_str(&std::fs::read_to_string(singletons_path)?)?;
        Ok(Some(Collection::from_parts(markets, singletons)))
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    std::fs::write(path, json)?;
    Ok(())
}
