//! Universe file — an explicit instrument list for offline or custom screens.
//!
//! Stored as TOML:
//!
//! ```toml
//! [[instruments]]
//! symbol = "000001"
//! name = "平安银行"
//! valuation = 4.9   # optional dynamic P/E
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::provider::{DataError, UniverseProvider, ValuationProvider};
use super::valuation::Valuations;
use crate::domain::{normalize_symbol, Instrument};

/// One entry of the universe file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseEntry {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub valuation: Option<f64>,
}

/// The complete universe file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UniverseFile {
    #[serde(default)]
    pub instruments: Vec<UniverseEntry>,
}

impl UniverseFile {
    /// Load a universe from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DataError::File(format!("read universe file {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse a universe from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, DataError> {
        toml::from_str(content).map_err(|e| DataError::File(format!("parse universe TOML: {e}")))
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

impl UniverseProvider for UniverseFile {
    /// Instruments in file order; later duplicates of a symbol are dropped.
    fn instruments(&self) -> Result<Vec<Instrument>, DataError> {
        let mut seen = HashSet::new();
        Ok(self
            .instruments
            .iter()
            .map(|e| Instrument::new(&e.symbol, e.name.clone()))
            .filter(|inst| !inst.symbol.is_empty() && seen.insert(inst.symbol.clone()))
            .collect())
    }
}

impl ValuationProvider for UniverseFile {
    fn valuations(&self) -> Result<Valuations, DataError> {
        Ok(self
            .instruments
            .iter()
            .filter_map(|e| e.valuation.map(|v| (normalize_symbol(&e.symbol), v)))
            .collect())
    }
}
