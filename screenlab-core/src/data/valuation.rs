//! Read-only valuation snapshot shared by every screening task.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::provider::{DataError, ValuationProvider};
use crate::domain::normalize_symbol;

/// Dynamic valuation ratio (P/E TTM-style) per symbol.
///
/// Built once before the screen starts and never mutated afterwards.
/// Non-finite ratios are stored but read back as missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Valuations {
    ratios: HashMap<String, f64>,
}

impl Valuations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: &str, ratio: f64) {
        self.ratios.insert(normalize_symbol(symbol), ratio);
    }

    /// The ratio for `symbol`, or `None` if absent or not a finite number.
    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.ratios
            .get(symbol)
            .copied()
            .filter(|r| r.is_finite())
    }

    pub fn len(&self) -> usize {
        self.ratios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratios.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<(S, f64)> for Valuations {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut valuations = Valuations::new();
        for (symbol, ratio) in iter {
            valuations.insert(symbol.as_ref(), ratio);
        }
        valuations
    }
}

/// Valuation overrides stored as TOML:
///
/// ```toml
/// [valuations]
/// "000001" = 5.1
/// "600519" = 28.4
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuationsFile {
    #[serde(default)]
    pub valuations: HashMap<String, f64>,
}

impl ValuationsFile {
    pub fn from_file(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DataError::File(format!("read valuations file {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, DataError> {
        toml::from_str(content)
            .map_err(|e| DataError::File(format!("parse valuations TOML: {e}")))
    }
}

impl ValuationProvider for ValuationsFile {
    fn valuations(&self) -> Result<Valuations, DataError> {
        Ok(self
            .valuations
            .iter()
            .map(|(symbol, ratio)| (symbol, *ratio))
            .collect())
    }
}
