use serde::{Deserialize, Serialize};

/// Width of an exchange security code (A-share codes are six digits).
pub const SYMBOL_WIDTH: usize = 6;

/// A listed security: fixed-width code plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub name: String,
}

impl Instrument {
    /// Create an instrument, normalizing the symbol to its fixed-width form.
    pub fn new(symbol: impl AsRef<str>, name: impl Into<String>) -> Self {
        Self {
            symbol: normalize_symbol(symbol.as_ref()),
            name: name.into(),
        }
    }
}

/// Left-pad purely numeric codes with zeros to [`SYMBOL_WIDTH`].
///
/// Codes often lose their leading zeros on the way through spreadsheets and
/// numeric columns (`1` instead of `000001`). Non-numeric symbols are only
/// trimmed.
pub fn normalize_symbol(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.is_empty()
        && trimmed.len() < SYMBOL_WIDTH
        && trimmed.bytes().all(|b| b.is_ascii_digit())
    {
        format!("{trimmed:0>width$}", width = SYMBOL_WIDTH)
    } else {
        trimmed.to_string()
    }
}
