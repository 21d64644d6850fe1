/// Canonical daily-bar column layout and the raw-header alias table.
pub struct BarSchema;

pub const DATE: &str = "date";
pub const OPEN: &str = "open";
pub const HIGH: &str = "high";
pub const LOW: &str = "low";
pub const CLOSE: &str = "close";
pub const VOLUME: &str = "volume";

/// Recognized raw spellings per canonical column. Matching is done after
/// trimming, stripping a byte-order mark and ASCII-lowercasing.
const ALIASES: &[(&str, &[&str])] = &[
    (DATE, &["date", "日期", "trade_date", "datetime", "day", "交易日期"]),
    (OPEN, &["open", "开盘", "开盘价", "open_price"]),
    (HIGH, &["high", "最高", "最高价", "high_price"]),
    (LOW, &["low", "最低", "最低价", "low_price"]),
    (CLOSE, &["close", "收盘", "收盘价", "close_price"]),
    (VOLUME, &["volume", "成交量", "vol"]),
];

impl BarSchema {
    /// Column order of the canonical on-disk form.
    pub fn columns() -> [&'static str; 6] {
        [DATE, OPEN, HIGH, LOW, CLOSE, VOLUME]
    }

    /// Columns a raw record set must carry to be usable. `open` is not among
    /// them; it is backfilled from `close`.
    pub fn required() -> [&'static str; 5] {
        [DATE, CLOSE, HIGH, LOW, VOLUME]
    }

    /// Resolve a raw header to its canonical column, if it is a known alias.
    pub fn canonical_name(raw: &str) -> Option<&'static str> {
        let cleaned = raw.trim_start_matches('\u{feff}').trim().to_ascii_lowercase();
        ALIASES
            .iter()
            .find(|(_, aliases)| aliases.contains(&cleaned.as_str()))
            .map(|(canonical, _)| *canonical)
    }

    /// True if `headers` is exactly the canonical header row.
    pub fn is_canonical<S: AsRef<str>>(headers: &[S]) -> bool {
        headers.len() == Self::columns().len()
            && headers
                .iter()
                .zip(Self::columns())
                .all(|(h, c)| h.as_ref() == c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_provider_headers() {
        assert_eq!(BarSchema::canonical_name("日期"), Some(DATE));
        assert_eq!(BarSchema::canonical_name("收盘"), Some(CLOSE));
        assert_eq!(BarSchema::canonical_name("成交量"), Some(VOLUME));
    }

    #[test]
    fn resolution_ignores_case_whitespace_and_bom() {
        assert_eq!(BarSchema::canonical_name(" Close "), Some(CLOSE));
        assert_eq!(BarSchema::canonical_name("\u{feff}date"), Some(DATE));
        assert_eq!(BarSchema::canonical_name("VOL"), Some(VOLUME));
    }

    #[test]
    fn unknown_headers_are_ignored() {
        assert_eq!(BarSchema::canonical_name("成交额"), None);
        assert_eq!(BarSchema::canonical_name("ma120"), None);
    }

    #[test]
    fn canonical_header_check() {
        assert!(BarSchema::is_canonical(&BarSchema::columns()));
        assert!(!BarSchema::is_canonical(&["日期", "开盘", "最高", "最低", "收盘", "成交量"]));
        assert!(!BarSchema::is_canonical(&["date", "close"]));
    }
}
