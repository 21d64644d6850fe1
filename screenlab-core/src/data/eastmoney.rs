//! Eastmoney data provider.
//!
//! Fetches daily K-lines from the push2his history API and the A-share
//! universe (code, name, dynamic P/E) from the push2 quote-list API.
//!
//! Eastmoney has no published contract for these endpoints; responses are
//! returned to the caller as raw tabular records with the site's own Chinese
//! column headers and the normalizer resolves them like any other source.
//! Retrying is the acquisition pipeline's job, not this client's.
//!
//! The universe and the valuations come from the same quote list, so the
//! client pages it once and serves both from that copy.

use std::sync::OnceLock;
use std::time::Duration;

use chrono::NaiveDate;
use polars::prelude::*;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::provider::{
    Adjustment, DataError, FetchRequest, HistoryProvider, UniverseProvider, ValuationProvider,
};
use super::valuation::Valuations;
use crate::domain::Instrument;

const KLINE_URL: &str = "https://push2his.eastmoney.com/api/qt/stock/kline/get";
const QUOTE_LIST_URL: &str = "https://82.push2.eastmoney.com/api/qt/clist/get";

/// Shanghai/Shenzhen/Beijing main, growth and STAR boards.
const A_SHARE_FILTER: &str = "m:0+t:6,m:0+t:80,m:1+t:2,m:1+t:23,m:0+t:81+s:2048";
const PAGE_SIZE: usize = 100;
const MAX_PAGES: usize = 200;

/// Headers of the K-line fields requested via `fields2=f51..f57`.
const KLINE_COLUMNS: [&str; 7] = ["日期", "开盘", "收盘", "最高", "最低", "成交量", "成交额"];

#[derive(Debug, Deserialize)]
struct KlineResponse {
    rc: i64,
    data: Option<KlineData>,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    #[serde(default)]
    klines: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct QuoteListResponse {
    rc: i64,
    data: Option<QuoteListData>,
}

#[derive(Debug, Deserialize)]
struct QuoteListData {
    total: usize,
    #[serde(default)]
    diff: Vec<QuoteRow>,
}

/// One row of the quote list: f12 = code, f14 = name, f9 = dynamic P/E.
#[derive(Debug, Deserialize)]
struct QuoteRow {
    f12: String,
    #[serde(default)]
    f14: String,
    /// A number, or `"-"` when the exchange publishes none.
    #[serde(default)]
    f9: Value,
}

impl QuoteRow {
    fn pe_dynamic(&self) -> Option<f64> {
        match &self.f9 {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Eastmoney data provider (blocking HTTP).
pub struct EastmoneyClient {
    client: reqwest::blocking::Client,
    listing_timeout: Duration,
    quote_rows: OnceLock<Vec<QuoteRow>>,
}

impl EastmoneyClient {
    /// `listing_timeout` bounds each quote-list page request; history requests
    /// carry their own timeout in the [`FetchRequest`].
    pub fn new(listing_timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            listing_timeout,
            quote_rows: OnceLock::new(),
        })
    }

    /// `1.` prefix for Shanghai listings, `0.` for Shenzhen and Beijing.
    fn secid(symbol: &str) -> String {
        let market = match symbol.as_bytes().first() {
            Some(b'5' | b'6' | b'9') => 1,
            _ => 0,
        };
        format!("{market}.{symbol}")
    }

    fn fqt(adjust: Adjustment) -> u8 {
        match adjust {
            Adjustment::None => 0,
            Adjustment::Qfq => 1,
            Adjustment::Hfq => 2,
        }
    }

    fn kline_url(request: &FetchRequest) -> String {
        format!(
            "{KLINE_URL}?secid={}&klt=101&fqt={}&beg={}&end={}\
             &fields1=f1,f2,f3,f4,f5,f6&fields2=f51,f52,f53,f54,f55,f56,f57",
            Self::secid(&request.symbol),
            Self::fqt(request.adjust),
            fmt_date(request.start),
            fmt_date(request.end),
        )
    }

    fn quote_list_url(page: usize) -> String {
        format!(
            "{QUOTE_LIST_URL}?pn={page}&pz={PAGE_SIZE}&po=1&np=1&fltt=2&invt=2&fid=f12\
             &fs={A_SHARE_FILTER}&fields=f9,f12,f14"
        )
    }

    /// Turn the K-line payload into a raw frame; missing cells stay null.
    fn parse_klines(symbol: &str, resp: KlineResponse) -> Result<DataFrame, DataError> {
        if resp.rc != 0 {
            return Err(DataError::ResponseFormatChanged(format!(
                "kline rc={} for {symbol}",
                resp.rc
            )));
        }
        let lines = resp.data.map(|d| d.klines).unwrap_or_default();

        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(lines.len()); KLINE_COLUMNS.len()];
        for line in &lines {
            let parts: Vec<&str> = line.split(',').collect();
            for (idx, column) in cells.iter_mut().enumerate() {
                column.push(parts.get(idx).map(|s| s.trim().to_string()));
            }
        }

        let columns: Vec<Column> = KLINE_COLUMNS
            .iter()
            .zip(cells)
            .map(|(name, values)| Column::new((*name).into(), values))
            .collect();
        DataFrame::new(columns).map_err(|e| DataError::Frame(e.to_string()))
    }

    fn fetch_quote_page(&self, page: usize) -> Result<QuoteListData, DataError> {
        let url = Self::quote_list_url(page);
        let resp = self
            .client
            .get(&url)
            .timeout(self.listing_timeout)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::HttpStatus {
                status: status.as_u16(),
                context: format!("quote list page {page}"),
            });
        }

        let body: QuoteListResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("quote list page {page}: {e}"))
        })?;
        if body.rc != 0 {
            return Err(DataError::ResponseFormatChanged(format!(
                "quote list rc={}",
                body.rc
            )));
        }
        Ok(body.data.unwrap_or(QuoteListData {
            total: 0,
            diff: Vec::new(),
        }))
    }

    /// Quote list rows, fetched on first use. A failed fetch is not
    /// remembered, so the next call tries again.
    fn quote_rows(&self) -> Result<&[QuoteRow], DataError> {
        if let Some(rows) = self.quote_rows.get() {
            return Ok(rows);
        }
        let rows = self.quote_list()?;
        // a concurrent caller may have filled it first
        Ok(self.quote_rows.get_or_init(|| rows))
    }

    /// Page through the full quote list.
    fn quote_list(&self) -> Result<Vec<QuoteRow>, DataError> {
        let mut rows = Vec::new();
        for page in 1..=MAX_PAGES {
            let data = self.fetch_quote_page(page)?;
            if data.diff.is_empty() {
                break;
            }
            rows.extend(data.diff);
            debug!(page, fetched = rows.len(), total = data.total, "quote list page");
            if rows.len() >= data.total {
                break;
            }
        }
        Ok(rows)
    }
}

impl HistoryProvider for EastmoneyClient {
    fn name(&self) -> &str {
        "eastmoney"
    }

    fn fetch_daily(&self, request: &FetchRequest) -> Result<DataFrame, DataError> {
        let url = Self::kline_url(request);
        let resp = self
            .client
            .get(&url)
            .timeout(request.timeout)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::HttpStatus {
                status: status.as_u16(),
                context: request.symbol.clone(),
            });
        }

        let body: KlineResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!(
                "failed to parse kline response for {}: {e}",
                request.symbol
            ))
        })?;
        Self::parse_klines(&request.symbol, body)
    }
}

impl UniverseProvider for EastmoneyClient {
    fn instruments(&self) -> Result<Vec<Instrument>, DataError> {
        let mut instruments: Vec<Instrument> = self
            .quote_rows()?
            .iter()
            .map(|row| Instrument::new(&row.f12, row.f14.clone()))
            .collect();
        instruments.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        instruments.dedup_by(|a, b| a.symbol == b.symbol);
        Ok(instruments)
    }
}

impl ValuationProvider for EastmoneyClient {
    fn valuations(&self) -> Result<Valuations, DataError> {
        Ok(self
            .quote_rows()?
            .iter()
            .filter_map(|row| row.pe_dynamic().map(|pe| (row.f12.as_str(), pe)))
            .collect())
    }
}

fn fmt_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::canonicalize::Canonicalizer;

    #[test]
    fn secid_picks_exchange_prefix() {
        assert_eq!(EastmoneyClient::secid("600519"), "1.600519");
        assert_eq!(EastmoneyClient::secid("000001"), "0.000001");
        assert_eq!(EastmoneyClient::secid("300750"), "0.300750");
        assert_eq!(EastmoneyClient::secid("830799"), "0.830799");
    }

    #[test]
    fn kline_url_carries_dates_and_adjustment() {
        let request = FetchRequest {
            symbol: "600519".into(),
            start: NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            adjust: Adjustment::Hfq,
            timeout: Duration::from_secs(15),
        };
        let url = EastmoneyClient::kline_url(&request);
        assert!(url.contains("secid=1.600519"));
        assert!(url.contains("fqt=2"));
        assert!(url.contains("beg=20100101"));
        assert!(url.contains("end=20240630"));
    }

    #[test]
    fn klines_parse_into_normalizable_frame() {
        let body: KlineResponse = serde_json::from_str(
            r#"{"rc":0,"data":{"code":"000001","klines":[
                "2024-01-02,9.39,9.21,9.42,9.21,1158366,1075742252.45",
                "2024-01-03,9.19,9.20,9.22,9.15,733610,673673091.00",
                "2024-01-04,9.19"
            ]}}"#,
        )
        .unwrap();

        let frame = EastmoneyClient::parse_klines("000001", body).unwrap();
        assert_eq!(frame.height(), 3);

        let series = Canonicalizer::normalize(frame).unwrap();
        assert_eq!(series.len(), 2);
        let first = series.bars()[0];
        assert_eq!(first.open, 9.39);
        assert_eq!(first.close, 9.21);
        assert_eq!(first.high, 9.42);
        assert_eq!(first.volume, 1_158_366.0);
    }

    #[test]
    fn unknown_symbol_yields_empty_frame() {
        let body: KlineResponse = serde_json::from_str(r#"{"rc":0,"data":null}"#).unwrap();
        let frame = EastmoneyClient::parse_klines("999999", body).unwrap();
        assert_eq!(frame.height(), 0);
    }

    #[test]
    fn nonzero_rc_is_an_error() {
        let body: KlineResponse = serde_json::from_str(r#"{"rc":102,"data":null}"#).unwrap();
        assert!(EastmoneyClient::parse_klines("000001", body).is_err());
    }

    #[test]
    fn quote_rows_read_numeric_and_dash_pe() {
        let data: QuoteListData = serde_json::from_str(
            r#"{"total":2,"diff":[
                {"f9":4.87,"f12":"000001","f14":"平安银行"},
                {"f9":"-","f12":"000004","f14":"国华网安"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(data.diff[0].pe_dynamic(), Some(4.87));
        assert_eq!(data.diff[1].pe_dynamic(), None);
    }

    #[test]
    fn universe_and_valuations_share_one_quote_list() {
        let data: QuoteListData = serde_json::from_str(
            r#"{"total":3,"diff":[
                {"f9":12.5,"f12":"600519","f14":"贵州茅台"},
                {"f9":"-","f12":"000004","f14":"国华网安"},
                {"f9":4.87,"f12":"000001","f14":"平安银行"}
            ]}"#,
        )
        .unwrap();
        let client = EastmoneyClient::new(Duration::from_millis(1)).unwrap();
        client.quote_rows.set(data.diff).unwrap();

        // served from the stored rows; no request leaves the process
        let instruments = client.instruments().unwrap();
        let symbols: Vec<&str> = instruments.iter().map(|i| i.symbol.as_str()).collect();
        assert_eq!(symbols, ["000001", "000004", "600519"]);

        let valuations = client.valuations().unwrap();
        assert_eq!(valuations.get("600519"), Some(12.5));
        assert_eq!(valuations.get("000001"), Some(4.87));
        assert_eq!(valuations.get("000004"), None);
    }
}
