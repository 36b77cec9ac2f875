//! Yahoo Finance chart API response types
//!
//! Only the fields needed to build a [`Quote`] are mapped.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thv_core::Quote;

use crate::error::FeedError;

/// Response from GET /v8/finance/chart/{symbol}
#[derive(Debug, Clone, Deserialize)]
pub struct ChartResponse {
    pub chart: Chart,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chart {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
    #[serde(default)]
    pub error: Option<ChartError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResult {
    pub meta: ChartMeta,
    #[serde(default)]
    pub indicators: Option<Indicators>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    #[serde(default)]
    pub regular_market_price: Option<f64>,
    #[serde(default)]
    pub regular_market_volume: Option<u64>,
    /// Unix seconds
    #[serde(default)]
    pub regular_market_time: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<IndicatorQuote>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorQuote {
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<u64>>,
}

impl ChartResponse {
    /// Convert to a quote, preferring the live meta price and falling back
    /// to the last non-null daily close
    pub fn to_quote(&self, symbol: &str) -> Result<Quote, FeedError> {
        if let Some(err) = &self.chart.error {
            return Err(FeedError::Parse(format!(
                "{}: {}",
                err.code.as_deref().unwrap_or("error"),
                err.description.as_deref().unwrap_or("unknown")
            )));
        }

        let result = self
            .chart
            .result
            .as_ref()
            .and_then(|r| r.first())
            .ok_or_else(|| FeedError::NoData(symbol.to_string()))?;

        let last_bar = result
            .indicators
            .as_ref()
            .and_then(|i| i.quote.first());

        let spot = result
            .meta
            .regular_market_price
            .or_else(|| last_bar.and_then(|q| q.close.iter().rev().find_map(|c| *c)))
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| FeedError::NoData(symbol.to_string()))?;

        let volume = result
            .meta
            .regular_market_volume
            .or_else(|| last_bar.and_then(|q| q.volume.iter().rev().find_map(|v| *v)))
            .unwrap_or(0);

        let timestamp = result
            .meta
            .regular_market_time
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);

        Ok(Quote {
            spot,
            volume,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_price_preferred() {
        let body = r#"{"chart":{"result":[{"meta":{"regularMarketPrice":1642.5,"regularMarketVolume":812345,"regularMarketTime":1731564000},
            "indicators":{"quote":[{"close":[1630.0,1640.0],"volume":[1,2]}]}}],"error":null}}"#;
        let resp: ChartResponse = serde_json::from_str(body).unwrap();
        let quote = resp.to_quote("HDFCBANK.NS").unwrap();
        assert_eq!(quote.spot, 1642.5);
        assert_eq!(quote.volume, 812_345);
        assert_eq!(quote.timestamp.timestamp(), 1_731_564_000);
    }

    #[test]
    fn test_falls_back_to_last_close() {
        let body = r#"{"chart":{"result":[{"meta":{},
            "indicators":{"quote":[{"close":[1630.0,null],"volume":[100,null]}]}}],"error":null}}"#;
        let resp: ChartResponse = serde_json::from_str(body).unwrap();
        let quote = resp.to_quote("TCS.NS").unwrap();
        assert_eq!(quote.spot, 1630.0);
        assert_eq!(quote.volume, 100);
    }

    #[test]
    fn test_upstream_error() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let resp: ChartResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(resp.to_quote("XYZ.NS"), Err(FeedError::Parse(_))));
    }

    #[test]
    fn test_empty_result() {
        let body = r#"{"chart":{"result":[],"error":null}}"#;
        let resp: ChartResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(resp.to_quote("XYZ.NS"), Err(FeedError::NoData(_))));
    }
}
