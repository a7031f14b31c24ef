//! Binance public API client for daily candles (no authentication required)

use anyhow::Result;
use chrono::{DateTime, NaiveDate};
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::{debug, info};

use crate::series::Series;
use crate::types::Kline;

const DEFAULT_BASE_URL: &str = "https://api.binance.com";
const MAX_KLINES_PER_REQUEST: u32 = 1000;
const DAILY_INTERVAL: &str = "1d";

/// Binance public market data client
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

/// Raw kline data from Binance API (array of arrays)
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct RawKline(
    i64,    // 0: Open time
    String, // 1: Open
    String, // 2: High
    String, // 3: Low
    String, // 4: Close
    String, // 5: Volume
    i64,    // 6: Close time
    String, // 7: Quote asset volume
    u64,    // 8: Number of trades
    String, // 9: Taker buy base
    String, // 10: Taker buy quote
    String, // 11: Ignore
);

impl Default for BinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BinanceClient {
    /// Create a new Binance client with default base URL
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Client against another Binance-compatible endpoint
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch klines (candlestick data) for a symbol
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        start_time: Option<i64>,
        end_time: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<Kline>> {
        let mut url = format!(
            "{}/api/v3/klines?symbol={}&interval={}",
            self.base_url, symbol, interval
        );

        if let Some(start) = start_time {
            url.push_str(&format!("&startTime={}", start));
        }
        if let Some(end) = end_time {
            url.push_str(&format!("&endTime={}", end));
        }

        let limit = limit.unwrap_or(500).min(MAX_KLINES_PER_REQUEST);
        url.push_str(&format!("&limit={}", limit));

        debug!(symbol, interval, "Fetching klines from Binance");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error {}: {}", status, body);
        }

        let raw_klines: Vec<RawKline> = response.json().await?;

        let klines: Vec<Kline> = raw_klines
            .into_iter()
            .filter_map(|raw| {
                Some(Kline {
                    open_time: raw.0,
                    open: Decimal::from_str(&raw.1).ok()?,
                    high: Decimal::from_str(&raw.2).ok()?,
                    low: Decimal::from_str(&raw.3).ok()?,
                    close: Decimal::from_str(&raw.4).ok()?,
                    volume: Decimal::from_str(&raw.5).ok()?,
                    close_time: raw.6,
                })
            })
            .collect();

        debug!(count = klines.len(), "Fetched klines");
        Ok(klines)
    }

    /// Fetch klines with automatic pagination for ranges > 1000 bars
    pub async fn get_klines_paginated(
        &self,
        symbol: &str,
        interval: &str,
        start_time: i64,
        end_time: i64,
    ) -> Result<Vec<Kline>> {
        let mut all_klines = Vec::new();
        let mut current_start = start_time;

        info!(symbol, interval, "Fetching paginated klines from Binance");

        loop {
            if current_start >= end_time {
                break;
            }

            let klines = self
                .get_klines(
                    symbol,
                    interval,
                    Some(current_start),
                    Some(end_time),
                    Some(MAX_KLINES_PER_REQUEST),
                )
                .await?;

            if klines.is_empty() {
                break;
            }

            let last_close_time = klines.last().map(|k| k.close_time).unwrap_or(end_time);
            all_klines.extend(klines);

            // Move start to after the last candle
            current_start = last_close_time + 1;

            // Small delay to respect rate limits
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }

        info!(total = all_klines.len(), "Paginated kline fetch complete");
        Ok(all_klines)
    }

    /// The last `days` daily candles, the newest (still open) one included
    pub async fn daily_klines(&self, symbol: &str, days: u32) -> Result<Vec<Kline>> {
        self.get_klines(symbol, DAILY_INTERVAL, None, None, Some(days))
            .await
    }

    /// Daily closing prices between two timestamps (ms), dated by candle open
    pub async fn daily_closes(&self, symbol: &str, start_time: i64, end_time: i64) -> Result<Series> {
        let klines = self
            .get_klines_paginated(symbol, DAILY_INTERVAL, start_time, end_time)
            .await?;
        Ok(closes_series(&klines))
    }
}

/// Closing prices keyed by the UTC day each candle opened
pub fn closes_series(klines: &[Kline]) -> Series {
    Series::from_pairs(klines.iter().filter_map(|k| {
        let date = open_date(k)?;
        let close = k.close.to_f64()?;
        Some((date, close))
    }))
}

/// Traded volume of each candle, oldest first
pub fn volumes(klines: &[Kline]) -> Vec<f64> {
    klines.iter().filter_map(|k| k.volume.to_f64()).collect()
}

fn open_date(kline: &Kline) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(kline.open_time).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const DAY_MS: i64 = 86_400_000;

    fn kline(day: i64, close: Decimal, volume: Decimal) -> Kline {
        Kline {
            open_time: 1_735_689_600_000 + day * DAY_MS,
            open: close,
            high: close + dec!(10),
            low: close - dec!(10),
            close,
            volume,
            close_time: 1_735_689_600_000 + (day + 1) * DAY_MS - 1,
        }
    }

    #[test]
    fn test_closes_series_uses_open_day() {
        let klines = vec![kline(0, dec!(94000.5), dec!(10)), kline(1, dec!(95000), dec!(12))];
        let series = closes_series(&klines);
        assert_eq!(series.len(), 2);
        assert_eq!(
            series.points()[0].date,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
        );
        assert_eq!(series.value_back(0), Some(95000.0));
    }

    #[test]
    fn test_volumes() {
        let klines = vec![kline(0, dec!(1), dec!(1.5)), kline(1, dec!(1), dec!(2.25))];
        assert_eq!(volumes(&klines), vec![1.5, 2.25]);
    }
}
