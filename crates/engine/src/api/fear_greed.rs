//! alternative.me Fear & Greed index client

use anyhow::Result;
use chrono::{DateTime, NaiveDate};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const DEFAULT_URL: &str = "https://api.alternative.me/fng/?limit=0&format=json";

/// One daily index value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FearGreedReading {
    /// 0 (extreme fear) to 100 (extreme greed)
    pub value: u32,
    /// Title-cased grade, e.g. "Extreme Fear"
    pub classification: String,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct FngResponse {
    data: Vec<FngEntry>,
}

#[derive(Debug, Deserialize)]
struct FngEntry {
    value: String,
    value_classification: String,
    /// Unix seconds, sent as a string
    timestamp: String,
}

impl FngEntry {
    fn into_reading(self) -> Option<FearGreedReading> {
        let value = self.value.parse().ok()?;
        let secs: i64 = self.timestamp.parse().ok()?;
        let date = DateTime::from_timestamp(secs, 0)?.date_naive();
        Some(FearGreedReading {
            value,
            classification: title_case(&self.value_classification),
            date,
        })
    }
}

fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse the API body into readings, newest first as served
pub fn parse_history(body: &str) -> Result<Vec<FearGreedReading>> {
    let response: FngResponse = serde_json::from_str(body)?;
    let total = response.data.len();
    let readings: Vec<FearGreedReading> = response
        .data
        .into_iter()
        .filter_map(FngEntry::into_reading)
        .collect();
    if readings.len() < total {
        warn!(dropped = total - readings.len(), "Skipped malformed index entries");
    }
    Ok(readings)
}

pub struct FearGreedClient {
    client: Client,
    url: String,
}

impl FearGreedClient {
    pub fn new() -> Self {
        Self::with_url(DEFAULT_URL)
    }

    pub fn with_url(url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            url: url.to_string(),
        }
    }

    /// Full index history, newest first
    pub async fn history(&self) -> Result<Vec<FearGreedReading>> {
        debug!(url = %self.url, "Fetching fear & greed history");
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("alternative.me error {}: {}", status, body);
        }

        let readings = parse_history(&response.text().await?)?;
        info!(readings = readings.len(), "Fetched fear & greed history");
        Ok(readings)
    }
}

impl Default for FearGreedClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_history() {
        let body = r#"{"name": "Fear and Greed Index", "data": [
            {"value": "72", "value_classification": "Greed", "timestamp": "1735776000", "time_until_update": "3600"},
            {"value": "15", "value_classification": "extreme fear", "timestamp": "1735689600"},
            {"value": "n/a", "value_classification": "Neutral", "timestamp": "1735603200"}
        ]}"#;
        let readings = parse_history(body).unwrap();

        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].value, 72);
        assert_eq!(readings[0].date, NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        assert_eq!(readings[1].classification, "Extreme Fear");
    }

    #[test]
    fn test_parse_history_rejects_other_shapes() {
        assert!(parse_history(r#"{"metadata": {}}"#).is_err());
    }
}
