//! bitinfocharts.com page fetcher

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use reqwest::Client;
use tracing::{debug, info};

use crate::distribution::{parse_distribution_history, DistributionRow};

const DISTRIBUTION_URL: &str = "https://bitinfocharts.com/bitcoin-distribution-history.html";

/// The site rejects requests without a browser-like user agent
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

pub struct BitinfoChartsClient {
    client: Client,
    distribution_url: String,
}

impl BitinfoChartsClient {
    pub fn new() -> Self {
        Self::with_url(DISTRIBUTION_URL)
    }

    pub fn with_url(distribution_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            distribution_url: distribution_url.to_string(),
        }
    }

    /// Download the distribution history page and parse every row
    pub async fn fetch_distribution(&self) -> Result<Vec<DistributionRow>> {
        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);
        debug!(url = %self.distribution_url, "Fetching distribution history");

        let response = self
            .client
            .get(&self.distribution_url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("bitinfocharts error {}: {}", status, body);
        }

        let html = response.text().await?;
        let rows = parse_distribution_history(&html)
            .context("Failed to parse distribution history page")?;

        info!(rows = rows.len(), "Fetched distribution history");
        Ok(rows)
    }
}

impl Default for BitinfoChartsClient {
    fn default() -> Self {
        Self::new()
    }
}
