//! Runtime settings read from the environment (after `.env` is loaded)

use anyhow::{Context, Result};

const DEFAULT_DB_PATH: &str = "data/pulse.db";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub db_path: String,
    pub telegram_token: Option<String>,
    pub chat_ids: Vec<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = lookup("PULSE_DB_PATH")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let telegram_token = lookup("TELEGRAM_BOT_TOKEN").filter(|v| !v.trim().is_empty());
        let chat_ids = match lookup("TELEGRAM_CHAT_IDS") {
            Some(raw) => parse_chat_ids(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            db_path,
            telegram_token,
            chat_ids,
        })
    }
}

/// Comma-separated numeric chat ids; blanks are ignored
fn parse_chat_ids(raw: &str) -> Result<Vec<String>> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<i64>()
                .with_context(|| format!("Invalid chat id '{id}' in TELEGRAM_CHAT_IDS"))?;
            Ok(id.to_string())
        })
        .collect()
}
