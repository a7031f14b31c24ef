//! Report pipelines: fetch, store, load, detect, render
//!
//! Each pipeline is a single pass over stored data; the binary decides whether
//! the resulting message is printed or delivered.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use persistence::repository::{
    BacktestRepository, ObservationRecord, OutlierBacktestRecord, SeriesRepository,
};
use persistence::SqlitePool;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::binance::volumes;
use crate::api::{BinanceClient, BitinfoChartsClient, FearGreedClient};
use crate::backtest::{compute_params_hash, grid_search, GridSearchResult};
use crate::distribution::{bucket_universe, BUCKETS, DISTRIBUTION_SOURCE};
use crate::etf::{analyze_flows, fund_tickers, ETF_SOURCE};
use crate::outlier::OutlierConfig;
use crate::ranking::{collect_insights, Insight, InsightConfig};
use crate::report::{
    render_distribution_table, render_etf_flows, render_fear_greed, render_insights,
    render_whale_tracker,
    InsightNumbering, Wording,
};
use crate::series::{Series, SymbolSeries};
use crate::snapshot::{HoldingsSnapshot, TrackedEntity};
use crate::volume::{coin_profiles, evaluate_profile, InvestorProfile};

/// Group stored observations into series.
///
/// Symbols named in `order` come first, in that order; the rest follow
/// alphabetically.
pub fn records_to_universe(records: &[ObservationRecord], order: &[&str]) -> Vec<SymbolSeries> {
    let mut by_symbol: HashMap<&str, Series> = HashMap::new();
    let mut seen: Vec<&str> = Vec::new();

    for record in records {
        let date = match record.parsed_date() {
            Ok(d) => d,
            Err(e) => {
                warn!(symbol = %record.symbol, error = %e, "Skipping observation");
                continue;
            }
        };
        let symbol = record.symbol.as_str();
        if !by_symbol.contains_key(symbol) {
            seen.push(symbol);
        }
        by_symbol.entry(symbol).or_default().push(date, record.value);
    }

    seen.sort_by_key(|s| (order.iter().position(|o| o == s).unwrap_or(usize::MAX), *s));
    seen.into_iter()
        .filter_map(|s| by_symbol.remove(s).map(|series| SymbolSeries::new(s, series)))
        .collect()
}

/// Load every symbol of a source
pub async fn load_universe(
    pool: &SqlitePool,
    source: &str,
    order: &[&str],
) -> Result<Vec<SymbolSeries>> {
    let records = SeriesRepository::new(pool).load_observations(source).await?;
    debug!(source = %source, rows = records.len(), "Loaded observations");
    Ok(records_to_universe(&records, order))
}

/// Drop observations dated `today` or later; the current day is still being collected
pub fn trim_partial_day(universe: &[SymbolSeries], today: NaiveDate) -> Vec<SymbolSeries> {
    universe
        .iter()
        .map(|entry| {
            let partial = entry
                .series
                .points()
                .iter()
                .rev()
                .take_while(|p| p.date >= today)
                .count();
            SymbolSeries::new(entry.symbol.clone(), entry.series.without_latest(partial))
        })
        .collect()
}

/// Keep only symbols observed on the universe's newest date.
///
/// A holdings snapshot lists what an entity holds that day; a symbol missing
/// from the newest snapshot has no comparable latest value.
pub fn align_to_latest(universe: Vec<SymbolSeries>) -> Vec<SymbolSeries> {
    let Some(latest) = universe
        .iter()
        .filter_map(|entry| entry.series.latest().map(|p| p.date))
        .max()
    else {
        return universe;
    };

    universe
        .into_iter()
        .filter(|entry| match entry.series.latest() {
            Some(p) if p.date == latest => true,
            _ => {
                debug!(symbol = %entry.symbol, latest = %latest, "Not in newest snapshot");
                false
            }
        })
        .collect()
}

/// Fetch the full distribution history and upsert every bucket balance
pub async fn refresh_distribution(pool: &SqlitePool, client: &BitinfoChartsClient) -> Result<usize> {
    let rows = client.fetch_distribution().await?;
    let universe = bucket_universe(&rows);

    let records: Vec<ObservationRecord> = universe
        .iter()
        .flat_map(|entry| {
            entry.series.points().iter().map(|p| {
                ObservationRecord::new(DISTRIBUTION_SOURCE, &entry.symbol, p.date, p.value)
            })
        })
        .collect();

    let written = SeriesRepository::new(pool).upsert_observations(&records).await?;
    info!(rows = rows.len(), written, "Distribution history stored");
    Ok(written)
}

fn bucket_order() -> Vec<&'static str> {
    BUCKETS.iter().map(|(label, _)| *label).collect()
}

/// Distribution table plus numbered insights, or `None` without stored data
pub async fn distribution_report(pool: &SqlitePool) -> Result<Option<String>> {
    let universe = load_universe(pool, DISTRIBUTION_SOURCE, &bucket_order()).await?;
    if universe.is_empty() {
        warn!("No distribution data stored, run with --refresh first");
        return Ok(None);
    }
    let universe = trim_partial_day(&universe, Utc::now().date_naive());
    Ok(Some(render_distribution(&universe)))
}

/// Render a distribution universe that already excludes partial days
pub fn render_distribution(universe: &[SymbolSeries]) -> String {
    let insights = collect_insights(universe, &InsightConfig::distribution());
    let lines = render_insights(&insights, &Wording::BTC_HOLDINGS, InsightNumbering::Bold);

    let mut msg = render_distribution_table(universe);
    for line in lines {
        msg.push_str(&line);
        msg.push('\n');
    }
    msg
}

/// Outcome of storing one holdings snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub source: String,
    pub date: NaiveDate,
    pub written: usize,
    pub total_value: Option<f64>,
    pub skipped: Vec<String>,
}

/// Store a holdings snapshot and its total value
pub async fn ingest_snapshot(pool: &SqlitePool, snapshot: &HoldingsSnapshot) -> Result<IngestSummary> {
    let resolved = snapshot.resolve();
    for symbol in &resolved.skipped {
        warn!(source = %snapshot.source, symbol = %symbol, "Unparseable amount skipped");
    }

    let records: Vec<ObservationRecord> = resolved
        .amounts
        .iter()
        .map(|(symbol, value)| ObservationRecord::new(&snapshot.source, symbol, snapshot.date, *value))
        .collect();

    let repo = SeriesRepository::new(pool);
    if repo.has_date(&snapshot.source, snapshot.date).await? {
        info!(source = %snapshot.source, date = %snapshot.date, "Replacing stored holdings");
    }
    let written = repo.upsert_observations(&records).await?;
    repo.save_snapshot(
        &snapshot.source,
        snapshot.date,
        snapshot.total(),
        records.len() as i64,
    )
    .await?;

    info!(source = %snapshot.source, date = %snapshot.date, written, "Snapshot ingested");
    Ok(IngestSummary {
        source: snapshot.source.clone(),
        date: snapshot.date,
        written,
        total_value: snapshot.total(),
        skipped: resolved.skipped,
    })
}

/// Insights for every tracked entity, rendered as the whale tracker message
pub async fn whale_tracker_report(pool: &SqlitePool, entities: &[TrackedEntity]) -> Result<String> {
    let config = InsightConfig::holdings();
    let mut lines_by_entity: HashMap<String, Vec<String>> = HashMap::new();

    for entity in entities {
        let universe = align_to_latest(load_universe(pool, &entity.key, &[]).await?);
        if universe.is_empty() {
            debug!(entity = %entity.key, "No holdings stored");
            continue;
        }
        let insights = collect_insights(&universe, &config);
        let lines = render_insights(&insights, &Wording::HOLDINGS, InsightNumbering::PlainOmitSingle);
        lines_by_entity.insert(entity.key.clone(), lines);
    }

    Ok(render_whale_tracker(entities, &lines_by_entity))
}

/// ETF flow table and insights, or `None` without stored flows
pub async fn etf_flow_report(pool: &SqlitePool) -> Result<Option<String>> {
    let universe = load_universe(pool, ETF_SOURCE, &fund_tickers()).await?;
    let Some(report) = analyze_flows(&universe) else {
        warn!("No ETF flows stored, ingest an etf snapshot first");
        return Ok(None);
    };
    info!(
        as_of = %report.as_of,
        sudden_buys = report.sudden_buys.len(),
        trends = report.trends.len(),
        "ETF flows analyzed"
    );
    Ok(Some(render_etf_flows(&report)))
}

/// Volume spike messages for one profile set, or `None` when nothing spiked
pub async fn volume_signal_report(
    client: &BinanceClient,
    investor: InvestorProfile,
) -> Result<Option<String>> {
    let mut messages = Vec::new();

    for profile in coin_profiles(investor) {
        let symbol = profile.binance_symbol();
        let klines = match client
            .daily_klines(&symbol, (profile.window_size + 10) as u32)
            .await
        {
            Ok(k) => k,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Failed to fetch klines");
                continue;
            }
        };

        // The newest candle is still open
        let completed = &klines[..klines.len().saturating_sub(1)];
        if let Some(signal) = evaluate_profile(&profile, investor, &volumes(completed)) {
            info!(symbol = %symbol, volume = signal.spike.volume, "Volume spike");
            messages.push(signal.message());
        }
    }

    if messages.is_empty() {
        return Ok(None);
    }
    Ok(Some(messages.join("\n\n")))
}

pub async fn fear_greed_report(client: &FearGreedClient) -> Result<Option<String>> {
    let history = client.history().await?;
    let msg = render_fear_greed(&history);
    if msg.is_none() {
        warn!(readings = history.len(), "Not enough index history for a report");
    }
    Ok(msg)
}

/// Parameters of an outlier backtest over stored holdings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRequest {
    pub source: String,
    pub symbol: String,
    /// Exchange symbol of the price series, e.g. `BTCUSDT`
    pub price_symbol: String,
    /// Days of history to test, counted back from the newest observation
    pub days: Option<u32>,
}

/// Grid-search outlier parameters for one stored symbol and persist every run
pub async fn run_outlier_backtest(
    pool: &SqlitePool,
    client: &BinanceClient,
    request: &BacktestRequest,
) -> Result<GridSearchResult> {
    let series_repo = SeriesRepository::new(pool);
    let records = series_repo
        .load_symbol(&request.source, &request.symbol)
        .await?;
    let universe = records_to_universe(&records, &[]);
    let Some(holdings) = universe.into_iter().next().map(|s| s.series) else {
        let known = series_repo.list_symbols(&request.source).await?;
        anyhow::bail!(
            "No observations for {} / {} (stored symbols: {})",
            request.source,
            request.symbol,
            known.join(", ")
        );
    };
    let holdings = match request.days {
        Some(days) => holdings.tail(days as usize),
        None => holdings,
    };

    let (Some(first), Some(last)) = (holdings.points().first(), holdings.latest()) else {
        anyhow::bail!("Empty history for {}", request.symbol);
    };
    let start_ms = day_start_ms(first.date);
    let end_ms = day_start_ms(last.date) + 8 * 86_400_000;
    let span = (first.date, last.date);

    info!(
        symbol = %request.symbol,
        price_symbol = %request.price_symbol,
        days = holdings.len(),
        "Running outlier backtest"
    );
    let prices = client
        .daily_closes(&request.price_symbol, start_ms, end_ms)
        .await?;

    let result = grid_search(&holdings, &prices);

    let repo = BacktestRepository::new(pool);
    let mut saved = 0usize;
    for run in &result.runs {
        let config = OutlierConfig {
            window_size: run.window_size,
            std_multiplier: run.std_multiplier,
        };
        let params_hash = compute_params_hash(
            &request.source,
            &request.symbol,
            &request.price_symbol,
            &config,
            Some(span),
        );
        if repo.exists_by_hash(&params_hash).await? {
            debug!(window = run.window_size, k = run.std_multiplier, "Run already stored");
            continue;
        }
        let best = run.best();
        let record = OutlierBacktestRecord {
            id: None,
            params_hash,
            source: request.source.clone(),
            symbol: request.symbol.clone(),
            price_symbol: request.price_symbol.clone(),
            window_size: run.window_size as i64,
            std_multiplier: run.std_multiplier,
            side: best.map(|b| b.side.as_str().to_string()),
            best_horizon: best.map(|b| b.days as i64),
            best_ev: best.map(|b| b.expected_value),
            event_count: run.events.len() as i64,
            report_json: serde_json::to_string(run)?,
        };
        if repo.save(&record).await? {
            saved += 1;
        }
    }
    info!(runs = result.runs.len(), saved, "Backtest runs stored");

    Ok(result)
}

fn day_start_ms(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or_default()
}

/// Insights for any stored source, using the preset that fits it
pub async fn source_insights(pool: &SqlitePool, source: &str) -> Result<Vec<Insight>> {
    if source == DISTRIBUTION_SOURCE {
        let universe = load_universe(pool, source, &bucket_order()).await?;
        let universe = trim_partial_day(&universe, Utc::now().date_naive());
        return Ok(collect_insights(&universe, &InsightConfig::distribution()));
    }
    let universe = align_to_latest(load_universe(pool, source, &[]).await?);
    Ok(collect_insights(&universe, &InsightConfig::holdings()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistence::Database;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    #[test]
    fn test_records_to_universe_respects_order() {
        let records = vec![
            ObservationRecord::new("distribution", "1 - 10 BTC", day(1), 5.0),
            ObservationRecord::new("distribution", "100+ BTC", day(1), 9.0),
            ObservationRecord::new("distribution", "0.001 - 1 BTC", day(1), 1.0),
            ObservationRecord::new("distribution", "0.001 - 1 BTC", day(2), 2.0),
            ObservationRecord::new("distribution", "zzz", day(1), 0.0),
        ];
        let universe = records_to_universe(&records, &bucket_order());
        let symbols: Vec<&str> = universe.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["0.001 - 1 BTC", "1 - 10 BTC", "100+ BTC", "zzz"]);
        assert_eq!(universe[0].series.len(), 2);
    }

    #[test]
    fn test_trim_partial_day() {
        let series = Series::from_pairs([(day(1), 1.0), (day(2), 2.0), (day(3), 3.0)]);
        let universe = vec![SymbolSeries::new("A", series)];

        let trimmed = trim_partial_day(&universe, day(3));
        assert_eq!(trimmed[0].series.len(), 2);

        let untouched = trim_partial_day(&universe, day(4));
        assert_eq!(untouched[0].series.len(), 3);
    }

    #[test]
    fn test_render_distribution_appends_insights() {
        let rising = Series::from_pairs([(day(1), 100.0), (day(2), 110.0), (day(3), 120.0)]);
        let msg = render_distribution(&[SymbolSeries::new("100+ BTC", rising)]);
        assert!(msg.starts_with("📊 *Bitcoin Distribution Table*"));
        assert!(msg.contains("*1)* 100+ BTC buying for *2 days straight*."));
    }

    #[tokio::test]
    async fn test_ingest_and_whale_tracker() {
        let db = Database::in_memory().await.unwrap();
        let entities = vec![
            TrackedEntity::new("worldliberty", "World Liberty Fi", "Companies"),
            TrackedEntity::new("usg", "US Government", "Companies"),
        ];

        for (d, eth, link) in [(1, "10K", 500.0), (2, "12K", 400.0), (3, "15K", 300.0)] {
            let snapshot = HoldingsSnapshot::from_json(&format!(
                r#"{{"source": "worldliberty", "date": "2025-06-0{d}", "total_value": "$1M",
                     "holdings": {{"ETH": "{eth}", "LINK": {link}, "USDC": 5}}}}"#
            ))
            .unwrap();
            let summary = ingest_snapshot(db.pool(), &snapshot).await.unwrap();
            assert_eq!(summary.written, 3);
            assert!(summary.skipped.is_empty());
        }

        let snapshot = SeriesRepository::new(db.pool())
            .latest_snapshot("worldliberty")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.total_value, Some(1_000_000.0));

        let msg = whale_tracker_report(db.pool(), &entities).await.unwrap();
        assert!(msg.contains("│   World Liberty Fi\n"));
        assert!(msg.contains("ETH buying and LINK selling for *2 days straight*."));
        assert!(msg.contains("Companies: US Government"));
        assert!(!msg.contains("USDC"));
    }

    #[test]
    fn test_align_to_latest_drops_stale_symbols() {
        let universe = vec![
            SymbolSeries::new("ETH", Series::from_pairs([(day(1), 100.0), (day(2), 80.0)])),
            SymbolSeries::new("LINK", Series::from_pairs([(day(1), 5.0), (day(3), 5.0)])),
            SymbolSeries::new("EMPTY", Series::default()),
        ];
        let aligned = align_to_latest(universe);
        let symbols: Vec<&str> = aligned.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["LINK"]);

        assert!(align_to_latest(Vec::new()).is_empty());
    }

    #[tokio::test]
    async fn test_whale_tracker_ignores_symbol_missing_from_newest_snapshot() {
        let db = Database::in_memory().await.unwrap();
        let entities = vec![TrackedEntity::new("wlf", "World Liberty Fi", "Companies")];

        let days = [
            (1, r#""ETH": 100, "LINK": 50"#),
            (2, r#""ETH": 80, "LINK": 50"#),
            (3, r#""ETH": 40, "LINK": 50"#),
            (4, r#""LINK": 50"#),
            (5, r#""LINK": 50"#),
            (6, r#""LINK": 50"#),
        ];
        for (d, holdings) in days {
            let snapshot = HoldingsSnapshot::from_json(&format!(
                r#"{{"source": "wlf", "date": "2025-06-0{d}", "holdings": {{{holdings}}}}}"#
            ))
            .unwrap();
            ingest_snapshot(db.pool(), &snapshot).await.unwrap();
        }

        let msg = whale_tracker_report(db.pool(), &entities).await.unwrap();
        assert!(msg.contains("World Liberty Fi"));
        assert!(!msg.contains("ETH"));

        let insights = source_insights(db.pool(), "wlf").await.unwrap();
        assert!(insights.is_empty());
    }

    #[tokio::test]
    async fn test_etf_flow_report_from_snapshots() {
        let db = Database::in_memory().await.unwrap();
        assert_eq!(etf_flow_report(db.pool()).await.unwrap(), None);

        let days = [
            (2, r#""IBIT": "(10)", "FBTC": "20", "BITB": "-""#),
            (3, r#""IBIT": "15.0", "FBTC": "(3)", "BITB": "1.5""#),
            (4, r#""IBIT": "25.0", "FBTC": "(4)", "BITB": "2""#),
            (5, r#""IBIT": "30.0", "FBTC": "(5)", "BITB": "-""#),
        ];
        for (d, flows) in days {
            let snapshot = HoldingsSnapshot::from_json(&format!(
                r#"{{"source": "etf", "date": "2025-06-0{d}", "holdings": {{{flows}}}}}"#
            ))
            .unwrap();
            let summary = ingest_snapshot(db.pool(), &snapshot).await.unwrap();
            assert_eq!(summary.skipped.len(), usize::from(d == 2 || d == 5));
        }

        let msg = etf_flow_report(db.pool()).await.unwrap().unwrap();
        assert!(msg.starts_with("📊 *ETFs/ETPs* (As of 2025-06-05)"));
        assert!(msg.contains("Bitwise (BITB)        No Data          2.00M"));
        assert!(msg.contains("Continuous buying detected for BlackRock (IBIT) over the last 3 days."));
        assert!(msg.contains("Continuous selling detected for Fidelity (FBTC) over the last 3 days."));
        assert!(msg.contains("Sudden buy detected today for BlackRock (IBIT): 30.00M vs a 15.00M average."));
    }

    #[tokio::test]
    async fn test_distribution_report_without_data() {
        let db = Database::in_memory().await.unwrap();
        assert_eq!(distribution_report(db.pool()).await.unwrap(), None);
    }
}
