//! Market Pulse: daily crypto trend reports
//!
//! Usage:
//!   market-pulse distribution --refresh --send   - Refresh and deliver the distribution report
//!   market-pulse etf --send                      - Deliver the ETF flow report
//!   market-pulse serve --port 3001               - Launch the JSON API

mod config;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use clap::{Parser, Subcommand};
use engine::{
    default_entities, distribution_report, etf_flow_report, fear_greed_report, ingest_snapshot,
    refresh_distribution, run_outlier_backtest, source_insights, volume_signal_report,
    whale_tracker_report, BacktestRequest, BinanceClient, BitinfoChartsClient, FearGreedClient,
    HoldingsSnapshot, InvestorProfile, Notifier, StdoutNotifier, TelegramNotifier,
};
use engine::report::format_compact;
use persistence::repository::{BacktestRepository, SeriesRepository};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::config::Settings;

const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));

#[derive(Parser)]
#[command(name = "market-pulse")]
#[command(about = "Daily crypto trend insights: streaks, reversals and sudden changes", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bitcoin address distribution table and insights
    Distribution {
        /// Fetch the latest history before reporting
        #[arg(long)]
        refresh: bool,
        /// Deliver to Telegram instead of printing
        #[arg(long)]
        send: bool,
    },
    /// Store a holdings snapshot JSON file
    Ingest {
        /// Path to the snapshot file
        file: PathBuf,
    },
    /// Whale tracker over stored holdings snapshots
    Whales {
        #[arg(long)]
        send: bool,
    },
    /// Volume spike signals from Binance daily candles
    Volume {
        /// Investor profile: balanced, aggressive
        #[arg(long, default_value = "balanced")]
        profile: String,
        #[arg(long)]
        send: bool,
    },
    /// Spot ETF flow table from ingested `etf` snapshots
    Etf {
        #[arg(long)]
        send: bool,
    },
    /// Fear & Greed index table
    FearGreed {
        #[arg(long)]
        send: bool,
    },
    /// Distribution report followed by the Fear & Greed table
    Daily {
        #[arg(long)]
        send: bool,
    },
    /// Grid-search outlier parameters against forward price returns
    Backtest {
        /// Stored source of the holdings series
        #[arg(long, default_value = "distribution")]
        source: String,
        /// Symbol within the source
        #[arg(long, default_value = "100+ BTC")]
        symbol: String,
        /// Binance symbol of the price series
        #[arg(long, default_value = "BTCUSDT")]
        price_symbol: String,
        /// Only test the most recent N days
        #[arg(long)]
        days: Option<u32>,
        /// Optional JSON export path
        #[arg(long)]
        export: Option<String>,
    },
    /// Launch the JSON API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 3001)]
        port: u16,
    },
}

#[derive(Clone)]
struct AppState {
    db: Arc<persistence::Database>,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,market_pulse=debug")
    } else {
        EnvFilter::new("info,engine=info,market_pulse=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();
    let settings = Settings::from_env()?;

    match cli.command {
        Commands::Distribution { refresh, send } => {
            cmd_distribution(&settings, refresh, send).await?;
        }
        Commands::Ingest { file } => {
            cmd_ingest(&settings, &file).await?;
        }
        Commands::Whales { send } => {
            cmd_whales(&settings, send).await?;
        }
        Commands::Volume { profile, send } => {
            let investor: InvestorProfile = profile.parse().map_err(anyhow::Error::msg)?;
            cmd_volume(&settings, investor, send).await?;
        }
        Commands::Etf { send } => {
            cmd_etf(&settings, send).await?;
        }
        Commands::FearGreed { send } => {
            cmd_fear_greed(&settings, send).await?;
        }
        Commands::Daily { send } => {
            cmd_daily(&settings, send).await?;
        }
        Commands::Backtest {
            source,
            symbol,
            price_symbol,
            days,
            export,
        } => {
            let request = BacktestRequest {
                source,
                symbol,
                price_symbol,
                days,
            };
            cmd_backtest(&settings, request, export).await?;
        }
        Commands::Serve { host, port } => {
            cmd_serve(&settings, &host, port).await?;
        }
    }

    Ok(())
}

async fn open_db(settings: &Settings) -> anyhow::Result<persistence::Database> {
    let db = persistence::Database::new(&settings.db_path)
        .await
        .map_err(|e| {
            error!("Failed to initialize database: {}", e);
            anyhow::anyhow!("Database initialization failed: {}", e)
        })?;
    info!("Database initialized: {}", settings.db_path);
    Ok(db)
}

fn notifier(settings: &Settings, send: bool) -> Box<dyn Notifier> {
    if !send {
        return Box::new(StdoutNotifier);
    }
    match &settings.telegram_token {
        Some(token) if !settings.chat_ids.is_empty() => {
            Box::new(TelegramNotifier::new(token, settings.chat_ids.clone()))
        }
        _ => {
            warn!("TELEGRAM_BOT_TOKEN or TELEGRAM_CHAT_IDS not set, printing instead");
            Box::new(StdoutNotifier)
        }
    }
}

async fn deliver(settings: &Settings, send: bool, msg: Option<String>) -> anyhow::Result<()> {
    match msg {
        Some(text) => {
            let delivered = notifier(settings, send).send(&text).await?;
            info!(delivered, "Report delivered");
        }
        None => info!("Nothing to report"),
    }
    Ok(())
}

// ============================================================================
// Report commands
// ============================================================================

async fn cmd_distribution(settings: &Settings, refresh: bool, send: bool) -> anyhow::Result<()> {
    let db = open_db(settings).await?;
    if refresh {
        refresh_distribution(db.pool(), &BitinfoChartsClient::new()).await?;
    }
    let msg = distribution_report(db.pool()).await?;
    deliver(settings, send, msg).await
}

async fn cmd_ingest(settings: &Settings, file: &std::path::Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)?;
    let snapshot = HoldingsSnapshot::from_json(&text)?;
    let db = open_db(settings).await?;
    let summary = ingest_snapshot(db.pool(), &snapshot).await?;

    println!(
        "Stored {} holdings for {} on {}",
        summary.written, summary.source, summary.date
    );
    if let Some(total) = summary.total_value {
        println!("Total value: ${}", format_compact(total));
    }
    if !summary.skipped.is_empty() {
        println!("Skipped: {}", summary.skipped.join(", "));
    }
    Ok(())
}

async fn cmd_whales(settings: &Settings, send: bool) -> anyhow::Result<()> {
    let db = open_db(settings).await?;
    let msg = whale_tracker_report(db.pool(), &default_entities()).await?;
    deliver(settings, send, Some(msg)).await
}

async fn cmd_volume(settings: &Settings, investor: InvestorProfile, send: bool) -> anyhow::Result<()> {
    let msg = volume_signal_report(&BinanceClient::new(), investor).await?;
    deliver(settings, send, msg).await
}

async fn cmd_etf(settings: &Settings, send: bool) -> anyhow::Result<()> {
    let db = open_db(settings).await?;
    let msg = etf_flow_report(db.pool()).await?;
    deliver(settings, send, msg).await
}

async fn cmd_fear_greed(settings: &Settings, send: bool) -> anyhow::Result<()> {
    let msg = fear_greed_report(&FearGreedClient::new()).await?;
    deliver(settings, send, msg).await
}

async fn cmd_daily(settings: &Settings, send: bool) -> anyhow::Result<()> {
    let db = open_db(settings).await?;
    let mut parts = Vec::new();

    match distribution_report(db.pool()).await {
        Ok(Some(msg)) => parts.push(msg),
        Ok(None) => {}
        Err(e) => error!("Distribution report failed: {}", e),
    }
    match fear_greed_report(&FearGreedClient::new()).await {
        Ok(Some(msg)) => parts.push(msg),
        Ok(None) => {}
        Err(e) => error!("Fear & Greed report failed: {}", e),
    }

    let msg = (!parts.is_empty()).then(|| parts.join("\n"));
    deliver(settings, send, msg).await
}

async fn cmd_backtest(
    settings: &Settings,
    request: BacktestRequest,
    export: Option<String>,
) -> anyhow::Result<()> {
    println!("\n=== Market Pulse v{} ===", APP_VERSION);
    println!(
        "Outlier backtest: {} / {} against {}",
        request.source, request.symbol, request.price_symbol
    );

    let db = open_db(settings).await?;
    let result = run_outlier_backtest(db.pool(), &BinanceClient::new(), &request).await?;
    println!("\n{}", engine::backtest::render_summary(&request.symbol, &result));

    if let Some(export_path) = export {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(&export_path, &json)?;
        println!("Results exported to {}", export_path);
    }
    Ok(())
}

// ============================================================================
// Serve command - Axum JSON API
// ============================================================================

async fn cmd_serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    info!("Market Pulse v{} starting...", APP_VERSION);

    let state = AppState {
        db: Arc::new(open_db(settings).await?),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new().nest("/api", api_routes(state)).layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Market Pulse v{} ===", APP_VERSION);
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /api/health              - Health check");
    println!("  GET  /api/sources             - Stored sources and date ranges");
    println!("  GET  /api/series/:source      - Daily series of a source");
    println!("  GET  /api/insights/:source    - Current insights of a source");
    println!("  GET  /api/backtests           - Stored backtest runs by EV");
    println!("\n  Database: {}", settings.db_path);
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api_health))
        .route("/sources", get(api_sources))
        .route("/series/:source", get(api_series))
        .route("/insights/:source", get(api_insights))
        .route("/backtests", get(api_backtests))
        .with_state(state)
}

/// GET /api/health
async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "market-pulse",
        "version": APP_VERSION,
    }))
}

/// GET /api/sources: stored sources with symbol counts and date ranges
async fn api_sources(State(state): State<AppState>) -> Json<serde_json::Value> {
    let repo = SeriesRepository::new(state.db.pool());
    match repo.list_sources().await {
        Ok(sources) => Json(serde_json::json!({
            "success": true,
            "data": sources,
        })),
        Err(e) => Json(serde_json::json!({
            "success": false,
            "error": format!("Failed to list sources: {}", e),
            "data": [],
        })),
    }
}

/// GET /api/series/:source: every symbol's daily series
async fn api_series(
    State(state): State<AppState>,
    Path(source): Path<String>,
) -> Json<serde_json::Value> {
    match engine::pipeline::load_universe(state.db.pool(), &source, &[]).await {
        Ok(universe) => Json(serde_json::json!({
            "success": true,
            "source": source,
            "count": universe.len(),
            "data": universe,
        })),
        Err(e) => {
            error!("Series query error: {}", e);
            Json(serde_json::json!({
                "success": false,
                "error": format!("Failed to load series: {}", e),
                "data": [],
            }))
        }
    }
}

/// GET /api/insights/:source: insights computed from stored data
async fn api_insights(
    State(state): State<AppState>,
    Path(source): Path<String>,
) -> Json<serde_json::Value> {
    match source_insights(state.db.pool(), &source).await {
        Ok(insights) => Json(serde_json::json!({
            "success": true,
            "source": source,
            "data": insights,
        })),
        Err(e) => {
            error!("Insights error: {}", e);
            Json(serde_json::json!({
                "success": false,
                "error": format!("Failed to compute insights: {}", e),
                "data": [],
            }))
        }
    }
}

/// GET /api/backtests: stored outlier backtest runs, best EV first
async fn api_backtests(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    let limit: i64 = params
        .get("limit")
        .and_then(|s| s.parse().ok())
        .unwrap_or(20);

    let repo = BacktestRepository::new(state.db.pool());
    match repo.top_runs(limit).await {
        Ok(records) => Json(serde_json::json!({
            "success": true,
            "data": records,
            "total": records.len(),
        })),
        Err(e) => Json(serde_json::json!({
            "success": false,
            "error": format!("Failed to query backtests: {}", e),
            "data": [],
            "total": 0,
        })),
    }
}
