//! Market Pulse Engine: trend insights over daily crypto series
//!
//! Provides:
//! - Streak, reversal and sudden-change detectors over day-over-day changes
//! - Insight selection and Telegram-ready rendering
//! - Bitcoin address distribution parsing, whale holdings snapshots and ETF flows
//! - Volume spike signals and outlier backtests
//! - Public API clients (Binance, bitinfocharts, alternative.me, Telegram)

pub mod api;
pub mod backtest;
pub mod distribution;
pub mod etf;
pub mod outlier;
pub mod pipeline;
pub mod ranking;
pub mod report;
pub mod reversal;
pub mod series;
pub mod snapshot;
pub mod streak;
pub mod types;
pub mod volume;

// Re-exports for convenience
pub use api::{
    BinanceClient, BitinfoChartsClient, FearGreedClient, Notifier, StdoutNotifier,
    TelegramNotifier,
};
pub use backtest::{grid_search, run_backtest, BacktestReport, GridSearchResult};
pub use distribution::{parse_distribution_history, DistributionRow, DISTRIBUTION_SOURCE};
pub use etf::{analyze_flows, FlowReport, ETF_SOURCE};
pub use outlier::{detect_sudden_change, scan_outliers, OutlierConfig, OutlierResult};
pub use pipeline::{
    align_to_latest, distribution_report, etf_flow_report, fear_greed_report, ingest_snapshot,
    refresh_distribution, run_outlier_backtest, source_insights, volume_signal_report,
    whale_tracker_report, BacktestRequest,
};
pub use ranking::{collect_insights, largest_moves, Insight, InsightConfig};
pub use reversal::{detect_reversal, ReversalResult};
pub use series::{ChangeSeries, Observation, Series, SymbolSeries};
pub use snapshot::{default_entities, HoldingsSnapshot, TrackedEntity};
pub use streak::{detect_streak, longest_streaks, StreakGroup, StreakResult};
pub use types::*;
pub use volume::{coin_profiles, CoinProfile, InvestorProfile};
