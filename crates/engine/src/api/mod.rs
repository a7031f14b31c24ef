//! Public HTTP clients for market data and message delivery

pub mod binance;
pub mod bitinfocharts;
pub mod fear_greed;
pub mod telegram;

pub use binance::BinanceClient;
pub use bitinfocharts::BitinfoChartsClient;
pub use fear_greed::FearGreedClient;
pub use telegram::{Notifier, StdoutNotifier, TelegramNotifier};
