//! Daily volume spike signals
//!
//! Each coin carries a profile measured in earlier backtests: how often a
//! spike was followed by a profitable hold, the average outcome either way,
//! and the detector parameters the numbers were measured with.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::outlier::same_sign_baseline;
use crate::types::Direction;

/// Risk appetite a profile set was tuned for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvestorProfile {
    Balanced,
    Aggressive,
}

impl fmt::Display for InvestorProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvestorProfile::Balanced => write!(f, "Balanced"),
            InvestorProfile::Aggressive => write!(f, "Aggressive"),
        }
    }
}

impl FromStr for InvestorProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "balanced" => Ok(InvestorProfile::Balanced),
            "aggressive" => Ok(InvestorProfile::Aggressive),
            other => Err(format!("unknown investor profile '{other}'")),
        }
    }
}

/// Backtested spike statistics for one trading pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinProfile {
    /// Display pair, e.g. `BTC/USDT`
    pub pair: String,
    /// Percent of spikes followed by a profitable hold
    pub win_rate: f64,
    pub avg_profit: f64,
    pub avg_loss: f64,
    pub holding_days: u32,
    pub window_size: usize,
    pub std_multiplier: f64,
}

impl CoinProfile {
    fn new(
        pair: &str,
        win_rate: f64,
        avg_profit: f64,
        avg_loss: f64,
        holding_days: u32,
        window_size: usize,
        std_multiplier: f64,
    ) -> Self {
        Self {
            pair: pair.to_string(),
            win_rate,
            avg_profit,
            avg_loss,
            holding_days,
            window_size,
            std_multiplier,
        }
    }

    /// Exchange symbol, e.g. `BTCUSDT`
    pub fn binance_symbol(&self) -> String {
        self.pair.replace('/', "")
    }

    pub fn kelly_fraction(&self) -> f64 {
        kelly_fraction(self.win_rate, self.avg_profit, self.avg_loss)
    }

    pub fn profitability_index(&self) -> f64 {
        profitability_index(self.win_rate, self.avg_profit, self.avg_loss)
    }
}

pub fn coin_profiles(profile: InvestorProfile) -> Vec<CoinProfile> {
    match profile {
        InvestorProfile::Balanced => vec![
            CoinProfile::new("BTC/USDT", 69.0, 6.42, 5.5, 6, 10, 2.5),
            CoinProfile::new("ETH/USDT", 60.0, 8.11, 6.42, 4, 20, 2.5),
            CoinProfile::new("SOL/USDT", 58.0, 16.04, 13.4, 6, 30, 2.0),
            CoinProfile::new("DOGE/USDT", 52.0, 20.0, 6.0, 5, 10, 2.0),
        ],
        InvestorProfile::Aggressive => vec![
            CoinProfile::new("BTC/USDT", 58.0, 9.39, 4.58, 7, 10, 2.5),
            CoinProfile::new("ETH/USDT", 55.0, 14.51, 7.7, 7, 20, 2.5),
            CoinProfile::new("SOL/USDT", 59.0, 14.57, 10.9, 5, 30, 2.0),
            CoinProfile::new("DOGE/USDT", 52.0, 23.03, 6.75, 7, 10, 2.5),
        ],
    }
}

/// Kelly criterion for a win rate given in percent; zero unless both averages are positive
pub fn kelly_fraction(win_rate: f64, avg_profit: f64, avg_loss: f64) -> f64 {
    let p = win_rate / 100.0;
    if avg_profit > 0.0 && avg_loss > 0.0 {
        p - (1.0 - p) * (avg_loss / avg_profit)
    } else {
        0.0
    }
}

pub fn profitability_index(win_rate: f64, avg_profit: f64, avg_loss: f64) -> f64 {
    let p = win_rate / 100.0;
    p * avg_profit + (1.0 - p) * avg_loss
}

/// A completed day whose volume broke out of its recent range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpike {
    pub volume: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub threshold: f64,
}

/// Test the last entry of `volumes` against the `window_size` entries before it.
///
/// `volumes` must hold completed days only, oldest first.
pub fn detect_volume_spike(
    volumes: &[f64],
    window_size: usize,
    std_multiplier: f64,
) -> Option<VolumeSpike> {
    let (&volume, history) = volumes.split_last()?;
    if window_size == 0 || history.len() < window_size {
        return None;
    }

    let window = &history[history.len() - window_size..];
    let baseline = same_sign_baseline(window, Direction::Increasing, std_multiplier)?;
    if volume <= baseline.threshold {
        return None;
    }

    Some(VolumeSpike {
        volume,
        mean: baseline.mean,
        std_dev: baseline.std_dev,
        threshold: baseline.threshold,
    })
}

/// A spike matched with the profile that makes it actionable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSignal {
    pub profile: CoinProfile,
    pub investor: InvestorProfile,
    pub spike: VolumeSpike,
}

impl VolumeSignal {
    pub fn message(&self) -> String {
        format!(
            "*{}: {}x Volume Spike Detected*\nRecommended Hold: {} days\nWin Rate: {}% | Kelly Fraction: {:.2} | Profitability Index: {:.2}\nInvestor Profile: {}",
            self.profile.pair,
            self.profile.std_multiplier,
            self.profile.holding_days,
            self.profile.win_rate,
            self.profile.kelly_fraction(),
            self.profile.profitability_index(),
            self.investor,
        )
    }
}

/// Check one profile against its completed daily volumes
pub fn evaluate_profile(
    profile: &CoinProfile,
    investor: InvestorProfile,
    volumes: &[f64],
) -> Option<VolumeSignal> {
    detect_volume_spike(volumes, profile.window_size, profile.std_multiplier).map(|spike| {
        VolumeSignal {
            profile: profile.clone(),
            investor,
            spike,
        }
    })
}
