//! Text rendering for Telegram (legacy Markdown)
//!
//! Everything here is presentation: detectors hand over structured results
//! and these functions turn them into message lines and fixed-width tables.

use std::collections::HashMap;

use crate::api::fear_greed::FearGreedReading;
use crate::etf::{FlowReport, TREND_DAYS};
use crate::ranking::{Insight, Move};
use crate::series::SymbolSeries;
use crate::snapshot::TrackedEntity;
use crate::types::Direction;

/// Telegram rejects messages above this many characters
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Vocabulary for one kind of series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wording {
    pub up: &'static str,
    pub down: &'static str,
    /// Appended to amounts, empty for unitless series
    pub unit: &'static str,
    pub decimals: usize,
}

impl Wording {
    pub const BTC_HOLDINGS: Wording = Wording {
        up: "buying",
        down: "selling",
        unit: "BTC",
        decimals: 0,
    };

    pub const HOLDINGS: Wording = Wording {
        up: "buying",
        down: "selling",
        unit: "",
        decimals: 0,
    };

    fn word(&self, direction: Direction) -> &'static str {
        match direction {
            Direction::Increasing => self.up,
            Direction::Decreasing => self.down,
        }
    }

    fn amount(&self, value: f64) -> String {
        let number = group_thousands(value, self.decimals);
        if self.unit.is_empty() {
            number
        } else {
            format!("{number} {}", self.unit)
        }
    }
}

/// How insight lines are numbered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightNumbering {
    /// `*1)* line` for every line
    Bold,
    /// `1) line`, a lone line stays unnumbered
    PlainOmitSingle,
}

/// Escape characters that legacy Markdown would interpret
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '`' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Fixed-point number with `,` thousands separators
pub fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }

    let is_zero = grouped.chars().all(|c| matches!(c, '0' | ',' | '.'));
    if value < 0.0 && !is_zero {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Like `group_thousands` but always carries a sign (`+0` for zero)
pub fn format_signed(value: f64, decimals: usize) -> String {
    let grouped = group_thousands(value, decimals);
    if grouped.starts_with('-') {
        grouped
    } else {
        format!("+{grouped}")
    }
}

/// Compact amount with K/M/B suffix and three decimals
pub fn format_compact(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1_000_000_000.0 {
        format!("{:.3}B", value / 1_000_000_000.0)
    } else if abs >= 1_000_000.0 {
        format!("{:.3}M", value / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{:.3}K", value / 1_000.0)
    } else {
        format!("{value:.3}")
    }
}

fn days(n: usize) -> &'static str {
    if n == 1 {
        "day"
    } else {
        "days"
    }
}

fn render_move(label: &str, m: &Move, wording: &Wording) -> String {
    format!(
        "{} saw the largest {label} {} (*{:+.2}%*).",
        escape_markdown(&m.symbol),
        format_signed(m.abs_change, wording.decimals),
        m.pct_change
    )
}

/// One human-readable line for an insight
pub fn render_insight(insight: &Insight, wording: &Wording) -> String {
    match insight {
        Insight::Streak(group) => {
            let mut parts = Vec::new();
            if !group.increasing.is_empty() {
                parts.push(format!("{} {}", join_symbols(&group.increasing), wording.up));
            }
            if !group.decreasing.is_empty() {
                parts.push(format!("{} {}", join_symbols(&group.decreasing), wording.down));
            }
            format!(
                "{} for *{} days straight*.",
                parts.join(" and "),
                group.length
            )
        }
        Insight::Reversal { symbol, reversal } => format!(
            "{} shifted to {} *after {} {} of {}*.",
            escape_markdown(symbol),
            wording.word(reversal.new_direction),
            reversal.prior_length,
            days(reversal.prior_length),
            wording.word(reversal.prior_direction)
        ),
        Insight::LargestIncrease(m) => render_move("increase", m, wording),
        Insight::LargestDecrease(m) => render_move("decrease", m, wording),
        Insight::SuddenChange {
            symbol,
            window_size,
            outlier,
        } => {
            let verb = match outlier.direction {
                Direction::Increasing => "increased",
                Direction::Decreasing => "decreased",
            };
            format!(
                "{} {verb} by *{}*, well above the {window_size}-day average of {}.",
                escape_markdown(symbol),
                wording.amount(outlier.magnitude),
                wording.amount(outlier.mean)
            )
        }
    }
}

fn join_symbols(symbols: &[String]) -> String {
    symbols
        .iter()
        .map(|s| escape_markdown(s))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Number rendered insight lines
pub fn number_insights(lines: &[String], numbering: InsightNumbering) -> Vec<String> {
    match numbering {
        InsightNumbering::Bold => lines
            .iter()
            .enumerate()
            .map(|(i, line)| format!("*{})* {line}", i + 1))
            .collect(),
        InsightNumbering::PlainOmitSingle if lines.len() == 1 => lines.to_vec(),
        InsightNumbering::PlainOmitSingle => lines
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{}) {line}", i + 1))
            .collect(),
    }
}

/// Render and number a list of insights
pub fn render_insights(
    insights: &[Insight],
    wording: &Wording,
    numbering: InsightNumbering,
) -> Vec<String> {
    let lines: Vec<String> = insights.iter().map(|i| render_insight(i, wording)).collect();
    number_insights(&lines, numbering)
}

fn delta_cell(series: &SymbolSeries, back: usize) -> String {
    match (series.series.value_back(0), series.series.value_back(back)) {
        (Some(now), Some(then)) => format_signed(now - then, 0),
        _ => "n/a".to_string(),
    }
}

fn step_cell(series: &SymbolSeries, newer: usize) -> String {
    match (
        series.series.value_back(newer),
        series.series.value_back(newer + 1),
    ) {
        (Some(a), Some(b)) => format_signed(a - b, 0),
        _ => "n/a".to_string(),
    }
}

/// Address-bucket table: balance today plus today/yesterday/30-day deltas
pub fn render_distribution_table(universe: &[SymbolSeries]) -> String {
    let mut msg = String::from("📊 *Bitcoin Distribution Table*\n```\n");
    msg.push_str(&format!(
        "{:<20}{:<15}{:<12}{:<12}{:<12}\n",
        "BTC Addresses", "# BTC Held", "Today", "Yesterday", "Last Month"
    ));
    msg.push_str(&"-".repeat(70));
    msg.push('\n');

    for entry in universe {
        let held = entry
            .series
            .value_back(0)
            .map(|v| group_thousands(v.trunc(), 0))
            .unwrap_or_else(|| "n/a".to_string());
        msg.push_str(&format!(
            "{:<20}{:<15}{:<12}{:<12}{:<12}\n",
            entry.symbol,
            held,
            step_cell(entry, 0),
            step_cell(entry, 1),
            delta_cell(entry, 30)
        ));
    }

    msg.push_str("```\n");
    msg
}

/// Whale tracker message: insights per entity, grouped by category
pub fn render_whale_tracker(
    entities: &[TrackedEntity],
    insights: &HashMap<String, Vec<String>>,
) -> String {
    let mut categories: Vec<&str> = Vec::new();
    for entity in entities {
        if !categories.contains(&entity.category.as_str()) {
            categories.push(entity.category.as_str());
        }
    }

    let mut blocks = Vec::new();
    let mut unchanged: Vec<(&str, Vec<&str>)> = Vec::new();

    for category in categories {
        let mut block = String::new();
        let mut quiet = Vec::new();
        for entity in entities.iter().filter(|e| e.category == category) {
            match insights.get(&entity.key).filter(|lines| !lines.is_empty()) {
                Some(lines) => {
                    block.push_str(&format!("│   {}\n", entity.title));
                    for line in lines {
                        block.push_str(&format!("│   └── {line}\n"));
                    }
                }
                None => quiet.push(entity.title.as_str()),
            }
        }
        if !block.is_empty() {
            blocks.push(format!("*{category}*\n{block}"));
        }
        if !quiet.is_empty() {
            unchanged.push((category, quiet));
        }
    }

    let mut msg = String::from("🐋 *WHALE TRACKER*\n\n");
    msg.push_str(&blocks.join("\n"));

    if !unchanged.is_empty() {
        msg.push_str("\n*Entities with No Portfolio Changes*\n");
        for (category, titles) in unchanged {
            msg.push_str(&format!("│   {category}: {}\n", titles.join(", ")));
        }
    }
    msg
}

fn flow_cell(value: Option<f64>, missing: &str) -> String {
    value.map_or_else(|| missing.to_string(), |v| format!("{v:.2}M"))
}

/// ETF flow table followed by bold-numbered sudden buys and trends
pub fn render_etf_flows(report: &FlowReport) -> String {
    let mut msg = format!("📊 *ETFs/ETPs* (As of {})\n```\n", report.as_of);
    msg.push_str(&format!(
        "{:<20}  {:<15}  {:<25}  {:<15}\n",
        "Asset", "Today", "Previous Trading Day", "Last Month"
    ));
    msg.push_str(&"-".repeat(76));
    msg.push('\n');
    for row in &report.rows {
        msg.push_str(&format!(
            "{:<20}  {:<15}  {:<25}  {:<15}\n",
            row.title,
            flow_cell(row.latest, "No Data"),
            flow_cell(row.previous, "No Data"),
            flow_cell(row.month_total, "N/A")
        ));
    }
    msg.push_str("```\n");

    let mut lines: Vec<String> = report
        .sudden_buys
        .iter()
        .map(|b| {
            format!(
                "Sudden buy detected today for {}: {:.2}M vs a {:.2}M average.",
                b.title, b.flow, b.average
            )
        })
        .collect();
    if lines.is_empty() {
        lines.push("No sudden changes detected today.".to_string());
    }

    let trend_lines: Vec<String> = report
        .trends
        .iter()
        .map(|t| {
            let word = match t.direction {
                Direction::Increasing => "buying",
                Direction::Decreasing => "selling",
            };
            format!("Continuous {word} detected for {} over the last {} days.", t.title, t.days)
        })
        .collect();
    if trend_lines.is_empty() {
        lines.push(format!(
            "No continuous buying or selling detected over the last {TREND_DAYS} days."
        ));
    } else {
        lines.extend(trend_lines);
    }

    for line in number_insights(&lines, InsightNumbering::Bold) {
        msg.push_str(&line);
        msg.push('\n');
    }
    msg
}

fn grade_emoji(classification: &str) -> &'static str {
    let lower = classification.to_lowercase();
    if lower.contains("fear") {
        "🟢"
    } else if lower.contains("greed") {
        "🔴"
    } else {
        "🟡"
    }
}

fn grade_sentence(classification: &str) -> Option<&'static str> {
    match classification {
        "Extreme Fear" => Some("*Extreme Fear* in the market: investors are highly cautious, which could indicate a buying opportunity."),
        "Fear" => Some("*Fear* is present: sentiment is bearish and traders are hesitant."),
        "Neutral" => Some("*Neutral* market sentiment: investors are undecided, leading to mixed signals."),
        "Greed" => Some("*Greed* is driving the market: investors are optimistic, but caution is advised."),
        "Extreme Greed" => Some("*Extreme Greed* in the market: prices may be overheating, increasing the risk of a correction."),
        _ => None,
    }
}

fn percent_vs(today: u32, previous: u32) -> String {
    if previous == 0 {
        return "n/a".to_string();
    }
    let pct = (today as f64 - previous as f64) / previous as f64 * 100.0;
    format!("{}%", format_signed(pct, 2))
}

/// Fear & Greed table from history ordered newest first.
///
/// Needs at least 31 readings (today, yesterday, a week and a month back).
pub fn render_fear_greed(history: &[FearGreedReading]) -> Option<String> {
    let today = history.first()?;
    let yesterday = history.get(1)?;
    let last_week = history.get(7)?;
    let last_month = history.get(30)?;

    let mut msg = format!("{} *Greed and Fear Index*\n```\n", grade_emoji(&today.classification));
    msg.push_str(&format!(
        "{:<20}{:<20}{:<20}{:<20}\n",
        "Today", "Yesterday", "Last Week", "Last Month"
    ));
    msg.push_str(&"-".repeat(71));
    msg.push('\n');
    msg.push_str(&format!(
        "{:<20}{:<20}{:<20}{:<20}\n",
        today.classification,
        yesterday.classification,
        last_week.classification,
        last_month.classification
    ));
    msg.push_str(&format!(
        "{:<20}{:<20}{:<20}{:<20}\n",
        format!("{} (1-100)", today.value),
        percent_vs(today.value, yesterday.value),
        percent_vs(today.value, last_week.value),
        percent_vs(today.value, last_month.value)
    ));
    msg.push_str("```\n");
    if let Some(sentence) = grade_sentence(&today.classification) {
        msg.push_str(sentence);
        msg.push('\n');
    }
    Some(msg)
}

/// Split on line boundaries so each chunk stays within `limit` characters.
/// A single over-long line is cut at character boundaries.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outlier::OutlierResult;
    use crate::reversal::ReversalResult;
    use crate::series::Series;
    use crate::streak::StreakGroup;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, d).unwrap()
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(1234567.0, 0), "1,234,567");
        assert_eq!(group_thousands(-1234.5, 2), "-1,234.50");
        assert_eq!(group_thousands(999.0, 0), "999");
        assert_eq!(group_thousands(-0.2, 0), "0");
        assert_eq!(format_signed(0.0, 0), "+0");
        assert_eq!(format_signed(-12000.0, 0), "-12,000");
        assert_eq!(format_signed(2500.4, 0), "+2,500");
    }

    #[test]
    fn test_format_compact() {
        assert_eq!(format_compact(1_500_000_000.0), "1.500B");
        assert_eq!(format_compact(2_345_000.0), "2.345M");
        assert_eq!(format_compact(-12_000.0), "-12.000K");
        assert_eq!(format_compact(12.5), "12.500");
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("stETH_v2 [old]"), "stETH\\_v2 \\[old\\]");
    }

    #[test]
    fn test_render_lines() {
        let streak = Insight::Streak(StreakGroup {
            length: 4,
            increasing: vec!["ETH".into(), "WBTC".into()],
            decreasing: vec!["LINK".into()],
        });
        assert_eq!(
            render_insight(&streak, &Wording::HOLDINGS),
            "ETH, WBTC buying and LINK selling for *4 days straight*."
        );

        let reversal = Insight::Reversal {
            symbol: "100+ BTC".into(),
            reversal: ReversalResult {
                new_direction: Direction::Increasing,
                prior_direction: Direction::Decreasing,
                prior_length: 3,
            },
        };
        assert_eq!(
            render_insight(&reversal, &Wording::BTC_HOLDINGS),
            "100+ BTC shifted to buying *after 3 days of selling*."
        );

        let decrease = Insight::LargestDecrease(Move {
            symbol: "AAVE".into(),
            abs_change: -1500.0,
            pct_change: -7.456,
        });
        assert_eq!(
            render_insight(&decrease, &Wording::HOLDINGS),
            "AAVE saw the largest decrease -1,500 (*-7.46%*)."
        );

        let sudden = Insight::SuddenChange {
            symbol: "10 - 100 BTC".into(),
            window_size: 30,
            outlier: OutlierResult {
                date: day(2),
                change: -12500.0,
                direction: Direction::Decreasing,
                magnitude: 12500.0,
                mean: 1800.4,
                std_dev: 900.0,
                threshold: 2700.4,
            },
        };
        assert_eq!(
            render_insight(&sudden, &Wording::BTC_HOLDINGS),
            "10 - 100 BTC decreased by *12,500 BTC*, well above the 30-day average of 1,800 BTC."
        );
    }

    #[test]
    fn test_numbering() {
        let lines = vec!["a".to_string(), "b".to_string()];
        assert_eq!(number_insights(&lines, InsightNumbering::Bold), vec!["*1)* a", "*2)* b"]);
        assert_eq!(
            number_insights(&lines, InsightNumbering::PlainOmitSingle),
            vec!["1) a", "2) b"]
        );
        assert_eq!(
            number_insights(&lines[..1], InsightNumbering::PlainOmitSingle),
            vec!["a"]
        );
    }

    #[test]
    fn test_distribution_table_short_history() {
        let series = Series::from_pairs(vec![(day(1), 1000.0), (day(2), 1500.0), (day(3), 1200.0)]);
        let table = render_distribution_table(&[SymbolSeries::new("1 - 10 BTC", series)]);
        let row = table.lines().nth(4).unwrap();
        assert_eq!(
            row,
            format!("{:<20}{:<15}{:<12}{:<12}{:<12}", "1 - 10 BTC", "1,200", "-300", "+500", "n/a")
        );
        assert!(table.starts_with("📊 *Bitcoin Distribution Table*\n```\n"));
        assert!(table.ends_with("```\n"));
    }

    #[test]
    fn test_whale_tracker_layout() {
        let entities = vec![
            TrackedEntity::new("blackrock", "BlackRock", "ETFs"),
            TrackedEntity::new("ark", "ARK Invest", "ETFs"),
            TrackedEntity::new("binance", "Binance", "CEX"),
        ];
        let mut insights = HashMap::new();
        insights.insert("blackrock".to_string(), vec!["ETH buying for *3 days straight*.".to_string()]);

        let msg = render_whale_tracker(&entities, &insights);
        assert_eq!(
            msg,
            "🐋 *WHALE TRACKER*\n\n\
             *ETFs*\n\
             │   BlackRock\n\
             │   └── ETH buying for *3 days straight*.\n\
             \n*Entities with No Portfolio Changes*\n\
             │   ETFs: ARK Invest\n\
             │   CEX: Binance\n"
        );
    }

    #[test]
    fn test_fear_greed_needs_a_month() {
        let reading = |value: u32, classification: &str| FearGreedReading {
            value,
            classification: classification.to_string(),
            date: day(1),
        };
        assert!(render_fear_greed(&[reading(20, "Fear")]).is_none());

        let mut history = vec![reading(20, "Extreme Fear"), reading(25, "Fear")];
        history.extend((0..29).map(|_| reading(50, "Neutral")));
        let msg = render_fear_greed(&history).unwrap();
        assert!(msg.starts_with("🟢 *Greed and Fear Index*"));
        assert!(msg.contains("20 (1-100)"));
        assert!(msg.contains("-20.00%"));
        assert!(msg.contains("-60.00%"));
        assert!(msg.contains("*Extreme Fear* in the market"));
    }

    #[test]
    fn test_split_message() {
        let text = "aaaa\nbbbb\ncc\n";
        assert_eq!(split_message(text, 10), vec!["aaaa\nbbbb\n", "cc\n"]);
        assert_eq!(split_message("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(split_message("short", TELEGRAM_MESSAGE_LIMIT), vec!["short"]);
    }

    #[test]
    fn test_render_etf_flows() {
        use crate::etf::{FlowSummary, FlowTrend, SuddenBuy};

        let report = FlowReport {
            as_of: day(7),
            rows: vec![
                FlowSummary {
                    title: "BlackRock (IBIT)".to_string(),
                    latest: Some(250.0),
                    previous: Some(-12.3),
                    month_total: Some(900.5),
                },
                FlowSummary {
                    title: "Bitwise (BITB)".to_string(),
                    latest: None,
                    previous: None,
                    month_total: None,
                },
            ],
            sudden_buys: vec![SuddenBuy {
                title: "BlackRock (IBIT)".to_string(),
                flow: 250.0,
                average: 40.0,
            }],
            trends: vec![FlowTrend {
                title: "BlackRock (IBIT)".to_string(),
                direction: Direction::Increasing,
                days: 4,
            }],
        };

        let msg = render_etf_flows(&report);
        assert!(msg.starts_with("📊 *ETFs/ETPs* (As of 2025-05-07)\n```\n"));
        assert!(msg.contains("BlackRock (IBIT)      250.00M          -12.30M                    900.50M"));
        assert!(msg.contains("Bitwise (BITB)        No Data          No Data                    N/A"));
        assert!(msg.contains("*1)* Sudden buy detected today for BlackRock (IBIT): 250.00M vs a 40.00M average.\n"));
        assert!(msg.contains("*2)* Continuous buying detected for BlackRock (IBIT) over the last 4 days.\n"));

        let quiet = FlowReport {
            sudden_buys: Vec::new(),
            trends: Vec::new(),
            ..report
        };
        let msg = render_etf_flows(&quiet);
        assert!(msg.contains("*1)* No sudden changes detected today.\n"));
        assert!(msg.contains("*2)* No continuous buying or selling detected over the last 3 days.\n"));
    }
}
