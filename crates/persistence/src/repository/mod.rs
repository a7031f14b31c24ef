//! Repository implementations for database operations

pub mod backtest;
pub mod series;

pub use backtest::*;
pub use series::*;
