//! NAV arithmetic: point-in-time NAV, period returns, lifespans and daily
//! history

pub mod calculator;
pub mod history;
pub mod lifespan;
pub mod returns;

pub use calculator::{NavCalculator, NetNav, PositionValue};
pub use history::{HistoryBuilder, HistorySummary};
pub use lifespan::{HistoricalReturn, LifespanAnalyzer};
pub use returns::lifetime_apr;
