//! Console and file output shared by the commands

pub mod compare;
pub mod output;
pub mod table;

pub use compare::{compare_pool, select_pools, AprComparison, ComparisonSummary};
pub use output::{resolve_output_path, write_json};
pub use table::{new_table, numeric_row, pct, signed_pct, signed_usd, usd, usd0};
