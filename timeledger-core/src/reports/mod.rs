pub mod csv;
pub mod filter;
pub mod handlers;
pub mod stats;

pub use csv::export_csv;
pub use filter::{visible_sessions, DateFilter, SessionFilter};
pub use stats::{earning_figures, ledger_stats, LedgerStats};
