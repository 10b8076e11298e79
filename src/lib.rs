// Country Ledger - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod gdp;
pub mod merger;
pub mod query;
pub mod reconciliation;
pub mod refresh;
pub mod report;
pub mod upstream;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::Config;
pub use db::{setup_database, CountryStore, SqliteCountryStore};
pub use entities::{name_key, CountryRecord};
pub use error::{LedgerError, LedgerResult};
pub use gdp::{estimate_gdp, RANDOM_FACTOR_MAX, RANDOM_FACTOR_MIN};
pub use merger::merge;
pub use query::{status, CountryQuery, QueryResult, SortKey, StatusSummary};
pub use reconciliation::{ReconciliationEngine, ReconciliationPlan, ReconciliationReport};
pub use refresh::{RefreshOutcome, Refresher};
pub use report::{PngRenderer, ReportRenderer, SummaryReport};
pub use upstream::{CurrencyDescriptor, ExchangeRateTable, RegistryEntry, UpstreamClient};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
