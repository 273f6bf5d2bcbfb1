pub mod collector;
pub mod config;
pub mod format;
pub mod logging;
pub mod narrative;
pub mod period;
pub mod report;
pub mod types;

pub use collector::{Collector, ExclusionMatcher, GitCli, RepositorySource};
pub use config::{Config, ConfigError};
pub use narrative::{generate_executive_summary, NarrativeCatalog, NarrativeSummary};
pub use period::Period;
pub use report::ReportData;
pub use types::*;
