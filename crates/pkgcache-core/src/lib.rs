pub mod cache;
pub mod config;
pub mod error;
pub mod find;
pub mod location;
pub mod logging;
pub mod remove;
pub mod report;
pub mod stats;

pub use cache::{CacheAction, CacheManager};
pub use config::{CacheConfig, CoreConfig};
pub use error::{CoreError, CoreResult};
pub use find::{find_files, FileFinder};
pub use location::{cache_location, CacheType};
pub use report::{Level, ReportLine, Reporter, Status, UnitOutcome};
pub use stats::{format_size, tree_statistics, TreeStats};
