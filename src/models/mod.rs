pub mod fetch_result;
pub mod loaders;

pub use fetch_result::{AttemptRecord, BatchSummary, FetchResult};
pub use loaders::{load_targets, parse_targets};
