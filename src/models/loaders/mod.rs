pub mod targets_loader;

pub use targets_loader::{load_targets, parse_targets};
