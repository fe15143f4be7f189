pub mod logging;

pub use logging::{Level, Reporter, RunLog};
