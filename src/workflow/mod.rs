pub mod fetch_ctx;
pub mod fetch_flow;

pub use fetch_ctx::AttemptCtx;
pub use fetch_flow::FetchFlow;
