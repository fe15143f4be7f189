//! 编排层（Orchestration Layer）
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<Target>)
//!     ↓
//! workflow::FetchFlow (处理单个 Target：尝试 / 轮换 / 重试)
//!     ↓
//! browser (渲染会话) + infrastructure (Tor 代理 / 控制端口)
//!     ↓
//! services (产物存储)
//! ```
//!
//! 只有编排层知道"批量"；下层组件只处理单个目标或单次尝试。

pub mod batch_processor;

pub use batch_processor::{run_batch, App};
