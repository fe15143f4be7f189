//! # Tor Fetch
//!
//! 经由 Tor 匿名抓取网页（渲染后的 HTML + 整页截图）
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/tor_transport` - SOCKS5 代理 HTTP 客户端，验证出口是否为 Tor
//! - `infrastructure/tor_control` - 控制端口客户端，请求新电路（NEWNYM）
//! - `browser/` - 每次尝试一个独立的无头浏览器会话
//!
//! ### ② 业务能力层（Services）
//! - `services/artifact_store` - 按集合和键保存 HTML 与截图
//!
//! ### ③ 流程层（Workflow）
//! - `FetchFlow` - 单个目标的 尝试 → 轮换 → 重试 状态机
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 顺序处理目标列表、保存产物、统计
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{PageRenderer, RenderSessionFactory, RenderedPage};
pub use config::{Config, RetryPolicy};
pub use error::{AppError, AppResult};
pub use infrastructure::{CircuitController, CircuitRotator, Rotation, TorTransport};
pub use models::{BatchSummary, FetchResult};
pub use orchestrator::{run_batch, App};
pub use services::{ArtifactSink, FsArtifactStore};
pub use utils::logging::{Level, Reporter, RunLog};
pub use workflow::FetchFlow;
