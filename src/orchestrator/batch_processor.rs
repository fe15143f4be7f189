//! 批量目标处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责目标列表的顺序处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：打开运行日志、加载目标列表（失败即终止）
//! 2. **匿名验证**：通过代理客户端确认 Tor 出口（失败只告警）
//! 3. **顺序处理**：按输入顺序逐个调用 `FetchFlow`
//! 4. **产物保存**：HTML 与截图独立保存，互不影响
//! 5. **限速**：目标之间固定间隔，最后一个之后不等待
//! 6. **全局统计**：汇总成功/失败数量

use tokio::time::sleep;

use crate::browser::{PageRenderer, RenderSessionFactory};
use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{CircuitController, CircuitRotator, TorTransport};
use crate::models::{load_targets, BatchSummary, FetchResult};
use crate::services::{
    artifact_key, ArtifactSink, FsArtifactStore, HTML_COLLECTION, SCREENSHOT_COLLECTION,
};
use crate::utils::logging::{self, Reporter, RunLog};
use crate::workflow::FetchFlow;

/// 应用主结构
pub struct App {
    config: Config,
    report: RunLog,
    targets: Vec<String>,
}

impl App {
    /// 初始化应用
    ///
    /// 日志文件无法打开或目标文件无法读取/解析时返回错误。
    pub async fn initialize(config: Config) -> AppResult<Self> {
        let report = RunLog::open(&config.output_log_file)?;
        report.info("程序已启动");

        log_settings(&config, &report);

        let targets = match load_targets(&config.targets_file).await {
            Ok(targets) => targets,
            Err(e) => {
                report.error(&format!("无法读取目标: {}", e));
                return Err(e.into());
            }
        };
        report.info(&format!("共找到 {} 个目标", targets.len()));

        Ok(Self {
            config,
            report,
            targets,
        })
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> BatchSummary {
        self.verify_transport().await;

        let renderer = RenderSessionFactory::new(
            self.config.tor_proxy.clone(),
            self.config.browser.clone(),
            self.config.policy.navigation_wait,
        );
        let rotator =
            CircuitController::new(self.config.tor_control.clone(), self.config.control_timeout);
        let flow = FetchFlow::new(renderer, rotator, self.config.policy.clone());
        let store = FsArtifactStore::new(&self.config.output_root);

        if self.targets.is_empty() {
            self.report.warning("没有待处理的目标");
        }
        self.report.info("开始抓取...");

        let summary = run_batch(&self.targets, &flow, &store, &self.report).await;

        self.report.info(&format!(
            "抓取完成 - 成功: {}, 失败: {}",
            summary.success, summary.failed
        ));
        if summary.persistence_failures > 0 {
            self.report.warning(&format!(
                "{} 个产物未能保存",
                summary.persistence_failures
            ));
        }

        let html_dir = self.config.html_dir();
        let screenshot_dir = self.config.screenshot_dir();
        logging::print_final_stats(
            summary.success,
            summary.failed,
            summary.total,
            &[
                ("日志", self.report.path()),
                ("数据", html_dir.as_path()),
                ("截图", screenshot_dir.as_path()),
            ],
        );

        summary
    }

    /// 关闭运行日志
    pub fn shutdown(self) {
        self.report.info("程序结束");
        self.report.close();
    }

    /// 确认代理出口为 Tor，失败不影响后续抓取
    async fn verify_transport(&self) {
        let transport = match TorTransport::new(&self.config.tor_proxy, &self.config.transport) {
            Ok(transport) => transport,
            Err(e) => {
                self.report.error(&format!("无法创建 Tor 客户端: {}", e));
                return;
            }
        };

        self.report.info("正在检查 Tor 连接...");
        match transport.verify(&self.config.check_url).await {
            Ok(check) => {
                self.report.info(&format!(
                    "Tor IP 检查: {}",
                    logging::truncate_text(check.body.trim(), 200)
                ));
                self.report.success(&format!(
                    "Tor 连接已确认! 出口 IP: {}",
                    check.ip.as_deref().unwrap_or("未知")
                ));
            }
            Err(e) => {
                self.report.warning(&format!("Tor 验证错误: {}", e));
                self.report
                    .info("提示: Tor Browser 监听 9150 端口，系统 Tor 服务监听 9050 端口");
                self.report
                    .warning("继续运行... (请确认 Tor 服务正在运行)");
            }
        }
    }
}

/// 按顺序处理所有目标
pub async fn run_batch<R, C, S>(
    targets: &[String],
    flow: &FetchFlow<R, C>,
    store: &S,
    report: &dyn Reporter,
) -> BatchSummary
where
    R: PageRenderer,
    C: CircuitRotator,
    S: ArtifactSink + ?Sized,
{
    let total = targets.len();
    let mut summary = BatchSummary {
        total,
        ..Default::default()
    };

    for (idx, target) in targets.iter().enumerate() {
        report.info(&format!("[{}/{}] 处理中: {}", idx + 1, total, target));

        let result = flow.run(target, report).await;

        if result.success {
            summary.success += 1;
            summary.persistence_failures += persist_result(&result, store, report).await;
        } else {
            summary.failed += 1;
            report.error(&format!(
                "失败: {} -> {}",
                target,
                result.error.as_deref().unwrap_or("未知错误")
            ));
        }

        // 目标之间限速，最后一个之后不等待
        if idx + 1 < total {
            sleep(flow.policy().inter_target_delay).await;
        }
    }

    summary
}

/// 分别保存 HTML 和截图，返回失败数量
async fn persist_result<S>(result: &FetchResult, store: &S, report: &dyn Reporter) -> usize
where
    S: ArtifactSink + ?Sized,
{
    let mut failures = 0;

    if let Some(html) = &result.html {
        let key = artifact_key(&result.target, &result.fetched_at, "html");
        if let Err(e) = store.save(HTML_COLLECTION, &key, html.as_bytes()).await {
            report.error(&format!("HTML 保存失败: {}", e));
            failures += 1;
        }
    }

    if let Some(image) = &result.image {
        let key = artifact_key(&result.target, &result.fetched_at, "png");
        if let Err(e) = store.save(SCREENSHOT_COLLECTION, &key, image).await {
            report.error(&format!("截图保存失败: {}", e));
            failures += 1;
        }
    }

    failures
}

// ========== 日志辅助函数 ==========

fn log_settings(config: &Config, report: &dyn Reporter) {
    report.info(&format!("目标文件: {}", config.targets_file.display()));
    report.info(&format!("Tor 代理: {}", config.tor_proxy));
    report.info(&format!(
        "Tor 控制: {}",
        config.tor_control.as_deref().unwrap_or("未配置（不轮换身份）")
    ));
    report.info(&format!(
        "策略: 最多 {} 次尝试, 单次时限 {:?}, 稳定等待 {:?}",
        config.policy.max_attempts, config.policy.attempt_timeout, config.policy.settle_delay
    ));
}
