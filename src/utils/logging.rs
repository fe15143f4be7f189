/// 日志工具模块
///
/// 提供控制台日志初始化、持久化运行日志（`RunLog`）以及日志格式化辅助函数
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;

/// 报告级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    pub fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Success => "SUCCESS",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// 报告接收端
///
/// 以参数形式显式传给需要记录事件的组件，不使用全局状态。
pub trait Reporter: Send + Sync {
    fn record(&self, level: Level, message: &str);

    fn info(&self, message: &str) {
        self.record(Level::Info, message);
    }

    fn success(&self, message: &str) {
        self.record(Level::Success, message);
    }

    fn warning(&self, message: &str) {
        self.record(Level::Warning, message);
    }

    fn error(&self, message: &str) {
        self.record(Level::Error, message);
    }
}

/// 初始化控制台日志
///
/// 默认级别 `info`，可用 `RUST_LOG` 覆盖。重复调用无副作用。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 运行日志
///
/// 每条事件同时写入控制台（tracing）和追加模式的日志文件，写入后立即落盘。
pub struct RunLog {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl RunLog {
    /// 打开（或创建）日志文件并写入会话头
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| ConfigError::LogOpenFailed {
                path: path.clone(),
                source,
            })?;

        let header = format!(
            "{}\n抓取日志 - {}\n{}\n",
            "=".repeat(60),
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            "=".repeat(60)
        );
        file.write_all(header.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|source| ConfigError::LogOpenFailed {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 关闭日志文件，之后的记录只输出到控制台
    pub fn close(&self) {
        let mut guard = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(file) = guard.take() {
            let _ = file.sync_all();
        }
    }
}

impl Reporter for RunLog {
    fn record(&self, level: Level, message: &str) {
        match level {
            Level::Info => info!("{}", message),
            Level::Success => info!("✅ {}", message),
            Level::Warning => warn!("⚠️ {}", message),
            Level::Error => error!("❌ {}", message),
        }

        let line = format_line(level, message);
        let mut guard = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(file) = guard.as_mut() {
            // 写失败时只影响持久化日志，控制台已输出
            if file.write_all(line.as_bytes()).is_ok() {
                let _ = file.sync_data();
            }
        }
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        self.close();
    }
}

/// `[YYYY-mm-dd HH:MM:SS] [LEVEL] message\n`
pub fn format_line(level: Level, message: &str) -> String {
    format!(
        "[{}] [{}] {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        level.tag(),
        message
    )
}

/// 打印启动横幅
pub fn log_startup() {
    info!("{}", "=".repeat(60));
    info!("🧅 TOR 抓取器（单次模式）");
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `success`: 成功数量
/// - `failed`: 失败数量
/// - `total`: 总数
/// - `locations`: (说明, 路径) 列表
pub fn print_final_stats(success: usize, failed: usize, total: usize, locations: &[(&str, &Path)]) {
    info!("\n{}", "=".repeat(60));
    info!("📊 抓取完成");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("总计 URL: {}", total);
    info!("✅ 成功: {}", success);
    info!("❌ 失败: {}", failed);
    for (label, path) in locations {
        info!("{}: {}", label, path.display());
    }
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line_has_timestamp_and_tag() {
        let line = format_line(Level::Success, "ok");
        assert!(line.ends_with("] [SUCCESS] ok\n"));
        // [YYYY-mm-dd HH:MM:SS]
        assert_eq!(&line[0..1], "[");
        assert_eq!(&line[20..21], "]");
    }

    #[test]
    fn test_run_log_appends_and_keeps_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.log");
        std::fs::write(&path, "previous run\n").unwrap();

        let log = RunLog::open(&path).unwrap();
        log.info("first");
        log.warning("second");
        log.close();
        log.error("after close");

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("previous run\n"));
        assert!(content.contains("[INFO] first"));
        assert!(content.contains("[WARNING] second"));
        assert!(!content.contains("after close"));
    }

    #[test]
    fn test_run_log_open_failure_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.log");
        let err = RunLog::open(&path).err().unwrap();
        assert!(matches!(err, ConfigError::LogOpenFailed { .. }));
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("abcdef", 3), "abc...");
        assert_eq!(truncate_text("abc", 3), "abc");
    }
}
