use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "tor-fetch.toml";

/// 重试/轮换策略
///
/// 状态机的主要可调参数，默认值与参考行为一致。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 每个目标最多尝试次数
    pub max_attempts: u32,
    /// 轮换（或无控制端口时）后的稳定等待
    pub settle_delay: Duration,
    /// 导航后等待页面静默的时间
    pub navigation_wait: Duration,
    /// 单次尝试硬性时限
    pub attempt_timeout: Duration,
    /// 目标之间的间隔（限速）
    pub inter_target_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            settle_delay: Duration::from_secs(5),
            navigation_wait: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(120),
            inter_target_delay: Duration::from_secs(2),
        }
    }
}

/// 代理 HTTP 客户端参数
#[derive(Clone, Debug)]
pub struct TransportSettings {
    pub request_timeout: Duration,
    pub max_idle_connections: usize,
    pub idle_timeout: Duration,
    pub handshake_timeout: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(120),
            max_idle_connections: 10,
            idle_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(60),
        }
    }
}

/// 无头浏览器参数
#[derive(Clone, Debug)]
pub struct BrowserSettings {
    pub window_width: u32,
    pub window_height: u32,
    /// 自定义浏览器可执行文件，缺省时由 chromiumoxide 自动查找
    pub chrome_executable: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            window_width: 1920,
            window_height: 1080,
            chrome_executable: None,
        }
    }
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 目标列表（YAML）
    pub targets_file: PathBuf,
    /// Tor SOCKS 代理地址
    pub tor_proxy: String,
    /// Tor 控制端口地址，`None` 表示不轮换
    pub tor_control: Option<String>,
    /// 控制协议连接时限
    pub control_timeout: Duration,
    /// 匿名验证地址
    pub check_url: String,
    /// 产物根目录
    pub output_root: PathBuf,
    /// 持久化日志文件
    pub output_log_file: PathBuf,
    pub policy: RetryPolicy,
    pub transport: TransportSettings,
    pub browser: BrowserSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            targets_file: PathBuf::from("targets.yaml"),
            // Tor Browser 默认端口；系统 tor 服务为 9050/9051
            tor_proxy: "127.0.0.1:9150".to_string(),
            tor_control: Some("127.0.0.1:9151".to_string()),
            control_timeout: Duration::from_secs(10),
            check_url: "https://check.torproject.org/api/ip".to_string(),
            output_root: PathBuf::from("."),
            output_log_file: PathBuf::from("fetch_report.log"),
            policy: RetryPolicy::default(),
            transport: TransportSettings::default(),
            browser: BrowserSettings::default(),
        }
    }
}

/// `tor-fetch.toml` 的内容，所有字段可选
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    targets_file: Option<PathBuf>,
    tor_proxy: Option<String>,
    tor_control: Option<String>,
    control_timeout_secs: Option<u64>,
    check_url: Option<String>,
    output_root: Option<PathBuf>,
    output_log_file: Option<PathBuf>,
    chrome_executable: Option<PathBuf>,
    max_attempts: Option<u32>,
    settle_delay_secs: Option<u64>,
    navigation_wait_secs: Option<u64>,
    attempt_timeout_secs: Option<u64>,
    inter_target_delay_secs: Option<u64>,
}

impl Config {
    /// 按优先级加载：默认值 < 配置文件 < 环境变量 < 命令行参数
    pub fn load(args: &[String]) -> Result<Self, ConfigError> {
        let path = std::env::var("TOR_FETCH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        let base = if path.exists() {
            Self::from_toml_file(&path)?
        } else {
            Self::default()
        };
        Ok(base.apply_env().with_args(args))
    }

    /// 从 TOML 文件读取，未出现的字段取默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            ConfigError::ConfigFileReadFailed {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::ConfigFileInvalid {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let file: FileConfig = toml::from_str(content)?;
        let mut config = Self::default();
        if let Some(v) = file.targets_file {
            config.targets_file = v;
        }
        if let Some(v) = file.tor_proxy {
            config.tor_proxy = v;
        }
        if let Some(v) = file.tor_control {
            config.tor_control = parse_control_addr(&v);
        }
        if let Some(v) = file.control_timeout_secs {
            config.control_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.check_url {
            config.check_url = v;
        }
        if let Some(v) = file.output_root {
            config.output_root = v;
        }
        if let Some(v) = file.output_log_file {
            config.output_log_file = v;
        }
        if file.chrome_executable.is_some() {
            config.browser.chrome_executable = file.chrome_executable;
        }
        if let Some(v) = file.max_attempts {
            config.policy.max_attempts = v.max(1);
        }
        if let Some(v) = file.settle_delay_secs {
            config.policy.settle_delay = Duration::from_secs(v);
        }
        if let Some(v) = file.navigation_wait_secs {
            config.policy.navigation_wait = Duration::from_secs(v);
        }
        if let Some(v) = file.attempt_timeout_secs {
            config.policy.attempt_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.inter_target_delay_secs {
            config.policy.inter_target_delay = Duration::from_secs(v);
        }
        Ok(config)
    }

    /// 仅从环境变量加载（以默认值为基础）
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    fn apply_env(self) -> Self {
        let secs = |name: &str, default: Duration| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        let policy = RetryPolicy {
            max_attempts: std::env::var("MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .map(|v| v.max(1))
                .unwrap_or(self.policy.max_attempts),
            settle_delay: secs("SETTLE_DELAY_SECS", self.policy.settle_delay),
            navigation_wait: secs("NAVIGATION_WAIT_SECS", self.policy.navigation_wait),
            attempt_timeout: secs("ATTEMPT_TIMEOUT_SECS", self.policy.attempt_timeout),
            inter_target_delay: secs("INTER_TARGET_DELAY_SECS", self.policy.inter_target_delay),
        };
        Self {
            targets_file: std::env::var("TARGETS_FILE").map(PathBuf::from).unwrap_or(self.targets_file),
            tor_proxy: std::env::var("TOR_PROXY").unwrap_or(self.tor_proxy),
            tor_control: match std::env::var("TOR_CONTROL") {
                Ok(v) => parse_control_addr(&v),
                Err(_) => self.tor_control,
            },
            control_timeout: secs("CONTROL_TIMEOUT_SECS", self.control_timeout),
            check_url: std::env::var("TOR_CHECK_URL").unwrap_or(self.check_url),
            output_root: std::env::var("OUTPUT_ROOT").map(PathBuf::from).unwrap_or(self.output_root),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").map(PathBuf::from).unwrap_or(self.output_log_file),
            policy,
            transport: self.transport,
            browser: BrowserSettings {
                chrome_executable: std::env::var("CHROME_EXECUTABLE")
                    .ok()
                    .map(PathBuf::from)
                    .or(self.browser.chrome_executable),
                ..self.browser
            },
        }
    }

    /// 位置参数依次覆盖：目标文件、代理地址、控制地址
    pub fn with_args(mut self, args: &[String]) -> Self {
        if let Some(targets) = args.first() {
            self.targets_file = PathBuf::from(targets);
        }
        if let Some(proxy) = args.get(1) {
            self.tor_proxy = proxy.clone();
        }
        if let Some(control) = args.get(2) {
            self.tor_control = parse_control_addr(control);
        }
        self
    }

    /// HTML 输出目录
    pub fn html_dir(&self) -> PathBuf {
        self.output_root.join(crate::services::HTML_COLLECTION)
    }

    /// 截图输出目录
    pub fn screenshot_dir(&self) -> PathBuf {
        self.output_root.join(crate::services::SCREENSHOT_COLLECTION)
    }
}

/// 空字符串、`none`、`off` 表示关闭轮换
fn parse_control_addr(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") || value.eq_ignore_ascii_case("off") {
        None
    } else {
        Some(value.to_string())
    }
}
