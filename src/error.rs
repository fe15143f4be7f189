use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// 应用程序错误类型
///
/// 只有启动阶段的配置错误会导致进程退出，
/// 传输、控制、尝试和持久化错误都在各自组件边界被捕获并记录。
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误（致命）
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 日志文件无法打开
    #[error("无法打开日志文件 {path}: {source}")]
    LogOpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 目标文件读取失败
    #[error("无法读取目标文件 {path}: {source}")]
    TargetsReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 目标文件 YAML 解析失败
    #[error("目标文件 YAML 解析失败 {path}: {source}")]
    TargetsParseFailed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    /// 配置文件读取失败
    #[error("无法读取配置文件 {path}: {source}")]
    ConfigFileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 配置文件解析失败
    #[error("配置文件解析失败 {path}: {source}")]
    ConfigFileInvalid {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// 匿名传输错误
#[derive(Debug, Error)]
pub enum TransportError {
    /// 代理客户端构建失败
    #[error("SOCKS5 客户端构建失败 ({proxy}): {source}")]
    ClientBuildFailed {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },
    /// 请求失败
    #[error("连接无法验证 ({url}): {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// 响应体读取失败
    #[error("响应无法读取 ({url}): {source}")]
    BodyReadFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// 出口不是 Tor
    #[error("Tor 连接未被确认 (出口 IP: {})", ip.as_deref().unwrap_or("未知"))]
    NotAnonymized { ip: Option<String> },
}

/// 控制协议错误
#[derive(Debug, Error)]
pub enum ControlError {
    /// 无法连接控制端口
    #[error("无法连接控制端口 {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// 读写失败
    #[error("控制连接读写失败: {0}")]
    Io(#[from] std::io::Error),
    /// 连接在回复前关闭
    #[error("控制连接在回复前被关闭")]
    ConnectionClosed,
    /// 超时
    #[error("控制协议在 {0:?} 内未完成")]
    Timeout(Duration),
    /// 认证失败
    #[error("认证失败: {reply}")]
    AuthenticationFailed { reply: String },
    /// NEWNYM 失败
    #[error("NEWNYM 失败: {reply}")]
    RotationFailed { reply: String },
}

/// 单次渲染尝试错误
///
/// 所有变体在重试逻辑中一视同仁。
#[derive(Debug, Error)]
pub enum AttemptError {
    /// 浏览器配置失败
    #[error("浏览器配置失败: {0}")]
    BrowserConfig(String),
    /// 浏览器启动失败
    #[error("浏览器启动失败: {0}")]
    Launch(String),
    /// 临时配置目录创建失败
    #[error("临时配置目录创建失败: {0}")]
    Profile(#[source] std::io::Error),
    /// 导航失败
    #[error("导航到 {url} 失败: {reason}")]
    Navigation { url: String, reason: String },
    /// DOM 提取失败
    #[error("HTML 提取失败: {0}")]
    Extraction(String),
    /// 截图失败
    #[error("截图失败: {0}")]
    Capture(String),
    /// 超过单次尝试时限
    #[error("超过 {0:?} 时限")]
    Timeout(Duration),
}

/// 全部尝试失败
#[derive(Debug, Error)]
#[error("{attempts} 次尝试后失败: {last}")]
pub struct ExhaustionError {
    pub attempts: u32,
    #[source]
    pub last: AttemptError,
}

/// 产物持久化错误
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// 目录创建失败
    #[error("目录无法创建 {path}: {source}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 文件写入失败
    #[error("文件无法写入 {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
