use chrono::{DateTime, Local};

/// 单次尝试记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// 尝试序号（从 1 开始）
    pub index: u32,
    /// 本次尝试前是否请求了电路轮换
    pub rotation_requested: bool,
    /// 失败原因，成功时为 `None`
    pub error: Option<String>,
}

/// 一个目标的最终抓取结果
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub target: String,
    pub success: bool,
    /// 渲染后的 HTML，仅成功时存在
    pub html: Option<String>,
    /// 整页截图，仅成功时存在
    pub image: Option<Vec<u8>>,
    /// 失败摘要，仅失败时存在
    pub error: Option<String>,
    pub fetched_at: DateTime<Local>,
    pub attempts: Vec<AttemptRecord>,
}

impl FetchResult {
    pub fn succeeded(
        target: impl Into<String>,
        html: String,
        image: Vec<u8>,
        attempts: Vec<AttemptRecord>,
    ) -> Self {
        Self {
            target: target.into(),
            success: true,
            html: Some(html),
            image: Some(image),
            error: None,
            fetched_at: Local::now(),
            attempts,
        }
    }

    pub fn failed(target: impl Into<String>, error: String, attempts: Vec<AttemptRecord>) -> Self {
        Self {
            target: target.into(),
            success: false,
            html: None,
            image: None,
            error: Some(error),
            fetched_at: Local::now(),
            attempts,
        }
    }

    pub fn attempts_used(&self) -> usize {
        self.attempts.len()
    }

    pub fn rotations_requested(&self) -> usize {
        self.attempts.iter().filter(|a| a.rotation_requested).count()
    }

    pub fn html_bytes(&self) -> usize {
        self.html.as_ref().map_or(0, String::len)
    }

    pub fn image_bytes(&self) -> usize {
        self.image.as_ref().map_or(0, Vec::len)
    }
}

/// 批量运行统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    /// 写入失败的产物数量（HTML 与截图分别计数）
    pub persistence_failures: usize,
}
