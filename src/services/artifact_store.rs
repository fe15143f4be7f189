//! 产物存储服务 - 业务能力层
//!
//! 只负责"按集合和键保存字节"能力，不关心流程

use std::path::PathBuf;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use regex::Regex;
use tokio::fs;
use tracing::debug;

use crate::error::PersistenceError;

/// HTML 集合名
pub const HTML_COLLECTION: &str = "scraped_data";
/// 截图集合名
pub const SCREENSHOT_COLLECTION: &str = "screenshots";

static SCHEME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://").expect("valid regex"));
static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[/:\\?*"<>|]"#).expect("valid regex"));

/// 由 URL 和抓取时间生成文件名
///
/// `https://a.test/x?y=1` + 2025-01-02 03:04:05 + `html`
/// → `a.test_x_y=1_20250102_030405.html`
pub fn artifact_key(url: &str, fetched_at: &DateTime<Local>, extension: &str) -> String {
    let stripped = SCHEME.replace_all(url, "");
    let safe = UNSAFE_CHARS.replace_all(&stripped, "_");
    format!(
        "{}_{}.{}",
        safe,
        fetched_at.format("%Y%m%d_%H%M%S"),
        extension
    )
}

/// 产物存储
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// 保存到 `collection` 下的 `key`，返回最终位置
    async fn save(&self, collection: &str, key: &str, bytes: &[u8]) -> Result<PathBuf, PersistenceError>;
}

/// 本地文件系统存储：`<root>/<collection>/<key>`
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn collection_dir(&self, collection: &str) -> PathBuf {
        self.root.join(collection)
    }
}

#[async_trait]
impl ArtifactSink for FsArtifactStore {
    async fn save(&self, collection: &str, key: &str, bytes: &[u8]) -> Result<PathBuf, PersistenceError> {
        let dir = self.collection_dir(collection);
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| PersistenceError::CreateDirFailed {
                path: dir.clone(),
                source,
            })?;

        let path = dir.join(key);
        fs::write(&path, bytes)
            .await
            .map_err(|source| PersistenceError::WriteFailed {
                path: path.clone(),
                source,
            })?;

        debug!("已写入 {} 字节: {}", bytes.len(), path.display());
        Ok(path)
    }
}
