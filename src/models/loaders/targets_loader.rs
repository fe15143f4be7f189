use std::path::Path;

use tokio::fs;

use crate::error::ConfigError;

/// 从 YAML 文件加载目标列表
///
/// 文件内容是字符串序列；每项去除首尾空白，空项和 null 项丢弃。
/// 空文件视为空列表。
pub async fn load_targets(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::TargetsReadFailed {
            path: path.to_path_buf(),
            source,
        })?;

    parse_targets(&content).map_err(|source| ConfigError::TargetsParseFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// 解析 YAML 目标列表
pub fn parse_targets(content: &str) -> Result<Vec<String>, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let raw: Option<Vec<Option<String>>> = serde_yaml::from_str(content)?;

    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .map(|target| target.trim().to_string())
        .filter(|target| !target.is_empty())
        .collect())
}
