//! Tor 代理 HTTP 客户端 - 基础设施层
//!
//! 所有连接都经过 SOCKS5 代理拨出，DNS 也由代理解析，不存在直连路径。

use reqwest::{Client, Proxy};
use serde::Deserialize;
use tracing::debug;

use crate::config::TransportSettings;
use crate::error::TransportError;

/// check.torproject.org 的返回格式
#[derive(Debug, Deserialize)]
struct TorCheckBody {
    #[serde(rename = "IsTor")]
    is_tor: bool,
    #[serde(rename = "IP")]
    ip: Option<String>,
}

/// 验证结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitCheck {
    pub is_tor: bool,
    pub ip: Option<String>,
    /// 原始响应体，用于日志
    pub body: String,
}

impl ExitCheck {
    /// 解析验证接口响应
    ///
    /// 优先按 JSON 解析；非 JSON 时退回到 `"IsTor":true` 子串判断。
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<TorCheckBody>(body) {
            Ok(parsed) => Self {
                is_tor: parsed.is_tor,
                ip: parsed.ip,
                body: body.to_string(),
            },
            Err(_) => Self {
                is_tor: body.contains("\"IsTor\":true"),
                ip: None,
                body: body.to_string(),
            },
        }
    }
}

/// Tor 代理客户端
pub struct TorTransport {
    client: Client,
    proxy_addr: String,
}

impl TorTransport {
    /// 构建只经由 `socks5h://<proxy_addr>` 拨号的客户端
    pub fn new(proxy_addr: &str, settings: &TransportSettings) -> Result<Self, TransportError> {
        let build_err = |source| TransportError::ClientBuildFailed {
            proxy: proxy_addr.to_string(),
            source,
        };

        // socks5h：主机名交给代理解析，防止 DNS 泄漏
        let proxy = Proxy::all(format!("socks5h://{}", proxy_addr)).map_err(build_err)?;

        // 设置自定义代理后 reqwest 不再读取系统代理
        let client = Client::builder()
            .proxy(proxy)
            .timeout(settings.request_timeout)
            .pool_max_idle_per_host(settings.max_idle_connections)
            .pool_idle_timeout(settings.idle_timeout)
            .connect_timeout(settings.handshake_timeout)
            .build()
            .map_err(build_err)?;

        Ok(Self {
            client,
            proxy_addr: proxy_addr.to_string(),
        })
    }

    pub fn proxy_addr(&self) -> &str {
        &self.proxy_addr
    }

    /// 请求验证接口并确认流量经过 Tor
    pub async fn verify(&self, check_url: &str) -> Result<ExitCheck, TransportError> {
        debug!("验证 Tor 出口: {}", check_url);

        let response = self
            .client
            .get(check_url)
            .send()
            .await
            .map_err(|source| TransportError::RequestFailed {
                url: check_url.to_string(),
                source,
            })?;

        let body = response
            .text()
            .await
            .map_err(|source| TransportError::BodyReadFailed {
                url: check_url.to_string(),
                source,
            })?;

        let check = ExitCheck::from_body(&body);
        if check.is_tor {
            Ok(check)
        } else {
            Err(TransportError::NotAnonymized { ip: check.ip })
        }
    }
}
