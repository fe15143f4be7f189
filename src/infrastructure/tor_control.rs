//! Tor 控制端口客户端 - 基础设施层
//!
//! 通过控制协议请求新的出口身份（`SIGNAL NEWNYM`），只暴露"轮换"能力，
//! 不负责轮换后的等待。

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::error::ControlError;

/// 单次回复的读取上限
const REPLY_BUFFER_SIZE: usize = 512;
/// 控制协议成功状态码
const STATUS_OK: &str = "250";

/// 轮换结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// 已获得新身份
    Rotated,
    /// 未配置控制端口，轮换不可用
    Unavailable,
}

/// 电路轮换能力
#[async_trait]
pub trait CircuitRotator: Send + Sync {
    /// 是否配置了控制端口
    fn is_enabled(&self) -> bool;

    /// 请求新电路
    async fn rotate(&self) -> Result<Rotation, ControlError>;
}

/// Tor 控制端口客户端
#[derive(Debug, Clone)]
pub struct CircuitController {
    control_addr: Option<String>,
    deadline: Duration,
}

impl CircuitController {
    pub fn new(control_addr: Option<String>, deadline: Duration) -> Self {
        Self {
            control_addr,
            deadline,
        }
    }
}

#[async_trait]
impl CircuitRotator for CircuitController {
    fn is_enabled(&self) -> bool {
        self.control_addr.is_some()
    }

    async fn rotate(&self) -> Result<Rotation, ControlError> {
        let Some(addr) = self.control_addr.as_deref() else {
            return Ok(Rotation::Unavailable);
        };

        timeout(self.deadline, async {
            debug!("连接控制端口: {}", addr);
            let mut stream =
                TcpStream::connect(addr)
                    .await
                    .map_err(|source| ControlError::ConnectFailed {
                        addr: addr.to_string(),
                        source,
                    })?;
            request_new_identity(&mut stream).await
        })
        .await
        .map_err(|_| ControlError::Timeout(self.deadline))??;

        Ok(Rotation::Rotated)
    }
}

/// 在已建立的控制连接上完成 认证 → NEWNYM
pub async fn request_new_identity<S>(stream: &mut S) -> Result<(), ControlError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // 无密码认证
    let reply = exchange(stream, "AUTHENTICATE \"\"").await?;
    if !reply.contains(STATUS_OK) {
        return Err(ControlError::AuthenticationFailed { reply });
    }

    let reply = exchange(stream, "SIGNAL NEWNYM").await?;
    if !reply.contains(STATUS_OK) {
        return Err(ControlError::RotationFailed { reply });
    }

    Ok(())
}

/// 发送一行命令并读取一次回复
async fn exchange<S>(stream: &mut S, command: &str) -> Result<String, ControlError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(format!("{}\r\n", command).as_bytes()).await?;
    stream.flush().await?;

    let mut buf = [0u8; REPLY_BUFFER_SIZE];
    let n = stream.read(&mut buf).await?;
    if n == 0 {
        return Err(ControlError::ConnectionClosed);
    }

    let reply = String::from_utf8_lossy(&buf[..n]).trim_end().to_string();
    debug!("控制端口回复 [{}]: {}", command, reply);
    Ok(reply)
}
