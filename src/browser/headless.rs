use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, warn};

use crate::config::BrowserSettings;
use crate::error::AttemptError;

/// 浏览器退出的最长等待时间
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// 一次渲染的产物
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// 序列化后的完整 DOM
    pub html: String,
    /// 整页截图（PNG）
    pub image: Vec<u8>,
}

/// 渲染能力：导航、等待、提取 DOM、截图
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// 在 `deadline` 内完成一次渲染；返回前必须释放所有浏览器资源
    async fn render(&self, url: &str, deadline: Duration) -> Result<RenderedPage, AttemptError>;
}

/// 无头浏览器会话工厂
///
/// 每次 `render` 都启动一个使用独立临时配置目录的浏览器进程，
/// 所有流量经过 Tor SOCKS 代理。
pub struct RenderSessionFactory {
    proxy_addr: String,
    settings: BrowserSettings,
    navigation_wait: Duration,
}

impl RenderSessionFactory {
    pub fn new(proxy_addr: impl Into<String>, settings: BrowserSettings, navigation_wait: Duration) -> Self {
        Self {
            proxy_addr: proxy_addr.into(),
            settings,
            navigation_wait,
        }
    }

    /// 浏览器启动参数
    fn launch_args(&self) -> Vec<String> {
        vec![
            format!("--proxy-server=socks5://{}", self.proxy_addr),
            "--disable-gpu".to_string(),           // 无头模式禁用 GPU
            "--disable-dev-shm-usage".to_string(), // 防止共享内存不足
        ]
    }

    fn browser_config(&self, profile_dir: &Path) -> Result<BrowserConfig, AttemptError> {
        let viewport = Viewport {
            width: self.settings.window_width,
            height: self.settings.window_height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: false,
            has_touch: false,
        };

        let mut builder = BrowserConfig::builder()
            .new_headless_mode()
            .no_sandbox()
            .window_size(self.settings.window_width, self.settings.window_height)
            .viewport(viewport)
            .user_data_dir(profile_dir)
            .args(self.launch_args());

        if let Some(executable) = &self.settings.chrome_executable {
            builder = builder.chrome_executable(executable);
        }

        builder.build().map_err(|e| {
            error!("配置无头浏览器失败: {}", e);
            AttemptError::BrowserConfig(e)
        })
    }

    /// 导航 → 等待 → 提取 HTML → 整页截图
    async fn capture(&self, browser: &Browser, url: &str) -> Result<RenderedPage, AttemptError> {
        let navigation_err = |e: chromiumoxide::error::CdpError| AttemptError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let page = browser.new_page("about:blank").await.map_err(navigation_err)?;
        page.goto(url).await.map_err(navigation_err)?;
        debug!("已导航到: {}", url);

        // 经过 Tor 的页面加载较慢，等待内容和网络请求稳定
        sleep(self.navigation_wait).await;

        let html = page
            .content()
            .await
            .map_err(|e| AttemptError::Extraction(e.to_string()))?;

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        let image = page
            .screenshot(params)
            .await
            .map_err(|e| AttemptError::Capture(e.to_string()))?;

        Ok(RenderedPage { html, image })
    }
}

#[async_trait]
impl PageRenderer for RenderSessionFactory {
    async fn render(&self, url: &str, deadline: Duration) -> Result<RenderedPage, AttemptError> {
        // 临时目录在函数返回时删除
        let profile = tempfile::Builder::new()
            .prefix("tor-fetch-profile-")
            .tempdir()
            .map_err(AttemptError::Profile)?;

        let config = self.browser_config(profile.path())?;

        let (mut browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            error!("启动无头浏览器失败: {}", e);
            AttemptError::Launch(e.to_string())
        })?;
        debug!("无头浏览器启动成功");

        // 在后台处理浏览器事件
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let outcome = match timeout(deadline, self.capture(&browser, url)).await {
            Ok(result) => result,
            Err(_) => Err(AttemptError::Timeout(deadline)),
        };

        shutdown(&mut browser, handler_task).await;
        outcome
    }
}

/// 关闭浏览器、回收进程并停止事件循环
async fn shutdown(browser: &mut Browser, handler_task: JoinHandle<()>) {
    if let Err(e) = browser.close().await {
        debug!("浏览器关闭命令失败，强制结束进程: {}", e);
        if let Some(Err(e)) = browser.kill().await {
            warn!("无法结束浏览器进程: {}", e);
        }
    }

    match timeout(SHUTDOWN_GRACE, browser.wait()).await {
        Ok(Ok(_)) => debug!("浏览器进程已退出"),
        Ok(Err(e)) => warn!("等待浏览器退出失败: {}", e),
        Err(_) => {
            warn!("浏览器未在 {:?} 内退出，强制结束", SHUTDOWN_GRACE);
            if let Some(Err(e)) = browser.kill().await {
                warn!("无法结束浏览器进程: {}", e);
            }
        }
    }

    handler_task.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn factory(settings: BrowserSettings) -> RenderSessionFactory {
        RenderSessionFactory::new("127.0.0.1:9150", settings, Duration::from_secs(10))
    }

    #[test]
    fn test_launch_args_route_through_socks_proxy() {
        let args = factory(BrowserSettings::default()).launch_args();
        assert_eq!(args[0], "--proxy-server=socks5://127.0.0.1:9150");
        assert!(args.contains(&"--disable-gpu".to_string()));
        assert!(args.contains(&"--disable-dev-shm-usage".to_string()));
    }

    #[tokio::test]
    async fn test_missing_executable_fails_attempt() {
        let settings = BrowserSettings {
            chrome_executable: Some(PathBuf::from("/nonexistent/chrome-for-tests")),
            ..BrowserSettings::default()
        };

        let err = factory(settings)
            .render("http://example.test", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(
            matches!(err, AttemptError::BrowserConfig(_) | AttemptError::Launch(_)),
            "unexpected error: {err:?}"
        );
    }

    #[tokio::test]
    #[ignore] // 需要本地 Chromium 与 Tor：cargo test -- --ignored
    async fn test_render_live_page() {
        let page = factory(BrowserSettings::default())
            .render("https://check.torproject.org/", Duration::from_secs(120))
            .await
            .expect("渲染失败");
        assert!(page.html.contains("<html"));
        // PNG 文件头
        assert_eq!(&page.image[..4], b"\x89PNG");
    }
}
