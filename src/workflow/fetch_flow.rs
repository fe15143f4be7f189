//! 抓取流程 - 流程层
//!
//! 核心职责：定义"一个目标"的完整抓取流程
//!
//! 状态转换：
//! 1. Attempting(1) → 渲染
//! 2. 失败且未到上限 → Rotating → 等待 → Attempting(k+1)
//! 3. 成功 → Success；第 N 次仍失败 → Exhausted

use tokio::time::sleep;

use crate::browser::PageRenderer;
use crate::config::RetryPolicy;
use crate::error::ExhaustionError;
use crate::infrastructure::CircuitRotator;
use crate::models::{AttemptRecord, FetchResult};
use crate::utils::logging::Reporter;
use crate::workflow::fetch_ctx::AttemptCtx;

/// 单目标抓取流程
///
/// - 决定何时重试、何时轮换电路
/// - 每次尝试都使用全新的渲染会话，尝试之间不共享状态
/// - 不关心批量、持久化
pub struct FetchFlow<R, C> {
    renderer: R,
    rotator: C,
    policy: RetryPolicy,
}

impl<R, C> FetchFlow<R, C>
where
    R: PageRenderer,
    C: CircuitRotator,
{
    pub fn new(renderer: R, rotator: C, policy: RetryPolicy) -> Self {
        Self {
            renderer,
            rotator,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 抓取一个目标，总是返回恰好一个结果
    pub async fn run(&self, target: &str, report: &dyn Reporter) -> FetchResult {
        let mut ctx = AttemptCtx::first(target, self.policy.max_attempts.max(1));
        let mut attempts = Vec::with_capacity(ctx.max_attempts as usize);

        loop {
            let rotation_requested = if ctx.is_first() {
                false
            } else {
                self.prepare_retry(&ctx, report).await
            };

            match self.renderer.render(target, self.policy.attempt_timeout).await {
                Ok(page) => {
                    attempts.push(AttemptRecord {
                        index: ctx.attempt,
                        rotation_requested,
                        error: None,
                    });
                    let result = FetchResult::succeeded(target, page.html, page.image, attempts);
                    report.success(&format!(
                        "抓取成功 {}: {} KB 截图, {} 字节 HTML",
                        ctx,
                        result.image_bytes() / 1024,
                        result.html_bytes()
                    ));
                    return result;
                }
                Err(err) => {
                    report.warning(&format!("抓取失败 {}: {}", ctx, err));
                    attempts.push(AttemptRecord {
                        index: ctx.attempt,
                        rotation_requested,
                        error: Some(err.to_string()),
                    });

                    match ctx.next() {
                        Some(next) => ctx = next,
                        None => {
                            let exhausted = ExhaustionError {
                                attempts: ctx.attempt,
                                last: err,
                            };
                            return FetchResult::failed(target, exhausted.to_string(), attempts);
                        }
                    }
                }
            }
        }
    }

    /// 重试前的轮换与等待，返回是否请求了轮换
    async fn prepare_retry(&self, ctx: &AttemptCtx<'_>, report: &dyn Reporter) -> bool {
        report.info(&format!(
            "重新尝试 ({}/{}): {}",
            ctx.attempt, ctx.max_attempts, ctx.target
        ));

        if !self.rotator.is_enabled() {
            sleep(self.policy.settle_delay).await;
            return false;
        }

        report.info("正在请求新的 Tor 身份...");
        match self.rotator.rotate().await {
            Ok(_) => {
                report.success("已获得新的 Tor 身份 (IP)");
                // 等待新电路建立
                sleep(self.policy.settle_delay).await;
            }
            Err(e) => {
                // 轮换失败不终止目标，本次尝试沿用当前电路
                report.warning(&format!("无法更换 IP {}: {}", ctx, e));
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::RenderedPage;
    use crate::error::{AttemptError, ControlError};
    use crate::infrastructure::Rotation;
    use crate::utils::logging::Level;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// 事件序列，用于断言轮换与尝试的先后顺序
    type Events = Arc<Mutex<Vec<&'static str>>>;

    struct ScriptedRenderer {
        outcomes: Mutex<VecDeque<Result<RenderedPage, AttemptError>>>,
        events: Events,
    }

    #[async_trait]
    impl PageRenderer for ScriptedRenderer {
        async fn render(&self, _url: &str, _deadline: Duration) -> Result<RenderedPage, AttemptError> {
            self.events.lock().unwrap().push("render");
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .expect("renderer called more often than scripted")
        }
    }

    struct ScriptedRotator {
        enabled: bool,
        fail: bool,
        calls: AtomicUsize,
        events: Events,
    }

    #[async_trait]
    impl CircuitRotator for ScriptedRotator {
        fn is_enabled(&self) -> bool {
            self.enabled
        }

        async fn rotate(&self) -> Result<Rotation, ControlError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.events.lock().unwrap().push("rotate");
            if self.fail {
                Err(ControlError::AuthenticationFailed {
                    reply: "515 Bad authentication".to_string(),
                })
            } else {
                Ok(Rotation::Rotated)
            }
        }
    }

    #[derive(Default)]
    struct Captured(Mutex<Vec<(Level, String)>>);

    impl Reporter for Captured {
        fn record(&self, level: Level, message: &str) {
            self.0.lock().unwrap().push((level, message.to_string()));
        }
    }

    impl Captured {
        fn count(&self, level: Level, needle: &str) -> usize {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter(|(l, m)| *l == level && m.contains(needle))
                .count()
        }
    }

    fn page() -> RenderedPage {
        RenderedPage {
            html: "<html><body>ok</body></html>".to_string(),
            image: vec![0x89, b'P', b'N', b'G'],
        }
    }

    fn timeout_err() -> AttemptError {
        AttemptError::Timeout(Duration::from_secs(120))
    }

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            settle_delay: Duration::ZERO,
            navigation_wait: Duration::ZERO,
            inter_target_delay: Duration::ZERO,
            ..RetryPolicy::default()
        }
    }

    fn flow(
        outcomes: Vec<Result<RenderedPage, AttemptError>>,
        rotation_enabled: bool,
        rotation_fails: bool,
    ) -> (FetchFlow<ScriptedRenderer, ScriptedRotator>, Events) {
        let events: Events = Arc::default();
        let renderer = ScriptedRenderer {
            outcomes: Mutex::new(outcomes.into()),
            events: events.clone(),
        };
        let rotator = ScriptedRotator {
            enabled: rotation_enabled,
            fail: rotation_fails,
            calls: AtomicUsize::new(0),
            events: events.clone(),
        };
        (FetchFlow::new(renderer, rotator, quick_policy()), events)
    }

    #[tokio::test]
    async fn test_first_attempt_success_never_rotates() {
        let (flow, events) = flow(vec![Ok(page())], true, false);
        let report = Captured::default();

        let result = flow.run("http://example.test", &report).await;

        assert!(result.success);
        assert_eq!(result.attempts_used(), 1);
        assert_eq!(result.rotations_requested(), 0);
        assert_eq!(*events.lock().unwrap(), vec!["render"]);
        assert_eq!(
            report.count(Level::Success, "抓取成功 [http://example.test 尝试 1/3]"),
            1
        );
    }

    #[tokio::test]
    async fn test_rotation_happens_between_attempts() {
        let (flow, events) = flow(vec![Err(timeout_err()), Ok(page())], true, false);
        let report = Captured::default();

        let result = flow.run("http://example.test", &report).await;

        assert!(result.success);
        assert_eq!(result.attempts_used(), 2);
        assert_eq!(*events.lock().unwrap(), vec!["render", "rotate", "render"]);
        assert!(!result.attempts[0].rotation_requested);
        assert!(result.attempts[1].rotation_requested);
        assert_eq!(report.count(Level::Success, "新的 Tor 身份"), 1);
    }

    #[tokio::test]
    async fn test_exhausts_after_budget() {
        let outcomes = vec![
            Err(timeout_err()),
            Err(AttemptError::Extraction("detached".to_string())),
            Err(timeout_err()),
        ];
        let (flow, events) = flow(outcomes, true, false);
        let report = Captured::default();

        let result = flow.run("http://bad.test", &report).await;

        assert!(!result.success);
        assert_eq!(result.attempts_used(), 3);
        assert_eq!(result.rotations_requested(), 2);
        assert_eq!(flow.rotator.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            *events.lock().unwrap(),
            vec!["render", "rotate", "render", "rotate", "render"]
        );
        let error = result.error.unwrap();
        assert!(error.starts_with("3 次尝试后失败"), "{error}");
        assert!(error.contains("120s"));
        assert_eq!(report.count(Level::Warning, "抓取失败"), 3);
    }

    #[tokio::test]
    async fn test_without_control_port_no_rotation_is_attempted() {
        let outcomes = vec![Err(timeout_err()), Err(timeout_err()), Err(timeout_err())];
        let (flow, events) = flow(outcomes, false, false);
        let report = Captured::default();

        let result = flow.run("http://bad.test", &report).await;

        assert!(!result.success);
        assert_eq!(result.rotations_requested(), 0);
        assert_eq!(flow.rotator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(*events.lock().unwrap(), vec!["render", "render", "render"]);
        assert_eq!(report.count(Level::Info, "Tor 身份"), 0);
    }

    #[tokio::test]
    async fn test_rotation_failure_does_not_abort_target() {
        let (flow, events) = flow(vec![Err(timeout_err()), Ok(page())], true, true);
        let report = Captured::default();

        let result = flow.run("http://example.test", &report).await;

        assert!(result.success);
        assert_eq!(*events.lock().unwrap(), vec!["render", "rotate", "render"]);
        assert_eq!(
            report.count(Level::Warning, "无法更换 IP [http://example.test 尝试 2/3]"),
            1
        );
    }

    #[tokio::test]
    async fn test_single_attempt_budget() {
        let events: Events = Arc::default();
        let renderer = ScriptedRenderer {
            outcomes: Mutex::new(vec![Err(timeout_err())].into()),
            events: events.clone(),
        };
        let rotator = ScriptedRotator {
            enabled: true,
            fail: false,
            calls: AtomicUsize::new(0),
            events: events.clone(),
        };
        let policy = RetryPolicy {
            max_attempts: 1,
            ..quick_policy()
        };
        let flow = FetchFlow::new(renderer, rotator, policy);

        let result = flow.run("http://bad.test", &Captured::default()).await;

        assert!(!result.success);
        assert_eq!(result.attempts_used(), 1);
        assert_eq!(*events.lock().unwrap(), vec!["render"]);
    }

    // ========== 等待时间 ==========

    fn timed_flow(
        rotation_enabled: bool,
        rotation_fails: bool,
    ) -> FetchFlow<ScriptedRenderer, ScriptedRotator> {
        let (flow, _) = flow(
            vec![Err(timeout_err()), Err(timeout_err()), Err(timeout_err())],
            rotation_enabled,
            rotation_fails,
        );
        FetchFlow::new(flow.renderer, flow.rotator, RetryPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_rotation_waits_settle_delay() {
        let flow = timed_flow(true, false);
        let start = tokio::time::Instant::now();

        flow.run("http://bad.test", &Captured::default()).await;

        // 两次轮换，每次之后等待 5 秒
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_rotation_skips_settle_delay() {
        let flow = timed_flow(true, true);
        let start = tokio::time::Instant::now();

        flow.run("http://bad.test", &Captured::default()).await;

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_control_port_still_waits_settle_delay() {
        let flow = timed_flow(false, false);
        let start = tokio::time::Instant::now();

        flow.run("http://bad.test", &Captured::default()).await;

        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success_does_not_wait() {
        let (flow, _) = flow(vec![Ok(page())], true, false);
        let flow = FetchFlow::new(flow.renderer, flow.rotator, RetryPolicy::default());
        let start = tokio::time::Instant::now();

        flow.run("http://example.test", &Captured::default()).await;

        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
