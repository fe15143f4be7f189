//! 抓取上下文
//!
//! 封装"我正在处理第几个目标的第几次尝试"这一信息

use std::fmt::Display;

/// 单次尝试的上下文
#[derive(Debug, Clone)]
pub struct AttemptCtx<'a> {
    /// 目标 URL
    pub target: &'a str,

    /// 当前尝试序号（从 1 开始）
    pub attempt: u32,

    /// 尝试上限
    pub max_attempts: u32,
}

impl<'a> AttemptCtx<'a> {
    /// 第一次尝试
    pub fn first(target: &'a str, max_attempts: u32) -> Self {
        Self {
            target,
            attempt: 1,
            max_attempts,
        }
    }

    pub fn is_first(&self) -> bool {
        self.attempt == 1
    }

    pub fn is_last(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// 下一次尝试；已是最后一次时返回 `None`
    pub fn next(&self) -> Option<Self> {
        if self.is_last() {
            None
        } else {
            Some(Self {
                attempt: self.attempt + 1,
                ..self.clone()
            })
        }
    }
}

impl Display for AttemptCtx<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} 尝试 {}/{}]", self.target, self.attempt, self.max_attempts)
    }
}
