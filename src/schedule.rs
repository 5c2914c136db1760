//! 单次定时器
//!
//! 引擎是单线程的，延迟动作不开线程，而是记录截止时间，由宿主调用
//! `TranslationStore::tick` 时检查是否到期。两种策略：
//!
//! - **Throttle**：第一次请求确定截止时间，之后的请求不推迟它，到期触发一次
//! - **Debounce**：每次请求都把截止时间推迟到 `now + window`，安静下来才触发

use std::time::{Duration, Instant};

/// 节流：一个窗口内的多次请求合并为窗口末尾的一次调用
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    deadline: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    pub fn request(&mut self, now: Instant) {
        if self.deadline.is_none() {
            self.deadline = Some(now + self.interval);
        }
    }

    /// 到期时返回 true 并复位
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// 防抖：连续请求只在最后一次请求之后 `window` 触发
#[derive(Debug, Clone)]
pub struct Debounce {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn request(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
