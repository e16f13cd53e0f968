/// 自动保存的延迟触发器
///
/// 单线程协作式：每次编辑调用 `schedule` 重新计时，调用方在事件循环中
/// 调用 `poll` 检查是否到期。任意时刻最多只有一个待触发的保存。

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct AutosaveTimer {
    delay: Duration,
    deadline: Option<Instant>,
    /// 每次重新计时递增，便于日志区分
    generation: u64,
}

impl AutosaveTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            generation: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 取消之前的计时并重新开始
    pub fn schedule(&mut self, now: Instant) -> u64 {
        self.deadline = Some(now + self.delay);
        self.generation += 1;
        self.generation
    }

    /// 取消待触发的保存
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// 到期时返回 true 并清除计时（单次触发）
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

impl Default for AutosaveTimer {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}
