//! 时钟抽象：分钟闸门与账本时间戳都从这里取时间，测试里换成固定时钟

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{Local, TimeZone, Timelike};

pub trait Clock: Send + Sync {
    /// Unix 毫秒
    fn now_ms(&self) -> i64;

    /// 本地时间 HH:MM（两位补零）
    fn local_hhmm(&self) -> String;
}

/// 系统时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn local_hhmm(&self) -> String {
        Local::now().format("%H:%M").to_string()
    }
}

/// 手动时钟：毫秒时间戳可推进，本地分钟固定为给定的时分
#[derive(Debug)]
pub struct ManualClock {
    now_ms: AtomicI64,
    hour: u32,
    minute: u32,
}

impl ManualClock {
    pub fn new(now_ms: i64, hour: u32, minute: u32) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
            hour,
            minute,
        }
    }

    /// 取当前本地时间的时分，毫秒时间戳从 start_ms 开始
    pub fn at_local_now(start_ms: i64) -> Self {
        let now = Local::now();
        Self::new(start_ms, now.hour(), now.minute())
    }

    pub fn advance_ms(&self, delta: i64) {
        self.now_ms.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn set_ms(&self, ms: i64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn local_hhmm(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

/// 毫秒时间戳转成本地时间字符串，日志用
pub fn format_local_ms(ms: i64) -> String {
    match Local.timestamp_millis_opt(ms).single() {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ms.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_pads_and_advances() {
        let clock = ManualClock::new(1_000, 9, 5);
        assert_eq!(clock.local_hhmm(), "09:05");
        clock.advance_ms(250);
        assert_eq!(clock.now_ms(), 1_250);
        clock.set_ms(10);
        assert_eq!(clock.now_ms(), 10);
    }

    #[test]
    fn test_system_clock_shape() {
        let hhmm = SystemClock.local_hhmm();
        assert_eq!(hhmm.len(), 5);
        assert_eq!(&hhmm[2..3], ":");
        assert!(SystemClock.now_ms() > 0);
    }
}
