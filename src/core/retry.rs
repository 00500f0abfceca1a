//! 有界重试组合子
//!
//! 所有「等菜单出现」「等对话框出现」「等编辑框出现」都走这里：按固定间隔探测，
//! 次数或总时长任一耗尽即返回 None。探测本身报错（适配器断开等）立即向上传播。

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::ui::UiError;

/// 重试策略：最多 attempts 次，每次间隔 interval；给了 deadline 时总时长也受限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
    pub deadline: Option<Duration>,
}

impl RetryPolicy {
    /// 只按次数计：计时误差不会吃掉最后一次探测
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            interval,
            deadline: None,
        }
    }

    /// 在 total 时长内按 interval 轮询
    pub fn within(total: Duration, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            Duration::from_millis(1)
        } else {
            interval
        };
        let attempts = (total.as_millis() / interval.as_millis()).max(1);
        Self {
            attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
            interval,
            deadline: Some(total),
        }
    }
}

/// 反复调用 probe，直到返回 Some 或策略耗尽
pub async fn poll_until<T, F, Fut>(policy: RetryPolicy, mut probe: F) -> Result<Option<T>, UiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, UiError>>,
{
    let started = Instant::now();
    for attempt in 1..=policy.attempts {
        if let Some(found) = probe().await? {
            return Ok(Some(found));
        }
        let expired = policy.deadline.is_some_and(|d| started.elapsed() >= d);
        if attempt == policy.attempts || expired {
            break;
        }
        tokio::time::sleep(policy.interval).await;
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_within_derives_attempts() {
        let p = RetryPolicy::within(Duration::from_millis(700), Duration::from_millis(50));
        assert_eq!(p.attempts, 14);
        assert_eq!(p.deadline, Some(Duration::from_millis(700)));

        let tiny = RetryPolicy::within(Duration::from_millis(5), Duration::from_millis(50));
        assert_eq!(tiny.attempts, 1);
    }

    #[tokio::test]
    async fn test_poll_until_returns_on_third_probe() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let found = poll_until(RetryPolicy::new(5, Duration::from_millis(1)), move || {
            let c = c.clone();
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(if n == 3 { Some(n) } else { None })
            }
        })
        .await
        .unwrap();
        assert_eq!(found, Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_until_exhausts_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let found: Option<()> = poll_until(RetryPolicy::new(4, Duration::from_millis(1)), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }
        })
        .await
        .unwrap();
        assert!(found.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_attempt_bound_ignores_timer_drift() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let found: Option<()> = poll_until(RetryPolicy::new(6, Duration::from_millis(2)), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                // 探测本身也耗时，累计远超 6 × 2ms
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(None)
            }
        })
        .await
        .unwrap();
        assert!(found.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_poll_until_propagates_adapter_error() {
        let res: Result<Option<()>, UiError> =
            poll_until(RetryPolicy::new(3, Duration::from_millis(1)), || async {
                Err(UiError::Disconnected)
            })
            .await;
        assert!(matches!(res, Err(UiError::Disconnected)));
    }
}
