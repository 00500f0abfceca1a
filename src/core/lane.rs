//! UI 车道与忙碌闸门
//!
//! 宿主页面只有一个光标、一个剪贴板、一个右键菜单：所有会改动 UI 的操作（贴入、移动、自删除、发帖）
//! 都要先拿到车道许可，许可在操作结束时随 guard 释放。跨指令的先后顺序不作保证。
//!
//! BusyGate 用于 .gachaRS 这类重量流程：执行期间再次触发直接拒绝，而不是排队。

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// UI 车道：容量为 1 的信号量
#[derive(Clone)]
pub struct UiLane {
    permits: Arc<Semaphore>,
}

/// 持有期间独占 UI
pub struct LanePermit {
    _permit: Option<OwnedSemaphorePermit>,
}

impl UiLane {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    /// 等待车道空闲；信号量从不关闭，关闭时返回一个空许可而不是 panic
    pub async fn enter(&self) -> LanePermit {
        let permit = self.permits.clone().acquire_owned().await.ok();
        LanePermit { _permit: permit }
    }

    pub fn is_idle(&self) -> bool {
        self.permits.available_permits() > 0
    }
}

impl Default for UiLane {
    fn default() -> Self {
        Self::new()
    }
}

/// 忙碌闸门：try_enter 失败即表示同类流程正在执行
#[derive(Clone)]
pub struct BusyGate {
    name: &'static str,
    permits: Arc<Semaphore>,
}

pub struct BusyPermit {
    _permit: OwnedSemaphorePermit,
}

impl BusyGate {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 不等待：正在执行则返回 None
    pub fn try_enter(&self) -> Option<BusyPermit> {
        match self.permits.clone().try_acquire_owned() {
            Ok(permit) => Some(BusyPermit { _permit: permit }),
            Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.permits.available_permits() == 0
    }
}
