//! 聊天发帖
//!
//! reply：方言定义的回复（.cur、/add），相邻两条至少间隔 cooldown，未到时等待而不是丢弃。
//! send：宏的逐行发送，不受冷却限制。两者都经过 UI 车道。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::core::{EngineError, UiLane};
use crate::ui::UiAdapter;

pub struct ChatPoster {
    ui: Arc<dyn UiAdapter>,
    lane: UiLane,
    cooldown: Duration,
    last_reply: Mutex<Option<Instant>>,
}

impl ChatPoster {
    pub fn new(ui: Arc<dyn UiAdapter>, lane: UiLane, cooldown: Duration) -> Self {
        Self {
            ui,
            lane,
            cooldown,
            last_reply: Mutex::new(None),
        }
    }

    /// 带冷却的回复；输入框缺失返回 Ok(false)
    pub async fn reply(&self, text: &str) -> Result<bool, EngineError> {
        let mut last = self.last_reply.lock().await;
        if let Some(at) = *last {
            let elapsed = at.elapsed();
            if elapsed < self.cooldown {
                tokio::time::sleep(self.cooldown - elapsed).await;
            }
        }
        let posted = self.send(text).await?;
        if posted {
            *last = Some(Instant::now());
        }
        Ok(posted)
    }

    /// 直接发送
    pub async fn send(&self, text: &str) -> Result<bool, EngineError> {
        let _lane = self.lane.enter().await;
        let posted = self.ui.post_chat(text).await?;
        if posted {
            tracing::debug!(chars = text.chars().count(), "Chat message posted");
        }
        Ok(posted)
    }
}
