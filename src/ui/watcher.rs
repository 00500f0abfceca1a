//! 聊天日志监听：定时扫描尚未打标签的消息节点，转成 ChatEvent 送入通道
//!
//! 首次扫描会把页面上已有的消息也送出，是否处理交给引擎的分钟闸门。

use std::sync::Arc;
use std::time::Duration;

use headless_chrome::Tab;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::cdp::eval_in;
use super::{ChatEvent, NodeHandle, UiError};

const SCAN_SCRIPT: &str = r#"
const out = [];
for (const p of document.querySelectorAll('p.MuiListItemText-secondary')) {
  if (p.getAttribute('data-ccf-node')) continue;
  const item = p.closest('div.MuiListItem-root') || p.closest('li.MuiListItem-root');
  const h6 = item?.querySelector('h6.MuiTypography-root');
  let speaker = '';
  let time = null;
  if (h6) {
    const cap = h6.querySelector('span.MuiTypography-caption, span');
    const full = h6.textContent || '';
    const capText = cap ? cap.textContent || '' : '';
    speaker = ccf.norm(capText ? full.replace(capText, '') : full);
    if (capText) time = ccf.norm(capText).replace(/^-\s*/, '') || null;
  }
  // 时间还没渲染出来的节点留到下一轮
  if (!time) continue;
  const id = ccf.tag(p, 'data-ccf-node');
  out.push({ id, body: p.innerText || p.textContent || '', speaker, time });
}
return out;
"#;

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: String,
    body: String,
    speaker: String,
    time: Option<String>,
}

impl From<RawMessage> for ChatEvent {
    fn from(m: RawMessage) -> Self {
        ChatEvent {
            body: m.body,
            speaker: m.speaker,
            time_label: m.time,
            node: NodeHandle(m.id),
        }
    }
}

pub struct ChatWatcher {
    tab: Arc<Tab>,
    interval: Duration,
}

impl ChatWatcher {
    pub fn new(tab: Arc<Tab>, interval: Duration) -> Self {
        Self { tab, interval }
    }

    async fn scan(&self) -> Result<Vec<ChatEvent>, UiError> {
        let raw: Vec<RawMessage> = eval_in(self.tab.clone(), SCAN_SCRIPT.to_string()).await?;
        Ok(raw.into_iter().map(ChatEvent::from).collect())
    }

    /// 持续扫描直到取消、接收端关闭或浏览器断开
    pub async fn run(self, events: mpsc::Sender<ChatEvent>, token: CancellationToken) -> Result<(), UiError> {
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Chat watcher started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Chat watcher stopping (cancelled)");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }
            let batch = match self.scan().await {
                Ok(batch) => batch,
                Err(UiError::Disconnected) => return Err(UiError::Disconnected),
                Err(e) => {
                    tracing::warn!(error = %e, "Chat scan failed");
                    continue;
                }
            };
            if !batch.is_empty() {
                tracing::debug!(count = batch.len(), "New chat messages");
            }
            for event in batch {
                if events.send(event).await.is_err() {
                    tracing::info!("Chat watcher stopping (receiver closed)");
                    return Ok(());
                }
            }
        }
    }
}
