//! 自删除：指令消息处理后，定时把它清空保存，避免页面重载时再次触发
//!
//! 每个节点最多排一次：定时器触发时节点从 scheduled 移到 finished，两个集合互斥。
//! 触发时节点已不在页面上则静默跳过；按钮或编辑框缺失只记 warn，消息保留原样。

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::TimingSection;
use crate::core::{poll_until, EngineError, RetryPolicy, UiLane};
use crate::ui::{NodeHandle, UiAdapter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetractOutcome {
    Retracted,
    /// 节点已从页面移除
    Detached,
    /// 编辑笔 / 编辑框 / 保存按钮缺失
    ControlMissing(&'static str),
    Failed,
}

#[derive(Debug, Default)]
struct RetractState {
    scheduled: HashSet<NodeHandle>,
    finished: HashSet<NodeHandle>,
}

pub struct RetractScheduler {
    ui: Arc<dyn UiAdapter>,
    lane: UiLane,
    timing: TimingSection,
    state: Mutex<RetractState>,
}

impl RetractScheduler {
    pub fn new(ui: Arc<dyn UiAdapter>, lane: UiLane, timing: TimingSection) -> Self {
        Self {
            ui,
            lane,
            timing,
            state: Mutex::new(RetractState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, RetractState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_scheduled(&self, node: &NodeHandle) -> bool {
        self.state().scheduled.contains(node)
    }

    pub fn is_finished(&self, node: &NodeHandle) -> bool {
        self.state().finished.contains(node)
    }

    /// 排一次自删除；已排过或已完成的节点返回 None
    pub fn schedule(self: &Arc<Self>, node: NodeHandle, delay: Duration) -> Option<JoinHandle<RetractOutcome>> {
        {
            let mut state = self.state();
            if state.scheduled.contains(&node) || state.finished.contains(&node) {
                return None;
            }
            state.scheduled.insert(node.clone());
        }
        tracing::debug!(node = %node, delay_ms = delay.as_millis() as u64, "Self-delete scheduled");

        let this = Arc::clone(self);
        Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut state = this.state();
                state.scheduled.remove(&node);
                state.finished.insert(node.clone());
            }
            match this.retract(&node).await {
                Ok(RetractOutcome::ControlMissing(what)) => {
                    tracing::warn!(node = %node, missing = what, "Self-delete skipped, control not found");
                    RetractOutcome::ControlMissing(what)
                }
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(node = %node, error = %e, "Self-delete failed");
                    RetractOutcome::Failed
                }
            }
        }))
    }

    async fn retract(&self, node: &NodeHandle) -> Result<RetractOutcome, EngineError> {
        let _lane = self.lane.enter().await;
        let ui = &self.ui;

        if !ui.message_attached(node).await? {
            tracing::debug!(node = %node, "Message detached before self-delete");
            return Ok(RetractOutcome::Detached);
        }

        ui.reveal_message_controls(node).await?;
        tokio::time::sleep(Duration::from_millis(self.timing.hover_settle_ms)).await;
        if !ui.click_message_edit(node).await? {
            return Ok(RetractOutcome::ControlMissing("edit button"));
        }

        let policy = RetryPolicy::new(self.timing.editor_poll_attempts, self.timing.poll_interval());
        let Some(editor) = poll_until(policy, || async move { ui.find_message_editor(node).await }).await? else {
            return Ok(RetractOutcome::ControlMissing("message editor"));
        };

        if !ui.clear_and_save(&editor).await? {
            return Ok(RetractOutcome::ControlMissing("save button"));
        }
        tracing::debug!(node = %node, "Command message cleared");
        Ok(RetractOutcome::Retracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MockUi;

    fn scheduler(ui: &Arc<MockUi>) -> Arc<RetractScheduler> {
        Arc::new(RetractScheduler::new(ui.clone(), UiLane::new(), TimingSection::instant()))
    }

    #[tokio::test]
    async fn test_retracts_once() {
        let ui = Arc::new(MockUi::new());
        let event = ui.add_message("n1", "GM", Some("12:00"), ".call Goblin");
        let retract = scheduler(&ui);

        let handle = retract.schedule(event.node.clone(), Duration::from_millis(1)).unwrap();
        assert!(retract.is_scheduled(&event.node));
        assert!(retract.schedule(event.node.clone(), Duration::from_millis(1)).is_none());

        assert_eq!(handle.await.unwrap(), RetractOutcome::Retracted);
        assert!(ui.is_retracted(&event.node));
        assert!(retract.is_finished(&event.node));
        assert!(!retract.is_scheduled(&event.node));
        assert!(retract.schedule(event.node.clone(), Duration::from_millis(1)).is_none());
    }

    #[tokio::test]
    async fn test_detached_node_is_skipped() {
        let ui = Arc::new(MockUi::new());
        let event = ui.add_message("n1", "GM", Some("12:00"), ".move A");
        ui.detach_message(&event.node);
        let outcome = scheduler(&ui)
            .schedule(event.node.clone(), Duration::ZERO)
            .unwrap()
            .await
            .unwrap();
        assert_eq!(outcome, RetractOutcome::Detached);
        assert!(ui.reveals().is_empty());
    }

    #[tokio::test]
    async fn test_missing_editor_leaves_message() {
        let ui = Arc::new(MockUi::new());
        let event = ui.add_message("n1", "GM", Some("12:00"), ".execute");
        ui.set_editor_available(false);
        let outcome = scheduler(&ui)
            .schedule(event.node.clone(), Duration::ZERO)
            .unwrap()
            .await
            .unwrap();
        assert_eq!(outcome, RetractOutcome::ControlMissing("edit button"));
        assert_eq!(ui.message_body(&event.node).as_deref(), Some(".execute"));
    }
}
