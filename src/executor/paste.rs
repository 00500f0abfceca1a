//! 贴入：在多个候选坐标右键，直到出现「貼り付け」
//!
//! 候选顺序：上次成功的坐标（等 500ms）→ 视口内固定比例点（各等 700ms）。
//! 每次尝试前先 Escape 关掉残留菜单。成功的坐标记在本实例里，下次优先尝试。
//! 调用方负责持有 UI 车道。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::TimingSection;
use crate::core::{poll_until, EngineError, RetryPolicy};
use crate::ui::{is_paste_label, Point, UiAdapter, UiError};

/// 视口比例坐标，依次尝试
pub const CANDIDATE_FRACTIONS: [(f64, f64); 7] = [
    (0.10, 0.92),
    (0.50, 0.08),
    (0.82, 0.50),
    (0.32, 0.30),
    (0.68, 0.30),
    (0.50, 0.50),
    (0.40, 0.50),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidatePoint {
    pub point: Point,
    pub last_success: bool,
}

pub struct PasteSearch {
    ui: Arc<dyn UiAdapter>,
    timing: TimingSection,
    last_success: Mutex<Option<Point>>,
}

impl PasteSearch {
    pub fn new(ui: Arc<dyn UiAdapter>, timing: TimingSection) -> Self {
        Self {
            ui,
            timing,
            last_success: Mutex::new(None),
        }
    }

    pub fn last_success(&self) -> Option<Point> {
        *self.last_success.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remember(&self, point: Point) {
        *self.last_success.lock().unwrap_or_else(|e| e.into_inner()) = Some(point);
    }

    pub async fn candidates(&self) -> Result<Vec<CandidatePoint>, UiError> {
        let viewport = self.ui.viewport().await?;
        let mut points = Vec::with_capacity(CANDIDATE_FRACTIONS.len() + 1);
        if let Some(point) = self.last_success() {
            points.push(CandidatePoint {
                point,
                last_success: true,
            });
        }
        points.extend(CANDIDATE_FRACTIONS.iter().map(|&(fx, fy)| CandidatePoint {
            point: viewport.at(fx, fy),
            last_success: false,
        }));
        Ok(points)
    }

    /// 写剪贴板并贴入，返回成功的坐标
    pub async fn paste_json(&self, json: &str) -> Result<Point, EngineError> {
        self.ui.write_clipboard(json).await.map_err(|e| match e {
            UiError::ClipboardRejected(msg) => EngineError::Clipboard(msg),
            other => EngineError::Ui(other),
        })?;
        self.paste_at_candidates().await
    }

    pub async fn paste_at_candidates(&self) -> Result<Point, EngineError> {
        let candidates = self.candidates().await?;
        let interval = self.timing.poll_interval();
        for candidate in &candidates {
            self.ui.dismiss_menus().await?;
            tokio::time::sleep(Duration::from_millis(self.timing.menu_dismiss_settle_ms)).await;

            self.ui.open_context_menu(candidate.point).await?;
            let wait = if candidate.last_success {
                self.timing.last_point_menu_wait_ms
            } else {
                self.timing.menu_wait_ms
            };
            let ui = &self.ui;
            let item = poll_until(RetryPolicy::within(Duration::from_millis(wait), interval), || async move {
                let items = ui.list_menu_items().await?;
                Ok(items.into_iter().find(|i| is_paste_label(&i.label)))
            })
            .await?;

            if let Some(item) = item {
                self.ui.activate_menu_item(&item).await?;
                self.remember(candidate.point);
                tracing::debug!(x = candidate.point.x, y = candidate.point.y, "Pasted at candidate point");
                return Ok(candidate.point);
            }
            tracing::debug!(x = candidate.point.x, y = candidate.point.y, "No paste menu at candidate point");
        }
        self.ui.dismiss_menus().await?;
        Err(EngineError::PasteTargetNotFound {
            attempts: candidates.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MockUi;

    fn search(ui: &Arc<MockUi>) -> PasteSearch {
        PasteSearch::new(ui.clone(), TimingSection::instant())
    }

    #[tokio::test]
    async fn test_first_candidate_then_last_success() {
        let ui = Arc::new(MockUi::new());
        let paste = search(&ui);
        let first = paste.paste_json(r#"{"kind":"character","data":{"name":"A"}}"#).await.unwrap();
        assert_eq!(first, Point::new(128.0, 736.0));

        let candidates = paste.candidates().await.unwrap();
        assert_eq!(candidates.len(), 8);
        assert!(candidates[0].last_success);

        paste.paste_json(r#"{"kind":"character","data":{"name":"B"}}"#).await.unwrap();
        let points = ui.menu_points();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1], first);
        assert!(ui.piece_named("B").is_some());
    }

    #[tokio::test]
    async fn test_falls_through_to_later_candidates() {
        let ui = Arc::new(MockUi::new());
        ui.set_board_menu_misses(2);
        let paste = search(&ui);
        let point = paste.paste_at_candidates().await.unwrap();
        assert_eq!(point, Point::new(1280.0 * 0.82, 400.0));
        assert_eq!(ui.menu_points().len(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion() {
        let ui = Arc::new(MockUi::new());
        ui.set_paste_enabled(false);
        let paste = search(&ui);
        let err = paste.paste_at_candidates().await.unwrap_err();
        assert!(matches!(err, EngineError::PasteTargetNotFound { attempts: 7 }));
        assert!(paste.last_success().is_none());
    }

    #[tokio::test]
    async fn test_clipboard_rejection() {
        let ui = Arc::new(MockUi::new());
        ui.set_clipboard_denied(true);
        let err = search(&ui).paste_json("{}").await.unwrap_err();
        assert!(matches!(err, EngineError::Clipboard(_)));
        assert!(ui.menu_points().is_empty());
    }
}
