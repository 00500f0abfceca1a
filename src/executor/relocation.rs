//! 带身份校验的移动
//!
//! 找棋子 → 右键「編集」→ 等编辑对话框 → 核对对话框里的名字 → 写 x、y → 依次失焦提交 y、x → 关闭。
//! 名字读不到或不一致时直接关闭对话框，一个字段都不写。任何控件缺失同样关闭对话框后报错。
//! 调用方负责持有 UI 车道。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::command::{CoordSpec, MoveTarget};
use crate::config::TimingSection;
use crate::core::{poll_until, EngineError, RetryPolicy};
use crate::dedup::normalize_ws;
use crate::ui::{is_edit_label, DialogField, DialogHandle, ElementRef, PieceHandle, UiAdapter};

/// 居中模式的系数：x = y = -12 × 尺寸
pub const CENTER_FACTOR: f64 = -12.0;

/// 移动完成后的最终坐标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
}

/// 按名字找棋子：精确 label → 精确 caption → 子串。
/// 给了 before 集合时，同一档里优先取不在集合中的最新棋子。
pub fn locate_piece(
    pieces: &[PieceHandle],
    name: &str,
    before: Option<&HashSet<ElementRef>>,
) -> Option<PieceHandle> {
    let target = normalize_ws(name);
    if target.is_empty() {
        return None;
    }
    for tier in 0..3 {
        let hits: Vec<&PieceHandle> = pieces.iter().filter(|p| tier_matches(tier, p, &target)).collect();
        if hits.is_empty() {
            continue;
        }
        let chosen = match before {
            Some(seen) => hits
                .iter()
                .rev()
                .find(|p| !seen.contains(&p.element))
                .or_else(|| hits.last())
                .copied(),
            None => hits.first().copied(),
        };
        return chosen.cloned();
    }
    None
}

fn tier_matches(tier: u8, piece: &PieceHandle, target: &str) -> bool {
    let label = normalize_ws(&piece.label);
    let caption = piece.caption.as_deref().map(normalize_ws);
    match tier {
        0 => label == target,
        1 => caption.as_deref() == Some(target),
        _ => label.contains(target) || caption.map(|c| c.contains(target)).unwrap_or(false),
    }
}

/// 坐标写入格式：整数不带小数点
pub fn format_coord(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

pub struct Relocator {
    ui: Arc<dyn UiAdapter>,
    timing: TimingSection,
}

impl Relocator {
    pub fn new(ui: Arc<dyn UiAdapter>, timing: TimingSection) -> Self {
        Self { ui, timing }
    }

    pub async fn relocate(
        &self,
        name: &str,
        target: &MoveTarget,
        before: Option<&HashSet<ElementRef>>,
    ) -> Result<Placement, EngineError> {
        let pieces = self.ui.list_pieces().await?;
        let piece = locate_piece(&pieces, name, before)
            .ok_or_else(|| EngineError::UiElementNotFound(format!("piece '{}'", name)))?;

        let dialog = self.open_editor(&piece).await?;
        match self.apply(&dialog, name, target).await {
            Ok(placement) => {
                self.ui.close_dialog(&dialog).await?;
                tracing::info!(piece = name, x = placement.x, y = placement.y, "Piece relocated");
                Ok(placement)
            }
            Err(e) => {
                // 关闭失败只记日志，保留原始错误
                if let Err(close_err) = self.ui.close_dialog(&dialog).await {
                    tracing::warn!(piece = name, error = %close_err, "Failed to close edit dialog");
                }
                Err(e)
            }
        }
    }

    /// 右键棋子中心 → 「編集」→ 等对话框
    async fn open_editor(&self, piece: &PieceHandle) -> Result<DialogHandle, EngineError> {
        let interval = self.timing.poll_interval();
        let ui = &self.ui;

        ui.dismiss_menus().await?;
        tokio::time::sleep(Duration::from_millis(self.timing.menu_dismiss_settle_ms)).await;
        ui.open_context_menu(piece.bounds.center()).await?;

        let edit_wait = RetryPolicy::within(Duration::from_millis(self.timing.edit_menu_wait_ms), interval);
        let item = poll_until(edit_wait, || async move {
            let items = ui.list_menu_items().await?;
            Ok(items.into_iter().find(|i| is_edit_label(&i.label)))
        })
        .await?;
        let Some(item) = item else {
            ui.dismiss_menus().await?;
            return Err(EngineError::UiElementNotFound("edit menu item".into()));
        };
        ui.activate_menu_item(&item).await?;

        let dialog_wait = RetryPolicy::within(Duration::from_millis(self.timing.dialog_wait_ms), interval);
        poll_until(dialog_wait, || async move { ui.find_edit_dialog().await })
            .await?
            .ok_or_else(|| EngineError::UiElementNotFound("edit dialog".into()))
    }

    async fn read_number(&self, dialog: &DialogHandle, field: DialogField) -> Result<f64, EngineError> {
        self.ui
            .read_dialog_field(dialog, field)
            .await?
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .ok_or_else(|| EngineError::UiElementNotFound(format!("{} field", field.as_str())))
    }

    /// 相对坐标需要先读出当前值
    async fn resolve_axis(&self, dialog: &DialogHandle, field: DialogField, spec: &CoordSpec) -> Result<f64, EngineError> {
        match spec {
            CoordSpec::Abs(v) => Ok(*v),
            CoordSpec::Rel(_) => Ok(spec.resolve(self.read_number(dialog, field).await?)),
        }
    }

    async fn apply(&self, dialog: &DialogHandle, name: &str, target: &MoveTarget) -> Result<Placement, EngineError> {
        let found = self
            .ui
            .read_dialog_field(dialog, DialogField::Name)
            .await?
            .map(|n| normalize_ws(&n))
            .unwrap_or_default();
        if found.is_empty() {
            return Err(EngineError::IdentityUnverifiable(name.to_string()));
        }
        let expected = normalize_ws(name);
        if found != expected {
            return Err(EngineError::IdentityMismatch { expected, found });
        }

        let placement = match target {
            MoveTarget::Coords { x, y } => Placement {
                x: self.resolve_axis(dialog, DialogField::X, x).await?,
                y: self.resolve_axis(dialog, DialogField::Y, y).await?,
            },
            MoveTarget::SizeCentered => {
                let size = self.read_number(dialog, DialogField::Size).await?;
                let v = CENTER_FACTOR * size;
                Placement { x: v, y: v }
            }
        };

        // 两个输入框都在才开始写，避免只改了 x
        for field in [DialogField::X, DialogField::Y] {
            if self.ui.read_dialog_field(dialog, field).await?.is_none() {
                return Err(EngineError::UiElementNotFound(format!("{} field", field.as_str())));
            }
        }

        if !self.ui.write_dialog_field(dialog, DialogField::X, &format_coord(placement.x)).await? {
            return Err(EngineError::UiElementNotFound("x field".into()));
        }
        tokio::time::sleep(Duration::from_millis(self.timing.field_write_gap_ms)).await;
        if !self.ui.write_dialog_field(dialog, DialogField::Y, &format_coord(placement.y)).await? {
            return Err(EngineError::UiElementNotFound("y field".into()));
        }

        for field in [DialogField::Y, DialogField::X] {
            if !self.ui.commit_dialog_field(dialog, field).await? {
                return Err(EngineError::UiElementNotFound(format!("{} field", field.as_str())));
            }
        }
        tokio::time::sleep(Duration::from_millis(self.timing.commit_settle_ms)).await;
        Ok(placement)
    }
}
