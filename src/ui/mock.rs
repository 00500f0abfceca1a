//! Mock 页面（用于测试，无需浏览器）
//!
//! 在内存里模拟棋盘、右键菜单、编辑对话框与聊天日志：
//! - 在空白处右键出现「貼り付け」，激活后按剪贴板里的 JSON 生成新棋子
//! - 在棋子上右键出现「編集 / 削除」，激活「編集」打开该棋子的对话框
//! - 对话框字段写入后需 commit 才生效，便于检查写入顺序
//! 所有交互都会被记录，测试可以事后断言。

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{
    ChatEvent, DialogField, DialogHandle, EditorHandle, ElementRef, MenuItemHandle, NodeHandle,
    PieceHandle, Point, Rect, UiAdapter, UiError, Viewport,
};

/// 模拟棋子
#[derive(Debug, Clone, PartialEq)]
pub struct MockPiece {
    pub id: String,
    pub label: String,
    pub caption: Option<String>,
    pub bounds: Rect,
    pub x: f64,
    pub y: f64,
    pub size: f64,
    /// 对话框里显示的名字；None 时与 label 相同
    pub dialog_name: Option<String>,
    /// 贴入时的剪贴板内容
    pub source: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
struct MockMessage {
    body: String,
    speaker: String,
    attached: bool,
    retracted: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum OpenMenu {
    Board,
    Piece(String),
}

#[derive(Debug)]
struct MockState {
    viewport: Viewport,
    clipboard: Vec<String>,
    clipboard_denied: bool,
    paste_enabled: bool,
    board_menu_misses: usize,
    menu: Option<OpenMenu>,
    menu_points: Vec<Point>,
    dismissals: usize,
    pieces: Vec<MockPiece>,
    next_piece: usize,
    dialog: Option<String>,
    dialog_visible: bool,
    missing_fields: HashSet<DialogField>,
    pending: HashMap<DialogField, String>,
    field_writes: Vec<(String, DialogField, String)>,
    commits: Vec<(String, DialogField)>,
    closed_dialogs: usize,
    close_fails: bool,
    messages: HashMap<String, MockMessage>,
    editor_available: bool,
    open_editor: Option<String>,
    reveals: Vec<NodeHandle>,
    posts: Vec<String>,
    chat_available: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            viewport: Viewport {
                width: 1280.0,
                height: 800.0,
            },
            clipboard: Vec::new(),
            clipboard_denied: false,
            paste_enabled: true,
            board_menu_misses: 0,
            menu: None,
            menu_points: Vec::new(),
            dismissals: 0,
            pieces: Vec::new(),
            next_piece: 0,
            dialog: None,
            dialog_visible: true,
            missing_fields: HashSet::new(),
            pending: HashMap::new(),
            field_writes: Vec::new(),
            commits: Vec::new(),
            closed_dialogs: 0,
            close_fails: false,
            messages: HashMap::new(),
            editor_available: true,
            open_editor: None,
            reveals: Vec::new(),
            posts: Vec::new(),
            chat_available: true,
        }
    }
}

/// Mock 页面：所有状态在一把互斥锁里
#[derive(Debug, Default)]
pub struct MockUi {
    state: Mutex<MockState>,
}

impl MockUi {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 放一个已有棋子，返回其元素引用
    pub fn add_piece(&self, label: &str, x: f64, y: f64, size: f64) -> ElementRef {
        let mut s = self.state();
        let id = s.spawn_id();
        let bounds = s.next_bounds();
        s.pieces.push(MockPiece {
            id: id.clone(),
            label: label.to_string(),
            caption: Some(label.to_string()),
            bounds,
            x,
            y,
            size,
            dialog_name: None,
            source: None,
        });
        ElementRef(id)
    }

    /// 让某个棋子的对话框显示不同的名字（空串表示读不到）
    pub fn set_dialog_name(&self, element: &ElementRef, name: &str) {
        let mut s = self.state();
        if let Some(p) = s.pieces.iter_mut().find(|p| p.id == element.0) {
            p.dialog_name = Some(name.to_string());
        }
    }

    pub fn set_caption(&self, element: &ElementRef, caption: Option<&str>) {
        let mut s = self.state();
        if let Some(p) = s.pieces.iter_mut().find(|p| p.id == element.0) {
            p.caption = caption.map(str::to_string);
        }
    }

    /// 前 n 次在空白处右键不出菜单
    pub fn set_board_menu_misses(&self, n: usize) {
        self.state().board_menu_misses = n;
    }

    pub fn set_paste_enabled(&self, enabled: bool) {
        self.state().paste_enabled = enabled;
    }

    pub fn set_clipboard_denied(&self, denied: bool) {
        self.state().clipboard_denied = denied;
    }

    pub fn set_dialog_visible(&self, visible: bool) {
        self.state().dialog_visible = visible;
    }

    /// 模拟对话框缺少某个输入框
    pub fn remove_dialog_field(&self, field: DialogField) {
        self.state().missing_fields.insert(field);
    }

    /// 关闭对话框时报脚本错误（对话框仍留在页面上）
    pub fn set_close_fails(&self, fails: bool) {
        self.state().close_fails = fails;
    }

    pub fn set_editor_available(&self, available: bool) {
        self.state().editor_available = available;
    }

    pub fn set_chat_available(&self, available: bool) {
        self.state().chat_available = available;
    }

    /// 在聊天日志里追加一条消息，返回对应事件
    pub fn add_message(&self, node: &str, speaker: &str, time_label: Option<&str>, body: &str) -> ChatEvent {
        self.state().messages.insert(
            node.to_string(),
            MockMessage {
                body: body.to_string(),
                speaker: speaker.to_string(),
                attached: true,
                retracted: false,
            },
        );
        ChatEvent {
            body: body.to_string(),
            speaker: speaker.to_string(),
            time_label: time_label.map(str::to_string),
            node: NodeHandle(node.to_string()),
        }
    }

    /// 模拟消息被页面移除
    pub fn detach_message(&self, node: &NodeHandle) {
        if let Some(m) = self.state().messages.get_mut(&node.0) {
            m.attached = false;
        }
    }

    pub fn is_retracted(&self, node: &NodeHandle) -> bool {
        self.state()
            .messages
            .get(&node.0)
            .map(|m| m.retracted)
            .unwrap_or(false)
    }

    pub fn retracted_count(&self) -> usize {
        self.state().messages.values().filter(|m| m.retracted).count()
    }

    pub fn message_body(&self, node: &NodeHandle) -> Option<String> {
        self.state().messages.get(&node.0).map(|m| m.body.clone())
    }

    pub fn message_speaker(&self, node: &NodeHandle) -> Option<String> {
        self.state().messages.get(&node.0).map(|m| m.speaker.clone())
    }

    pub fn pieces(&self) -> Vec<MockPiece> {
        self.state().pieces.clone()
    }

    pub fn piece(&self, element: &ElementRef) -> Option<MockPiece> {
        self.state().pieces.iter().find(|p| p.id == element.0).cloned()
    }

    pub fn piece_named(&self, label: &str) -> Option<MockPiece> {
        self.state().pieces.iter().rev().find(|p| p.label == label).cloned()
    }

    pub fn clipboard_history(&self) -> Vec<String> {
        self.state().clipboard.clone()
    }

    pub fn menu_points(&self) -> Vec<Point> {
        self.state().menu_points.clone()
    }

    pub fn dismissals(&self) -> usize {
        self.state().dismissals
    }

    /// (棋子 id, 字段, 值)，按写入顺序
    pub fn field_writes(&self) -> Vec<(String, DialogField, String)> {
        self.state().field_writes.clone()
    }

    pub fn commits(&self) -> Vec<(String, DialogField)> {
        self.state().commits.clone()
    }

    pub fn closed_dialogs(&self) -> usize {
        self.state().closed_dialogs
    }

    pub fn dialog_open(&self) -> bool {
        self.state().dialog.is_some()
    }

    pub fn reveals(&self) -> Vec<NodeHandle> {
        self.state().reveals.clone()
    }

    pub fn posts(&self) -> Vec<String> {
        self.state().posts.clone()
    }
}

impl MockState {
    fn spawn_id(&mut self) -> String {
        self.next_piece += 1;
        format!("piece-{}", self.next_piece)
    }

    /// 棋子沿顶部一排摆放，避开候选右键点
    fn next_bounds(&self) -> Rect {
        let i = self.pieces.len() as f64;
        Rect::new(20.0 + 60.0 * i, 10.0, 40.0, 40.0)
    }

    fn paste_from_clipboard(&mut self) {
        let Some(text) = self.clipboard.last().cloned() else {
            return;
        };
        let value: Option<serde_json::Value> = serde_json::from_str(&text).ok();
        let data = value.as_ref().and_then(|v| v.get("data"));
        let label = data
            .and_then(|d| d.get("name"))
            .and_then(|n| n.as_str())
            .unwrap_or("")
            .to_string();
        let size = data
            .and_then(|d| d.get("width"))
            .and_then(|w| w.as_f64())
            .unwrap_or(1.0);
        let id = self.spawn_id();
        let bounds = self.next_bounds();
        self.pieces.push(MockPiece {
            id,
            caption: Some(label.clone()),
            label,
            bounds,
            x: 0.0,
            y: 0.0,
            size,
            dialog_name: None,
            source: value,
        });
    }

    fn dialog_piece(&self, dialog: &DialogHandle) -> Option<&MockPiece> {
        if self.dialog.as_deref() != Some(dialog.0.as_str()) {
            return None;
        }
        self.pieces.iter().find(|p| p.id == dialog.0)
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

#[async_trait]
impl UiAdapter for MockUi {
    async fn viewport(&self) -> Result<Viewport, UiError> {
        Ok(self.state().viewport)
    }

    async fn write_clipboard(&self, text: &str) -> Result<(), UiError> {
        let mut s = self.state();
        if s.clipboard_denied {
            return Err(UiError::ClipboardRejected("permission denied".into()));
        }
        s.clipboard.push(text.to_string());
        Ok(())
    }

    async fn dismiss_menus(&self) -> Result<(), UiError> {
        let mut s = self.state();
        s.menu = None;
        s.dismissals += 1;
        Ok(())
    }

    async fn open_context_menu(&self, at: Point) -> Result<(), UiError> {
        let mut s = self.state();
        s.menu_points.push(at);
        let hit = s
            .pieces
            .iter()
            .rev()
            .find(|p| p.bounds.contains(at))
            .map(|p| p.id.clone());
        let menu = match hit {
            Some(id) => Some(OpenMenu::Piece(id)),
            None if s.board_menu_misses > 0 => {
                s.board_menu_misses -= 1;
                None
            }
            None => Some(OpenMenu::Board),
        };
        s.menu = menu;
        Ok(())
    }

    async fn list_menu_items(&self) -> Result<Vec<MenuItemHandle>, UiError> {
        let s = self.state();
        let items = match &s.menu {
            None => Vec::new(),
            Some(OpenMenu::Board) if s.paste_enabled => vec![MenuItemHandle {
                id: "paste".into(),
                label: "貼り付け".into(),
            }],
            Some(OpenMenu::Board) => Vec::new(),
            Some(OpenMenu::Piece(_)) => vec![
                MenuItemHandle {
                    id: "edit".into(),
                    label: "編集".into(),
                },
                MenuItemHandle {
                    id: "delete".into(),
                    label: "削除".into(),
                },
            ],
        };
        Ok(items)
    }

    async fn activate_menu_item(&self, item: &MenuItemHandle) -> Result<(), UiError> {
        let mut s = self.state();
        let menu = s.menu.take();
        match (menu, item.id.as_str()) {
            (Some(OpenMenu::Board), "paste") => s.paste_from_clipboard(),
            (Some(OpenMenu::Piece(id)), "edit") => {
                s.pending.clear();
                s.dialog = Some(id);
            }
            (Some(OpenMenu::Piece(id)), "delete") => s.pieces.retain(|p| p.id != id),
            (_, other) => return Err(UiError::Protocol(format!("menu item '{}' is not open", other))),
        }
        Ok(())
    }

    async fn list_pieces(&self) -> Result<Vec<PieceHandle>, UiError> {
        Ok(self
            .state()
            .pieces
            .iter()
            .map(|p| PieceHandle {
                element: ElementRef(p.id.clone()),
                label: p.label.clone(),
                caption: p.caption.clone(),
                bounds: p.bounds,
            })
            .collect())
    }

    async fn find_edit_dialog(&self) -> Result<Option<DialogHandle>, UiError> {
        let s = self.state();
        if !s.dialog_visible {
            return Ok(None);
        }
        Ok(s.dialog.clone().map(DialogHandle))
    }

    async fn read_dialog_field(
        &self,
        dialog: &DialogHandle,
        field: DialogField,
    ) -> Result<Option<String>, UiError> {
        let s = self.state();
        if s.missing_fields.contains(&field) {
            return Ok(None);
        }
        let Some(piece) = s.dialog_piece(dialog) else {
            return Ok(None);
        };
        let value = match field {
            DialogField::Name => piece.dialog_name.clone().unwrap_or_else(|| piece.label.clone()),
            DialogField::X => format_number(piece.x),
            DialogField::Y => format_number(piece.y),
            DialogField::Size => format_number(piece.size),
        };
        Ok(Some(value))
    }

    async fn write_dialog_field(
        &self,
        dialog: &DialogHandle,
        field: DialogField,
        value: &str,
    ) -> Result<bool, UiError> {
        let mut s = self.state();
        if s.missing_fields.contains(&field) || s.dialog_piece(dialog).is_none() {
            return Ok(false);
        }
        s.pending.insert(field, value.to_string());
        s.field_writes.push((dialog.0.clone(), field, value.to_string()));
        Ok(true)
    }

    async fn commit_dialog_field(&self, dialog: &DialogHandle, field: DialogField) -> Result<bool, UiError> {
        let mut s = self.state();
        if s.missing_fields.contains(&field) || s.dialog_piece(dialog).is_none() {
            return Ok(false);
        }
        s.commits.push((dialog.0.clone(), field));
        let Some(value) = s.pending.remove(&field) else {
            return Ok(true);
        };
        let parsed = value.trim().parse::<f64>().ok();
        if let Some(piece) = s.pieces.iter_mut().find(|p| p.id == dialog.0) {
            match (field, parsed) {
                (DialogField::X, Some(v)) => piece.x = v,
                (DialogField::Y, Some(v)) => piece.y = v,
                (DialogField::Size, Some(v)) => piece.size = v,
                (DialogField::Name, _) => piece.label = value,
                _ => {}
            }
        }
        Ok(true)
    }

    async fn close_dialog(&self, _dialog: &DialogHandle) -> Result<(), UiError> {
        let mut s = self.state();
        if s.close_fails {
            return Err(UiError::Script("close button detached".into()));
        }
        s.dialog = None;
        s.pending.clear();
        s.closed_dialogs += 1;
        Ok(())
    }

    async fn message_attached(&self, node: &NodeHandle) -> Result<bool, UiError> {
        Ok(self
            .state()
            .messages
            .get(&node.0)
            .map(|m| m.attached)
            .unwrap_or(false))
    }

    async fn reveal_message_controls(&self, node: &NodeHandle) -> Result<(), UiError> {
        self.state().reveals.push(node.clone());
        Ok(())
    }

    async fn click_message_edit(&self, node: &NodeHandle) -> Result<bool, UiError> {
        let mut s = self.state();
        let attached = s.messages.get(&node.0).map(|m| m.attached).unwrap_or(false);
        if !attached || !s.editor_available {
            return Ok(false);
        }
        s.open_editor = Some(node.0.clone());
        Ok(true)
    }

    async fn find_message_editor(&self, node: &NodeHandle) -> Result<Option<EditorHandle>, UiError> {
        let s = self.state();
        Ok(match &s.open_editor {
            Some(open) if *open == node.0 => Some(EditorHandle(open.clone())),
            _ => None,
        })
    }

    async fn clear_and_save(&self, editor: &EditorHandle) -> Result<bool, UiError> {
        let mut s = self.state();
        s.open_editor = None;
        match s.messages.get_mut(&editor.0) {
            Some(m) => {
                m.body.clear();
                m.retracted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn post_chat(&self, text: &str) -> Result<bool, UiError> {
        let mut s = self.state();
        if !s.chat_available {
            return Ok(false);
        }
        s.posts.push(text.to_string());
        Ok(true)
    }
}
