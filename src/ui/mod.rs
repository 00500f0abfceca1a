//! UI 适配层：宿主页面的全部 DOM 知识都封装在 UiAdapter 之后
//!
//! 引擎只通过这里的句柄类型与页面交互。句柄只在一次操作内有效，
//! 页面重渲染后需要重新查询，不能缓存到下一条指令。
//!
//! - **mock**: 内存模拟的页面，测试与离线演练使用
//! - **cdp**: headless_chrome 连接真实浏览器（feature "browser"）
//! - **watcher**: 轮询聊天日志并产出 ChatEvent（feature "browser"）

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

#[cfg(feature = "browser")]
pub mod cdp;
pub mod mock;
#[cfg(feature = "browser")]
pub mod watcher;

#[cfg(feature = "browser")]
pub use cdp::CdpAdapter;
pub use mock::{MockPiece, MockUi};
#[cfg(feature = "browser")]
pub use watcher::ChatWatcher;

/// 适配器层错误（连接断开、脚本执行失败等），与「元素没找到」区分开
#[derive(Error, Debug)]
pub enum UiError {
    #[error("Browser disconnected")]
    Disconnected,

    #[error("Page script failed: {0}")]
    Script(String),

    #[error("Unexpected page response: {0}")]
    Protocol(String),

    #[error("Clipboard rejected: {0}")]
    ClipboardRejected(String),
}

/// 视口坐标（CSS 像素）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    /// 按比例换算成视口坐标
    pub fn at(&self, fx: f64, fy: f64) -> Point {
        Point::new(self.width * fx, self.height * fy)
    }
}

/// 聊天消息节点的稳定句柄（由监听器打标签）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeHandle(pub String);

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 页面元素引用
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItemHandle {
    pub id: String,
    pub label: String,
}

/// 棋盘上的一个棋子
#[derive(Debug, Clone, PartialEq)]
pub struct PieceHandle {
    pub element: ElementRef,
    /// aria-label / alt 等可访问名
    pub label: String,
    /// 棋子下方显示的名字
    pub caption: Option<String>,
    pub bounds: Rect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogHandle(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogField {
    Name,
    X,
    Y,
    Size,
}

impl DialogField {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialogField::Name => "name",
            DialogField::X => "x",
            DialogField::Y => "y",
            DialogField::Size => "width",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorHandle(pub String);

/// 聊天日志中的一条消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    pub body: String,
    pub speaker: String,
    /// 「今日 21:05」「21:05」「昨日 …」；读不到时为 None
    pub time_label: Option<String>,
    pub node: NodeHandle,
}

/// 宿主页面操作接口
#[async_trait]
pub trait UiAdapter: Send + Sync {
    async fn viewport(&self) -> Result<Viewport, UiError>;

    async fn write_clipboard(&self, text: &str) -> Result<(), UiError>;

    /// 关闭残留的菜单（Escape）
    async fn dismiss_menus(&self) -> Result<(), UiError>;

    /// 在坐标处右键；菜单是否出现由 list_menu_items 判断
    async fn open_context_menu(&self, at: Point) -> Result<(), UiError>;

    async fn list_menu_items(&self) -> Result<Vec<MenuItemHandle>, UiError>;

    async fn activate_menu_item(&self, item: &MenuItemHandle) -> Result<(), UiError>;

    /// 按 DOM 顺序返回棋子，越靠后越新
    async fn list_pieces(&self) -> Result<Vec<PieceHandle>, UiError>;

    async fn find_edit_dialog(&self) -> Result<Option<DialogHandle>, UiError>;

    async fn read_dialog_field(
        &self,
        dialog: &DialogHandle,
        field: DialogField,
    ) -> Result<Option<String>, UiError>;

    /// 写入输入框（尚未提交）；找不到控件时返回 false
    async fn write_dialog_field(
        &self,
        dialog: &DialogHandle,
        field: DialogField,
        value: &str,
    ) -> Result<bool, UiError>;

    /// 失焦提交
    async fn commit_dialog_field(&self, dialog: &DialogHandle, field: DialogField) -> Result<bool, UiError>;

    async fn close_dialog(&self, dialog: &DialogHandle) -> Result<(), UiError>;

    async fn message_attached(&self, node: &NodeHandle) -> Result<bool, UiError>;

    /// 悬停显示消息的操作按钮
    async fn reveal_message_controls(&self, node: &NodeHandle) -> Result<(), UiError>;

    /// 点击编辑笔；按钮不存在时返回 false
    async fn click_message_edit(&self, node: &NodeHandle) -> Result<bool, UiError>;

    /// 编辑框与保存按钮都出现时返回句柄
    async fn find_message_editor(&self, node: &NodeHandle) -> Result<Option<EditorHandle>, UiError>;

    async fn clear_and_save(&self, editor: &EditorHandle) -> Result<bool, UiError>;

    /// 在聊天框发一条消息；输入框或发送按钮缺失时返回 false
    async fn post_chat(&self, text: &str) -> Result<bool, UiError>;
}

/// 菜单项标签是否为「貼り付け / paste」
pub fn is_paste_label(label: &str) -> bool {
    label.contains("貼り付け") || label.to_lowercase().contains("paste")
}

/// 菜单项标签是否为「編集」
pub fn is_edit_label(label: &str) -> bool {
    label.contains("編集")
}
