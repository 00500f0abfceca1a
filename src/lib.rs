//! CCF - CCFOLIA 聊天指令自动化引擎
//!
//! 监听房间聊天日志，识别特定方言的指令，代替人手在棋盘上贴入、移动棋子并回复结果。
//!
//! 模块划分：
//! - **catalog**: 远端只读数据（魔物库、扭蛋库）的获取、缓存与索引
//! - **command**: 各方言的识别与解析
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误、时钟、UI 车道、重试、优雅关闭
//! - **dedup**: 事件指纹、分钟闸门、已处理账本
//! - **engine**: 事件分派与各指令的执行流程
//! - **executor**: 贴入、移动、聊天发送等 UI 组合操作
//! - **observability**: tracing 初始化
//! - **payload**: 棋子剪贴板数据的构建与加工
//! - **retract**: 指令消息的自删除
//! - **script**: `.execute` 宏的分段与定时发送
//! - **ui**: UiAdapter 接口、内存模拟与浏览器实现

pub mod catalog;
pub mod command;
pub mod config;
pub mod core;
pub mod dedup;
pub mod engine;
pub mod executor;
pub mod observability;
pub mod payload;
pub mod retract;
pub mod script;
pub mod ui;

pub use engine::{Dispatch, Engine, IgnoreReason};
