//! 指令解析：先按前缀识别方言，再交给各方言的语法
//!
//! 识别规则：
//! - `.call` / `.move` / `.gachaRS`：去掉前导空白后按前缀匹配（区分大小写），前缀后必须是词边界
//! - `.execute`：首个非空行是头（不区分大小写）
//! - `.cur` / `/add`：正文任意位置出现即可（不区分大小写），本引擎自己的回复除外
//!
//! 无关聊天返回 None；识别出方言但语法不成立时返回 NoMatch 或 Invalid，不会产出半成品指令。

pub mod call;
pub mod curse;
pub mod damage;
pub mod gacha;
pub mod relocate;
pub mod script;

use std::fmt;

pub use call::{parse_call, CallCommand, CloneSpec};
pub use curse::{parse_curse, CurseCommand};
pub use damage::{parse_damage, DamageCommand, DAMAGE_REPLY_MARK};
pub use gacha::{parse_gacha, sanitize_owner, GachaCommand, GACHA_COMMAND};
pub use relocate::{parse_move, CoordSpec, MoveCommand, MoveParse, MoveTarget};
pub use script::{is_execute_header, parse_script, MacroScript, MacroStep, MacroStepKind};

/// 方言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Call,
    Move,
    Curse,
    ExecuteScript,
    GachaRoll,
    AddDamage,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Call => ".call",
            Dialect::Move => ".move",
            Dialect::Curse => ".cur",
            Dialect::ExecuteScript => ".execute",
            Dialect::GachaRoll => ".gachaRS",
            Dialect::AddDamage => "/add",
        }
    }

    /// 触发消息执行后是否自删除
    pub fn retracts(&self) -> bool {
        matches!(self, Dialect::Call | Dialect::Move | Dialect::ExecuteScript)
    }

    /// 重量流程记到持久账本，其余记到会话账本
    pub fn durable(&self) -> bool {
        matches!(self, Dialect::Call | Dialect::ExecuteScript | Dialect::GachaRoll)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 解析完成的指令（封闭集合，处理表用穷尽 match）
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Call(CallCommand),
    Move(MoveCommand),
    Curse(CurseCommand),
    ExecuteScript(MacroScript),
    GachaRoll(GachaCommand),
    AddDamage(DamageCommand),
}

impl Command {
    pub fn dialect(&self) -> Dialect {
        match self {
            Command::Call(_) => Dialect::Call,
            Command::Move(_) => Dialect::Move,
            Command::Curse(_) => Dialect::Curse,
            Command::ExecuteScript(_) => Dialect::ExecuteScript,
            Command::GachaRoll(_) => Dialect::GachaRoll,
            Command::AddDamage(_) => Dialect::AddDamage,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// 方言的语法不成立（参数缺失等）
    NoMatch,
    /// 形式上是该方言，但参数不合法
    Invalid { dialect: Dialect, reason: String },
    Command(Command),
}

/// 前缀后是否为词边界
fn strip_command<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(prefix)?;
    match rest.chars().next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => None,
        _ => Some(rest),
    }
}

fn is_own_curse_reply(body: &str) -> bool {
    body.starts_with("◆ロール回数：") || body.starts_with("⚠️") || body.starts_with("🌀")
}

/// 识别方言；无关聊天返回 None
pub fn detect(body: &str) -> Option<Dialect> {
    let text = body.trim_start();
    if strip_command(text, ".call").is_some() {
        return Some(Dialect::Call);
    }
    if strip_command(text, ".move").is_some() {
        return Some(Dialect::Move);
    }
    if text.lines().next().map(is_execute_header).unwrap_or(false) {
        return Some(Dialect::ExecuteScript);
    }
    if strip_command(text, GACHA_COMMAND).is_some() {
        return Some(Dialect::GachaRoll);
    }
    let lower = text.to_lowercase();
    if lower.contains(".cur") && !is_own_curse_reply(text) {
        return Some(Dialect::Curse);
    }
    if lower.contains("/add") && !text.starts_with(DAMAGE_REPLY_MARK) {
        return Some(Dialect::AddDamage);
    }
    None
}

/// 指令解析器
#[derive(Debug, Clone)]
pub struct CommandParser {
    max_call_count: u32,
}

impl CommandParser {
    pub fn new(max_call_count: u32) -> Self {
        Self { max_call_count }
    }

    /// 无关聊天返回 None
    pub fn parse(&self, body: &str, speaker: &str) -> Option<(Dialect, ParseOutcome)> {
        let dialect = detect(body)?;
        Some((dialect, self.parse_as(dialect, body, speaker)))
    }

    pub fn parse_as(&self, dialect: Dialect, body: &str, speaker: &str) -> ParseOutcome {
        let text = body.trim();
        let found = match dialect {
            Dialect::Call => strip_command(text, ".call")
                .and_then(|rest| parse_call(rest, self.max_call_count))
                .map(Command::Call),
            Dialect::Move => match strip_command(text, ".move").and_then(parse_move) {
                Some(MoveParse::Parsed(cmd)) => Some(Command::Move(cmd)),
                Some(MoveParse::Invalid(reason)) => {
                    return ParseOutcome::Invalid {
                        dialect,
                        reason: reason.to_string(),
                    }
                }
                None => None,
            },
            Dialect::Curse => parse_curse(text).map(Command::Curse),
            Dialect::ExecuteScript => parse_script(text).map(Command::ExecuteScript),
            Dialect::GachaRoll => parse_gacha(text, speaker).map(Command::GachaRoll),
            Dialect::AddDamage => Some(Command::AddDamage(parse_damage(body, speaker))),
        };
        match found {
            Some(cmd) => ParseOutcome::Command(cmd),
            None => ParseOutcome::NoMatch,
        }
    }
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new(10)
    }
}
