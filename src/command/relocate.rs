//! `.move <名前…> <x|~x> <y|~y>` 与 `.move <名前>`（居中）

use std::sync::OnceLock;

use regex::Regex;

/// 单个坐标：绝对值或相对当前位置的偏移（`~`）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordSpec {
    Abs(f64),
    Rel(f64),
}

impl CoordSpec {
    pub fn resolve(&self, current: f64) -> f64 {
        match self {
            CoordSpec::Abs(v) => *v,
            CoordSpec::Rel(d) => current + d,
        }
    }
}

/// 移动目标
#[derive(Debug, Clone, PartialEq)]
pub enum MoveTarget {
    Coords { x: CoordSpec, y: CoordSpec },
    /// x = y = -12 × 棋子尺寸（尺寸从对话框读取）
    SizeCentered,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoveCommand {
    pub name: String,
    pub target: MoveTarget,
}

/// 解析结果：成功 / 语法不合法
#[derive(Debug, Clone, PartialEq)]
pub enum MoveParse {
    Parsed(MoveCommand),
    Invalid(&'static str),
}

static NUMBER_RE: OnceLock<Regex> = OnceLock::new();

fn parse_coord(token: &str) -> Option<CoordSpec> {
    let (relative, digits) = match token.strip_prefix('~') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let re = NUMBER_RE.get_or_init(|| Regex::new(r"^[+-]?\d+(\.\d+)?$").unwrap());
    if !re.is_match(digits) {
        return None;
    }
    let value: f64 = digits.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if relative {
        CoordSpec::Rel(value)
    } else {
        CoordSpec::Abs(value)
    })
}

/// 解析 `.move` 之后的部分；空则返回 None
pub fn parse_move(rest: &str) -> Option<MoveParse> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    match tokens.len() {
        0 => None,
        1 => Some(MoveParse::Parsed(MoveCommand {
            name: tokens[0].to_string(),
            target: MoveTarget::SizeCentered,
        })),
        2 => Some(MoveParse::Invalid("expected <name> <x> <y> or a single-token name")),
        n => {
            let (Some(x), Some(y)) = (parse_coord(tokens[n - 2]), parse_coord(tokens[n - 1])) else {
                return Some(MoveParse::Invalid("coordinates must be numbers or ~numbers"));
            };
            Some(MoveParse::Parsed(MoveCommand {
                name: tokens[..n - 2].join(" "),
                target: MoveTarget::Coords { x, y },
            }))
        }
    }
}
