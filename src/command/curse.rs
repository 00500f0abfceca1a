//! `.cur [上升前, 上升后]`

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurseCommand {
    pub prev: u32,
    pub next: u32,
}

static CURSE_RE: OnceLock<Regex> = OnceLock::new();

/// 在正文任意位置找 `.cur [a, b]`；找不到返回 None
pub fn parse_curse(body: &str) -> Option<CurseCommand> {
    let re = CURSE_RE.get_or_init(|| Regex::new(r"(?i)\.cur\s*\[\s*(\d+)\s*,\s*(\d+)\s*]").unwrap());
    let caps = re.captures(body)?;
    Some(CurseCommand {
        prev: caps[1].parse().ok()?,
        next: caps[2].parse().ok()?,
    })
}
