//! `.gachaRS`：正文必须恰好是指令本身

use std::sync::OnceLock;

use regex::Regex;

use crate::dedup::normalize_ws;

pub const GACHA_COMMAND: &str = ".gachaRS";

/// 所有者取不到时的占位
pub const UNKNOWN_OWNER: &str = "不明";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GachaCommand {
    pub owner: String,
}

static TAIL_RE: OnceLock<Regex> = OnceLock::new();

/// 发言者名清洗：去掉「 - 今日 2:34」后缀、末尾混入的 `.gachaRS` / `gachaRS` 以及残留的「.」
pub fn sanitize_owner(speaker: &str) -> String {
    let full = normalize_ws(speaker);
    let name = match full.split_once(" - ") {
        Some((left, _)) => normalize_ws(left),
        None => full.clone(),
    };
    let tail = TAIL_RE.get_or_init(|| Regex::new(r"(?i)\.?gachaRS$").unwrap());
    let stripped = tail.replace(&name, "").into_owned();
    let stripped = stripped.strip_suffix('.').unwrap_or(stripped.as_str());
    let cleaned = normalize_ws(stripped);
    if cleaned.is_empty() {
        UNKNOWN_OWNER.to_string()
    } else {
        cleaned
    }
}

pub fn parse_gacha(body: &str, speaker: &str) -> Option<GachaCommand> {
    if body.trim() != GACHA_COMMAND {
        return None;
    }
    Some(GachaCommand {
        owner: sanitize_owner(speaker),
    })
}
