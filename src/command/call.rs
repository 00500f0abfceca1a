//! `.call <名前…> [先制値] [体数] [-sN]…`

use std::sync::OnceLock;

use regex::Regex;

/// 召唤指令
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallCommand {
    pub name: String,
    pub initiative: Option<i64>,
    pub count: u32,
    /// 剑之碎片总数（所有 -sN 之和）
    pub shards: u32,
}

/// 单个克隆体的名字与先制值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneSpec {
    pub name: String,
    pub initiative: Option<i64>,
}

static INT_RE: OnceLock<Regex> = OnceLock::new();
static SHARD_RE: OnceLock<Regex> = OnceLock::new();

fn is_int(token: &str) -> bool {
    INT_RE
        .get_or_init(|| Regex::new(r"^[+-]?\d+$").unwrap())
        .is_match(token)
}

fn shard_token(token: &str) -> Option<u32> {
    let caps = SHARD_RE
        .get_or_init(|| Regex::new(r"^-s(\d+)$").unwrap())
        .captures(token)?;
    Some(caps[1].parse::<u32>().unwrap_or(0))
}

/// 解析 `.call` 之后的部分；名字为空返回 None
pub fn parse_call(rest: &str, max_count: u32) -> Option<CallCommand> {
    let mut shards: u32 = 0;
    let mut tokens: Vec<&str> = Vec::new();
    for token in rest.split_whitespace() {
        match shard_token(token) {
            Some(n) => shards = shards.saturating_add(n),
            None => tokens.push(token),
        }
    }

    let mut initiative = None;
    let mut count: i64 = 1;
    let n = tokens.len();
    if n >= 3 && is_int(tokens[n - 1]) && is_int(tokens[n - 2]) {
        initiative = tokens[n - 2].parse::<i64>().ok();
        count = tokens[n - 1].parse::<i64>().unwrap_or(1);
        tokens.truncate(n - 2);
    } else if n >= 2 && is_int(tokens[n - 1]) {
        initiative = tokens[n - 1].parse::<i64>().ok();
        tokens.truncate(n - 1);
    }

    let name = tokens.join(" ");
    if name.is_empty() {
        return None;
    }
    let count = if initiative.is_some() {
        count.clamp(1, i64::from(max_count.max(1))) as u32
    } else {
        1
    };

    Some(CallCommand {
        name,
        initiative,
        count,
        shards,
    })
}

impl CallCommand {
    /// 克隆体命名：有碎片时追加一次「†」，多体时追加 A、B、C…；先制值逐个减一
    pub fn clones(&self, base_name: &str) -> Vec<CloneSpec> {
        let mut stem = base_name.to_string();
        if self.shards > 0 && !stem.contains('†') {
            stem.push('†');
        }
        (0..self.count)
            .map(|i| {
                let mut name = stem.clone();
                if self.count > 1 {
                    name.push(suffix_letter(i));
                }
                CloneSpec {
                    name,
                    initiative: self.initiative.map(|init| init - i64::from(i)),
                }
            })
            .collect()
    }
}

fn suffix_letter(index: u32) -> char {
    char::from_u32(u32::from(b'A') + index).unwrap_or('?')
}
