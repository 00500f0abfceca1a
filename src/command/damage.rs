//! `/add`：把骰子结果行末尾的 `＞ N` 加总

use std::sync::OnceLock;

use regex::Regex;

use crate::dedup::normalize_ws;

/// 本引擎自己的输出以此开头，不能再次触发
pub const DAMAGE_REPLY_MARK: &str = "【dmg】";

const UNKNOWN_SPEAKER: &str = "（不明なキャラ）";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DamageCommand {
    pub speaker: String,
    pub total: u64,
    pub hits: u32,
}

impl DamageCommand {
    pub fn reply(&self) -> String {
        format!(
            "{mark}{}\n{mark}：{}\n【hit】：{}",
            self.speaker,
            self.total,
            self.hits,
            mark = DAMAGE_REPLY_MARK
        )
    }
}

static RESULT_RE: OnceLock<Regex> = OnceLock::new();

/// 每行末尾的 `＞ N` 计一次命中；含「自動的失敗」的行跳过
pub fn tally(body: &str) -> (u64, u32) {
    let re = RESULT_RE.get_or_init(|| Regex::new(r"＞\s*(\d+)\s*$").unwrap());
    body.lines()
        .filter(|line| !line.contains("自動的失敗"))
        .filter_map(|line| re.captures(line))
        .filter_map(|caps| caps[1].parse::<u64>().ok())
        .fold((0u64, 0u32), |(total, hits), n| (total.saturating_add(n), hits.saturating_add(1)))
}

pub fn parse_damage(body: &str, speaker: &str) -> DamageCommand {
    let (total, hits) = tally(body);
    let speaker = normalize_ws(speaker);
    DamageCommand {
        speaker: if speaker.is_empty() {
            UNKNOWN_SPEAKER.to_string()
        } else {
            speaker
        },
        total,
        hits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_skips_automatic_failures() {
        let body = "/add\n2d6+5 ＞ 12\n2d6+5 ＞ 自動的失敗 ＞ 0\n2d6+5 ＞ 9 \nmiss";
        assert_eq!(tally(body), (21, 2));
    }

    #[test]
    fn test_tally_saturates_on_huge_values() {
        let huge = u64::MAX - 1;
        let body = format!("/add\nx ＞ {huge}\nx ＞ {huge}");
        assert_eq!(tally(&body), (u64::MAX, 2));
    }

    #[test]
    fn test_reply_format() {
        let cmd = parse_damage("/add\nx ＞ 7", "");
        assert_eq!(cmd.reply(), "【dmg】（不明なキャラ）\n【dmg】：7\n【hit】：1");
    }
}
