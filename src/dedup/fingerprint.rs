//! 事件指纹
//!
//! 同一条消息在页面重渲染后会以新的 DOM 节点出现，所以用「发言者 + 时间标签 + 正文」
//! 计算指纹而不是用节点身份。空白先归一化（NBSP 视为空格、连续空白合并），
//! 换行方式不同的同一条消息得到同一个指纹。

use std::fmt;

use crate::ui::ChatEvent;

/// 参与哈希的最大字符数
const MAX_BASE_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// NBSP 转空格、合并连续空白、去首尾空白
pub fn normalize_ws(s: &str) -> String {
    s.replace('\u{00A0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// 时间标签归一化：去掉发言者后缀里的前导「-」
pub fn normalize_time_label(label: &str) -> String {
    normalize_ws(label.trim_start_matches(|c: char| c == '-' || c.is_whitespace()))
}

pub fn fingerprint(event: &ChatEvent) -> Fingerprint {
    fingerprint_parts(&event.speaker, event.time_label.as_deref().unwrap_or(""), &event.body)
}

pub fn fingerprint_parts(speaker: &str, time_label: &str, body: &str) -> Fingerprint {
    let base = format!(
        "{}@@{}@@{}",
        normalize_ws(speaker),
        normalize_time_label(time_label),
        normalize_ws(body)
    );
    let capped: String = base.chars().take(MAX_BASE_CHARS).collect();
    let hash = blake3::hash(capped.as_bytes());
    let hex = hash.to_hex();
    Fingerprint(format!("h{}", &hex.as_str()[..16]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape() {
        let fp = fingerprint_parts("GM", "今日 21:05", ".call Goblin");
        assert_eq!(fp.as_str().len(), 17);
        assert!(fp.as_str().starts_with('h'));
        assert!(fp.as_str()[1..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_stable_under_whitespace_reflow() {
        let a = fingerprint_parts("GM", "- 今日 21:05", ".move Goblin\n10  20");
        let b = fingerprint_parts(" GM", "今日\u{00A0}21:05", ".move   Goblin 10\n20 ");
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinguishes_speaker_and_minute() {
        let a = fingerprint_parts("GM", "今日 21:05", ".cur [40,60]");
        let b = fingerprint_parts("PL", "今日 21:05", ".cur [40,60]");
        let c = fingerprint_parts("GM", "今日 21:06", ".cur [40,60]");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_long_bodies_share_prefix_hash() {
        let long = "x".repeat(3000);
        let longer = format!("{}tail", long);
        assert_eq!(
            fingerprint_parts("GM", "21:05", &long),
            fingerprint_parts("GM", "21:05", &longer)
        );
    }
}
