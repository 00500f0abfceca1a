//! 分钟闸门：只处理时间标签等于当前本地分钟的消息
//!
//! 页面加载时会带出大量历史消息，闸门把它们挡在外面。接受「今日 H:MM」与裸「H:MM」，
//! 小时补零后比较；「昨日 …」、日期格式或缺少标签一律不处理。

use std::sync::OnceLock;

use regex::Regex;

use crate::core::Clock;

static TIME_LABEL_RE: OnceLock<Regex> = OnceLock::new();

fn label_regex() -> &'static Regex {
    TIME_LABEL_RE.get_or_init(|| Regex::new(r"^(?:今日\s*)?(\d{1,2}):(\d{2})$").unwrap())
}

/// 把时间标签解析成 HH:MM；无法识别返回 None
pub fn label_minute(label: &str) -> Option<String> {
    let label = super::fingerprint::normalize_time_label(label);
    let caps = label_regex().captures(&label)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(format!("{:02}:{:02}", hour, minute))
}

/// 标签是否属于当前本地分钟
pub fn is_current_minute(label: Option<&str>, clock: &dyn Clock) -> bool {
    match label.and_then(label_minute) {
        Some(hhmm) => hhmm == clock.local_hhmm(),
        None => false,
    }
}
