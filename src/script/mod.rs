//! `.execute` 宏解释：把步骤换算成绝对时间点，再各自独立发送
//!
//! 偏移从 0 开始。Wait 只累加时长；发送步骤排在当前偏移，然后若不是最后一步、
//! 且下一步不是 Wait，再按本行首 token 查表累加默认间隔。

pub mod runner;

use crate::command::MacroScript;
use crate::config::ScriptSection;

pub use runner::run_schedule;

/// 在 at_ms 时刻发送 text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledSend {
    pub at_ms: u64,
    pub text: String,
}

/// 行首 token → 默认间隔
pub fn default_wait_ms(prefix: &str, table: &ScriptSection) -> u64 {
    table
        .prefix_waits
        .iter()
        .find(|w| w.prefix == prefix)
        .map(|w| w.wait_ms)
        .unwrap_or(table.default_wait_ms)
}

pub fn schedule(script: &MacroScript, table: &ScriptSection) -> Vec<ScheduledSend> {
    let steps = &script.steps;
    let mut offset: u64 = 0;
    let mut sends = Vec::new();
    for (i, step) in steps.iter().enumerate() {
        if step.is_wait() {
            offset = offset.saturating_add(step.explicit_delay_ms.unwrap_or(0));
            continue;
        }
        sends.push(ScheduledSend {
            at_ms: offset,
            text: step.payload.clone(),
        });
        let next_is_wait = steps.get(i + 1).map(|s| s.is_wait());
        match next_is_wait {
            // 最后一步之后不再等待；下一步显式等待时不叠加默认间隔
            None | Some(true) => {}
            Some(false) => offset = offset.saturating_add(default_wait_ms(step.prefix(), table)),
        }
    }
    sends
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::parse_script;
    use crate::config::PrefixWait;

    fn table(default_wait_ms: u64) -> ScriptSection {
        ScriptSection {
            default_wait_ms,
            prefix_waits: vec![
                PrefixWait {
                    prefix: ".move".into(),
                    wait_ms: 700,
                },
                PrefixWait {
                    prefix: ".call".into(),
                    wait_ms: 1000,
                },
            ],
        }
    }

    fn offsets(body: &str, default_wait_ms: u64) -> Vec<(u64, String)> {
        let script = parse_script(body).unwrap();
        schedule(&script, &table(default_wait_ms))
            .into_iter()
            .map(|s| (s.at_ms, s.text))
            .collect()
    }

    #[test]
    fn test_explicit_wait_replaces_default() {
        assert_eq!(
            offsets(".execute\nA\n*time 300\nB\nC", 500),
            vec![(0, "A".into()), (300, "B".into()), (800, "C".into())]
        );
    }

    #[test]
    fn test_prefix_table() {
        assert_eq!(
            offsets(".execute\n.move X 1 2\n.call Goblin\n*var HP\nend", 200),
            vec![
                (0, ".move X 1 2".into()),
                (700, ".call Goblin".into()),
                (1700, "{HP}".into()),
                (1900, "end".into())
            ]
        );
    }

    #[test]
    fn test_leading_and_trailing_waits() {
        assert_eq!(
            offsets(".execute\n*time 100\n*time 50\nA\n*time 999", 200),
            vec![(150, "A".into())]
        );
        assert!(offsets(".execute", 200).is_empty());
    }
}
