//! `.execute` 宏：首行为头，其后每个非空行是一步
//!
//! - `*time N`：等待 N 毫秒，不发送
//! - `*var X`：发送 `{X}`
//! - 其余行原样发送

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroStepKind {
    Wait,
    SendLiteral,
    SendVariable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroStep {
    pub kind: MacroStepKind,
    /// 原始行（去首尾空白）；默认等待按它的首个 token 查表
    pub line: String,
    /// 实际发送的文本；Wait 为空
    pub payload: String,
    /// Wait 的毫秒数
    pub explicit_delay_ms: Option<u64>,
}

impl MacroStep {
    pub fn is_wait(&self) -> bool {
        self.kind == MacroStepKind::Wait
    }

    /// 行首 token（`.move`、`.call` …）
    pub fn prefix(&self) -> &str {
        self.line.split_whitespace().next().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MacroScript {
    pub steps: Vec<MacroStep>,
}

static HEADER_RE: OnceLock<Regex> = OnceLock::new();
static TIME_RE: OnceLock<Regex> = OnceLock::new();
static VAR_RE: OnceLock<Regex> = OnceLock::new();

/// 首个非空行是否为 `.execute` 头（不区分大小写）
pub fn is_execute_header(line: &str) -> bool {
    HEADER_RE
        .get_or_init(|| Regex::new(r"(?i)^\s*\.execute\b").unwrap())
        .is_match(line)
}

fn parse_step(line: &str) -> MacroStep {
    let time_re = TIME_RE.get_or_init(|| Regex::new(r"(?i)^\*time\s+(\d+)").unwrap());
    if let Some(caps) = time_re.captures(line) {
        let ms = caps[1].parse::<u64>().unwrap_or(0);
        return MacroStep {
            kind: MacroStepKind::Wait,
            line: line.to_string(),
            payload: String::new(),
            explicit_delay_ms: Some(ms),
        };
    }
    let var_re = VAR_RE.get_or_init(|| Regex::new(r"(?i)^\*var\s+(.+)").unwrap());
    if let Some(caps) = var_re.captures(line) {
        return MacroStep {
            kind: MacroStepKind::SendVariable,
            line: line.to_string(),
            payload: format!("{{{}}}", &caps[1]),
            explicit_delay_ms: None,
        };
    }
    MacroStep {
        kind: MacroStepKind::SendLiteral,
        line: line.to_string(),
        payload: line.to_string(),
        explicit_delay_ms: None,
    }
}

/// 解析整条消息；首行不是头时返回 None。只有头的宏是合法的空宏
pub fn parse_script(body: &str) -> Option<MacroScript> {
    let mut lines = body
        .split('\n')
        .map(|l| l.replace('\r', ""))
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());
    let header = lines.next()?;
    if !is_execute_header(&header) {
        return None;
    }
    Some(MacroScript {
        steps: lines.map(|l| parse_step(&l)).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_kinds() {
        let script = parse_script(".execute\n.move A 1 2\n\n*time 300\n*var HP\n  hello  ").unwrap();
        let kinds: Vec<_> = script.steps.iter().map(|s| s.kind.clone()).collect();
        assert_eq!(
            kinds,
            [
                MacroStepKind::SendLiteral,
                MacroStepKind::Wait,
                MacroStepKind::SendVariable,
                MacroStepKind::SendLiteral
            ]
        );
        assert_eq!(script.steps[0].prefix(), ".move");
        assert_eq!(script.steps[1].explicit_delay_ms, Some(300));
        assert_eq!(script.steps[2].payload, "{HP}");
        assert_eq!(script.steps[3].payload, "hello");
    }

    #[test]
    fn test_header_only_is_empty_macro() {
        assert_eq!(parse_script(".EXECUTE  \n\n"), Some(MacroScript::default()));
    }

    #[test]
    fn test_not_a_header() {
        assert!(parse_script("say .execute").is_none());
        assert!(parse_script(".executeX\nA").is_none());
    }

    #[test]
    fn test_malformed_time_is_literal() {
        let script = parse_script(".execute\n*time soon").unwrap();
        assert_eq!(script.steps[0].kind, MacroStepKind::SendLiteral);
    }
}
