//! 剣のかけら（`.call … -sN`）强化
//!
//! 抵抗力按总数分档加值；HP/MP 按部位平分，余数给编号最小的部位；memo 同步改写。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::{leading_int, PieceData, SpawnPayload};

const VIT_LABEL: &str = "生命抵抗力";
const MEN_LABEL: &str = "精神抵抗力";
const SHARD_LINE_PREFIX: &str = "★〈剣のかけら〉";
const HP_PER_SHARD: i64 = 5;
const MP_PER_SHARD: i64 = 1;

static HP_LABEL: OnceLock<Regex> = OnceLock::new();
static MP_LABEL: OnceLock<Regex> = OnceLock::new();

/// ≤5:+1，≤10:+2，≤15:+3，其余 +4
pub fn shard_resist_bonus(shards: u32) -> i64 {
    match shards {
        0 => 0,
        1..=5 => 1,
        6..=10 => 2,
        11..=15 => 3,
        _ => 4,
    }
}

fn part_index(re: &Regex, label: &str) -> Option<u32> {
    re.captures(label).and_then(|c| c[1].parse().ok())
}

/// 对可解析的 value / max 加上 inc，结果写回字符串
fn bump(slot: &mut Option<Value>, inc: i64) {
    if let Some(v) = slot.as_ref().and_then(leading_int) {
        *slot = Some(Value::String((v + inc).to_string()));
    }
}

/// 没有 status 数组或 shards 为 0 时不做任何改动
pub fn apply_sword_shards(payload: &mut SpawnPayload, shards: u32) {
    let data = &mut payload.data;
    if data.status.is_none() || shards == 0 {
        return;
    }

    let bonus = shard_resist_bonus(shards);
    if let Some(params) = data.params.as_mut() {
        for p in params.iter_mut().filter(|p| p.label == VIT_LABEL || p.label == MEN_LABEL) {
            // 只改字符串形式的值
            if let Some(v) = p.value.as_ref().filter(|v| v.is_string()).and_then(leading_int) {
                p.value = Some(Value::String((v + bonus).to_string()));
            }
        }
    }

    let hp_re = HP_LABEL.get_or_init(|| Regex::new(r"^HP(\d+)$").unwrap());
    let mp_re = MP_LABEL.get_or_init(|| Regex::new(r"^MP(\d+)$").unwrap());

    if let Some(status) = data.status.as_mut() {
        let mut hp_parts: Vec<(u32, usize)> = status
            .iter()
            .enumerate()
            .filter_map(|(i, st)| part_index(hp_re, &st.label).map(|part| (part, i)))
            .collect();
        hp_parts.sort_by_key(|&(part, _)| part);

        if !hp_parts.is_empty() {
            let n = hp_parts.len() as u32;
            let (base, remainder) = (shards / n, shards % n);
            for (j, &(part, hp_idx)) in hp_parts.iter().enumerate() {
                let share = i64::from(if j == 0 { base + remainder } else { base });
                if share <= 0 {
                    continue;
                }
                let hp = &mut status[hp_idx];
                bump(&mut hp.value, HP_PER_SHARD * share);
                bump(&mut hp.max, HP_PER_SHARD * share);

                // 同部位原本就有 MP 时才加；同编号多条时取最后一条
                let mp_idx = status
                    .iter()
                    .rposition(|st| part_index(mp_re, &st.label) == Some(part));
                if let Some(mp_idx) = mp_idx {
                    let mp = &mut status[mp_idx];
                    bump(&mut mp.value, MP_PER_SHARD * share);
                    bump(&mut mp.max, MP_PER_SHARD * share);
                }
            }
        }
    }

    if bonus > 0 {
        rewrite_memo(data, shards);
    }
}

fn value_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn resist_line(data: &PieceData) -> String {
    let params = data.params.as_deref().unwrap_or_default();
    let text_of = |label: &str| {
        let value = params.iter().find(|p| p.label == label).and_then(|p| p.value.as_ref());
        let text = value_text(value);
        let plus = value
            .and_then(leading_int)
            .map(|v| (v + 7).to_string())
            .unwrap_or_default();
        (text, plus)
    };
    let (vit, vit_plus) = text_of(VIT_LABEL);
    let (men, men_plus) = text_of(MEN_LABEL);
    format!("{VIT_LABEL}:{vit} ({vit_plus})　{MEN_LABEL}:{men} ({men_plus})")
}

/// memo 是字符串且 params 是数组时才改写
fn rewrite_memo(data: &mut PieceData, shards: u32) {
    if data.params.is_none() {
        return;
    }
    let Some(memo) = data.memo.as_ref() else {
        return;
    };
    let mut lines: Vec<String> = memo.split('\n').map(str::to_string).collect();

    let shard_line = format!("{SHARD_LINE_PREFIX}{shards}個");
    match lines.iter().position(|l| l.starts_with(SHARD_LINE_PREFIX)) {
        Some(i) => lines[i] = shard_line,
        None => lines.insert(0, shard_line),
    }

    let resist = resist_line(data);
    let vit_prefix = format!("{VIT_LABEL}:");
    match lines.iter().position(|l| l.starts_with(&vit_prefix)) {
        Some(i) => lines[i] = resist,
        None => lines.push(resist),
    }

    data.memo = Some(lines.join("\n"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn goblin() -> SpawnPayload {
        SpawnPayload::from_record(&json!({
            "kind": "character",
            "data": {
                "name": "Goblin",
                "memo": "分類:蛮族\n生命抵抗力:4 (11)　精神抵抗力:3 (10)",
                "status": [
                    {"label": "HP2", "value": "20", "max": "20"},
                    {"label": "HP1", "value": "16", "max": "16"},
                    {"label": "MP1", "value": "10", "max": "10"},
                    {"label": "MP2", "value": "8", "max": "8"}
                ],
                "params": [
                    {"label": "生命抵抗力", "value": "4"},
                    {"label": "精神抵抗力", "value": "3"},
                    {"label": "回避力", "value": "5"}
                ]
            }
        }))
        .unwrap()
    }

    fn status_of(p: &SpawnPayload, label: &str) -> (Value, Value) {
        let st = p.data.status.as_ref().unwrap().iter().find(|s| s.label == label).unwrap();
        (st.value.clone().unwrap(), st.max.clone().unwrap())
    }

    #[test]
    fn test_resist_bonus_tiers() {
        assert_eq!(shard_resist_bonus(0), 0);
        assert_eq!(shard_resist_bonus(5), 1);
        assert_eq!(shard_resist_bonus(6), 2);
        assert_eq!(shard_resist_bonus(15), 3);
        assert_eq!(shard_resist_bonus(16), 4);
    }

    #[test]
    fn test_three_shards_over_two_parts() {
        let mut p = goblin();
        apply_sword_shards(&mut p, 3);

        // 3 / 2 = 1，余 1 给 HP1：HP1 +10，HP2 +5
        assert_eq!(status_of(&p, "HP1"), (json!("26"), json!("26")));
        assert_eq!(status_of(&p, "HP2"), (json!("25"), json!("25")));
        assert_eq!(status_of(&p, "MP1"), (json!("12"), json!("12")));
        assert_eq!(status_of(&p, "MP2"), (json!("9"), json!("9")));

        let params = p.data.params.as_ref().unwrap();
        assert_eq!(params[0].value, Some(json!("5")));
        assert_eq!(params[1].value, Some(json!("4")));
        assert_eq!(params[2].value, Some(json!("5")));

        assert_eq!(
            p.data.memo.as_deref(),
            Some("★〈剣のかけら〉3個\n分類:蛮族\n生命抵抗力:5 (12)　精神抵抗力:4 (11)")
        );
    }

    #[test]
    fn test_share_below_one_is_skipped() {
        let mut p = goblin();
        p.data.status.as_mut().unwrap().push(crate::payload::StatusEntry {
            label: "HP3".into(),
            value: Some(json!("30")),
            max: Some(json!("30")),
            ..Default::default()
        });
        apply_sword_shards(&mut p, 1);
        assert_eq!(status_of(&p, "HP1"), (json!("21"), json!("21")));
        assert_eq!(status_of(&p, "HP2"), (json!("20"), json!("20")));
        assert_eq!(status_of(&p, "HP3"), (json!("30"), json!("30")));
    }

    #[test]
    fn test_existing_shard_line_is_replaced() {
        let mut p = goblin();
        p.data.memo = Some("★〈剣のかけら〉1個\nメモ".into());
        apply_sword_shards(&mut p, 7);
        assert_eq!(
            p.data.memo.as_deref(),
            Some("★〈剣のかけら〉7個\nメモ\n生命抵抗力:6 (13)　精神抵抗力:5 (12)")
        );
    }

    #[test]
    fn test_no_status_array_is_untouched() {
        let mut p = goblin();
        p.data.status = None;
        let before = p.clone();
        apply_sword_shards(&mut p, 4);
        assert_eq!(p, before);
    }

    #[test]
    fn test_numeric_resist_value_is_left_alone() {
        let mut p = goblin();
        p.data.params.as_mut().unwrap()[0].value = Some(json!(4));
        p.data.memo = Some(String::new());
        apply_sword_shards(&mut p, 2);
        assert_eq!(p.data.params.as_ref().unwrap()[0].value, Some(json!(4)));
        assert!(p.data.memo.as_deref().unwrap().ends_with("生命抵抗力:4 (11)　精神抵抗力:4 (11)"));
    }
}
