//! `.cur [上升前, 上升后]`：越过的每个呪深度节点掷一次 d100，汇总减益
//!
//! 节点：50、75、100，110…200（步长 10），205…495（步长 5）。
//! 表 A 用于深度 ≤75，表 B 用于 <200，表 C 用于 ≤495。
//! 「なし」与「購入基本値+1」不计入结果。

use std::collections::HashMap;
use std::sync::OnceLock;

use rand::Rng;

use super::Engine;
use crate::command::CurseCommand;
use crate::core::EngineError;

pub const NOT_RISEN: &str = "⚠️ 呪深度が上昇していません。";
pub const NO_DEPTH_POINT: &str = "🌀 呪深度到達ポイントはありません。";

static DEPTH_POINTS: OnceLock<Vec<u32>> = OnceLock::new();

pub fn depth_points() -> &'static [u32] {
    DEPTH_POINTS.get_or_init(|| {
        [50, 75, 100]
            .into_iter()
            .chain((0..10).map(|i| 110 + i * 10))
            .chain((0..59).map(|i| 205 + i * 5))
            .collect()
    })
}

/// (下限, 上限, 结果)，闭区间
pub type CurseTable = &'static [(u32, u32, &'static str)];

const TABLE_A: CurseTable = &[
    (1, 30, "なし"),
    (31, 40, "器用能力値-1"),
    (41, 50, "敏捷能力値-1"),
    (51, 60, "筋力能力値-1"),
    (61, 70, "生命能力値-1"),
    (71, 80, "知力能力値-1"),
    (81, 90, "精神能力値-1"),
    (91, 100, "購入基本値+1"),
];

const TABLE_B: CurseTable = &[
    (1, 10, "なし"),
    (11, 20, "器用能力値-1"),
    (21, 30, "敏捷能力値-1"),
    (31, 40, "筋力能力値-1"),
    (41, 50, "生命能力値-1"),
    (51, 60, "知力能力値-1"),
    (61, 70, "精神能力値-1"),
    (71, 74, "購入基本値+1"),
    (75, 79, "【幻覚】レベル+1"),
    (80, 84, "【幻聴】レベル+1"),
    (85, 89, "【幻嗅】レベル+1"),
    (90, 94, "【幻味】レベル+1"),
    (95, 99, "【幻触】レベル+1"),
    (100, 100, "ロスト"),
];

const TABLE_C: CurseTable = &[
    (1, 5, "器用能力値-1"),
    (6, 10, "敏捷能力値-1"),
    (11, 15, "筋力能力値-1"),
    (16, 20, "生命能力値-1"),
    (21, 25, "知力能力値-1"),
    (26, 30, "精神能力値-1"),
    (31, 43, "【幻覚】レベル+1"),
    (44, 56, "【幻聴】レベル+1"),
    (57, 69, "【幻嗅】レベル+1"),
    (70, 82, "【幻味】レベル+1"),
    (83, 95, "【幻触】レベル+1"),
    (96, 100, "ロスト"),
];

/// 输出顺序固定
const OUTPUT_ORDER: [&str; 12] = [
    "器用能力値-1",
    "敏捷能力値-1",
    "筋力能力値-1",
    "生命能力値-1",
    "知力能力値-1",
    "精神能力値-1",
    "【幻覚】レベル+1",
    "【幻聴】レベル+1",
    "【幻嗅】レベル+1",
    "【幻味】レベル+1",
    "【幻触】レベル+1",
    "ロスト",
];

const NEUTRAL: [&str; 2] = ["なし", "購入基本値+1"];

pub fn curse_table(depth: u32) -> Option<CurseTable> {
    match depth {
        0..=75 => Some(TABLE_A),
        76..=199 => Some(TABLE_B),
        200..=495 => Some(TABLE_C),
        _ => None,
    }
}

fn lookup(table: CurseTable, roll: u32) -> Option<&'static str> {
    table
        .iter()
        .find(|(lo, hi, _)| (*lo..=*hi).contains(&roll))
        .map(|(_, _, effect)| *effect)
}

/// 生成回复文本
pub fn roll_curse<R: Rng + ?Sized>(cmd: &CurseCommand, rng: &mut R) -> String {
    if cmd.next <= cmd.prev {
        return NOT_RISEN.to_string();
    }
    let reached: Vec<u32> = depth_points()
        .iter()
        .copied()
        .filter(|&p| p > cmd.prev && p <= cmd.next)
        .collect();
    if reached.is_empty() {
        return NO_DEPTH_POINT.to_string();
    }

    let mut counts: HashMap<&'static str, u32> = HashMap::new();
    for depth in &reached {
        let Some(table) = curse_table(*depth) else {
            continue;
        };
        let roll = rng.gen_range(1..=100);
        match lookup(table, roll) {
            Some(effect) if !NEUTRAL.contains(&effect) => *counts.entry(effect).or_default() += 1,
            _ => {}
        }
    }

    let mut lines = vec![format!("◆ロール回数：{}回◆", reached.len())];
    lines.extend(
        OUTPUT_ORDER
            .iter()
            .filter_map(|effect| counts.get(effect).map(|n| format!("{effect}　{n}回"))),
    );
    lines.join("\n")
}

impl Engine {
    pub(super) async fn run_curse(&self, cmd: CurseCommand) -> Result<(), EngineError> {
        let text = roll_curse(&cmd, &mut rand::thread_rng());
        tracing::info!(prev = cmd.prev, next = cmd.next, "Curse depth rolled");
        if !self.poster.reply(&text).await? {
            return Err(EngineError::UiElementNotFound("chat input".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_depth_points() {
        let points = depth_points();
        assert_eq!(&points[..4], &[50, 75, 100, 110]);
        assert!(points.contains(&200));
        assert!(points.contains(&205));
        assert_eq!(points.last(), Some(&495));
        assert_eq!(points.len(), 3 + 10 + 59);
    }

    #[test]
    fn test_table_selection() {
        assert_eq!(curse_table(75), Some(TABLE_A));
        assert_eq!(curse_table(100), Some(TABLE_B));
        assert_eq!(curse_table(200), Some(TABLE_C));
        assert_eq!(curse_table(500), None);
    }

    #[test]
    fn test_tables_cover_d100() {
        for table in [TABLE_A, TABLE_B, TABLE_C] {
            for roll in 1..=100 {
                assert!(lookup(table, roll).is_some(), "roll {roll} uncovered");
            }
        }
    }

    #[test]
    fn test_replies_without_rolls() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(roll_curse(&CurseCommand { prev: 60, next: 60 }, &mut rng), NOT_RISEN);
        assert_eq!(roll_curse(&CurseCommand { prev: 51, next: 74 }, &mut rng), NO_DEPTH_POINT);
    }

    #[test]
    fn test_output_follows_fixed_order() {
        let mut rng = StdRng::seed_from_u64(42);
        let text = roll_curse(&CurseCommand { prev: 0, next: 495 }, &mut rng);
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("◆ロール回数：72回◆"));

        let positions: Vec<usize> = lines
            .map(|line| {
                let effect = line.split('　').next().unwrap();
                OUTPUT_ORDER.iter().position(|e| *e == effect).unwrap()
            })
            .collect();
        assert!(!positions.is_empty());
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(!text.contains("なし"));
    }

    #[test]
    fn test_single_point_reached() {
        let mut rng = StdRng::seed_from_u64(3);
        let text = roll_curse(&CurseCommand { prev: 40, next: 60 }, &mut rng);
        assert!(text.starts_with("◆ロール回数：1回◆"));
    }
}
