//! `.gachaRS`：五连抽，逐个贴入并移到固定位置
//!
//! 先一次性抽完，再逐个：等待 → 记录同名棋子 → 写剪贴板并贴入 → 等待 → 带身份校验移动。
//! 贴入失败（含剪贴板）中止剩余的抽取；移动失败只记日志。
//! 整个流程持有 UI 车道，其它指令的 UI 操作在此期间排队。

use std::collections::HashSet;
use std::time::Duration;

use rand::Rng;
use serde_json::Value;

use super::Engine;
use crate::command::{CoordSpec, GachaCommand, MoveTarget};
use crate::config::LayoutPoint;
use crate::core::EngineError;
use crate::dedup::normalize_ws;
use crate::executor::CENTER_FACTOR;
use crate::payload::build_gacha_piece;
use crate::ui::ElementRef;

const RARITIES: [u8; 3] = [1, 2, 3];

/// 按权重抽稀有度（★1 / ★2 / ★3）
pub fn pick_rarity<R: Rng + ?Sized>(weights: &[u32; 3], rng: &mut R) -> u8 {
    let total: u32 = weights.iter().sum();
    if total == 0 {
        return RARITIES[0];
    }
    let mut roll = rng.gen_range(1..=total);
    for (rarity, &weight) in RARITIES.iter().zip(weights) {
        if roll <= weight {
            return *rarity;
        }
        roll -= weight;
    }
    RARITIES[RARITIES.len() - 1]
}

fn layout_center(centers: &[LayoutPoint], i: usize) -> LayoutPoint {
    centers
        .get(i)
        .or_else(|| centers.last())
        .copied()
        .unwrap_or(LayoutPoint { x: 0.0, y: 0.0 })
}

impl Engine {
    pub(super) async fn run_gacha(&self, cmd: GachaCommand) -> Result<(), EngineError> {
        let catalog = &self.gacha_items;
        if !catalog.ensure_ready().await {
            return Err(EngineError::CatalogUnavailable(catalog.name().to_string()));
        }
        let empty: Vec<u8> = RARITIES
            .iter()
            .copied()
            .filter(|r| catalog.bucket_len(&r.to_string()) == 0)
            .collect();
        if !empty.is_empty() {
            return Err(EngineError::CatalogUnavailable(format!(
                "{}: rarity bucket(s) {:?} empty",
                catalog.name(),
                empty
            )));
        }

        let cfg = &self.config.gacha;
        let draws: Vec<(u8, Value)> = {
            let mut rng = rand::thread_rng();
            (0..cfg.draw_count)
                .filter_map(|_| {
                    let rarity = pick_rarity(&cfg.rarity_weights, &mut rng);
                    catalog
                        .pick_random_by_bucket(&rarity.to_string(), &mut rng)
                        .map(|item| (rarity, item.clone()))
                })
                .collect()
        };
        let results = draws
            .iter()
            .map(|(r, item)| format!("★{}:{}", r, item.get("name").and_then(Value::as_str).unwrap_or("?")))
            .collect::<Vec<_>>()
            .join(" / ");
        tracing::info!(owner = %cmd.owner, results = %results, "Gacha drawn");

        let step_wait = Duration::from_millis(cfg.step_wait_ms);
        let offset = CENTER_FACTOR * f64::from(cfg.token_size);
        let _lane = self.lane.enter().await;

        for (i, (rarity, item)) in draws.iter().enumerate() {
            let piece = build_gacha_piece(item, &cmd.owner, *rarity, cfg.token_size)?;
            let token_name = piece.data.name.clone();
            let json = piece.to_json()?;

            tokio::time::sleep(step_wait).await;
            let before = self.pieces_named(&token_name).await?;
            if let Err(e) = self.paste.paste_json(&json).await {
                tracing::warn!(piece = %token_name, error = %e, "Gacha paste failed, remaining draws aborted");
                return Err(e);
            }
            tracing::info!(piece = %token_name, draw = i + 1, "Gacha piece pasted");

            tokio::time::sleep(step_wait).await;
            let center = layout_center(&cfg.layout_centers, i);
            let target = MoveTarget::Coords {
                x: CoordSpec::Abs(center.x + offset),
                y: CoordSpec::Abs(center.y + offset),
            };
            if let Err(e) = self.relocator.relocate(&token_name, &target, Some(&before)).await {
                tracing::warn!(piece = %token_name, error = %e, "Gacha piece not moved");
            }
        }
        tracing::info!(owner = %cmd.owner, draws = draws.len(), "Gacha finished");
        Ok(())
    }

    /// 贴入前已存在的同名棋子
    async fn pieces_named(&self, name: &str) -> Result<HashSet<ElementRef>, EngineError> {
        let target = normalize_ws(name);
        Ok(self
            .ui
            .list_pieces()
            .await?
            .into_iter()
            .filter(|p| {
                normalize_ws(&p.label) == target
                    || p.caption.as_deref().is_some_and(|c| normalize_ws(c) == target)
            })
            .map(|p| p.element)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_rarity_distribution_follows_weights() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut counts = [0u32; 3];
        for _ in 0..10_000 {
            counts[usize::from(pick_rarity(&[75, 20, 5], &mut rng)) - 1] += 1;
        }
        assert!((7000..8000).contains(&counts[0]), "{counts:?}");
        assert!((1500..2500).contains(&counts[1]), "{counts:?}");
        assert!((200..800).contains(&counts[2]), "{counts:?}");
    }

    #[test]
    fn test_zero_weight_never_drawn() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..500 {
            assert_eq!(pick_rarity(&[0, 1, 0], &mut rng), 2);
        }
    }

    #[test]
    fn test_layout_falls_back_to_last_center() {
        let centers = vec![LayoutPoint { x: -240.0, y: -240.0 }, LayoutPoint { x: 0.0, y: -240.0 }];
        assert_eq!(layout_center(&centers, 1).x, 0.0);
        assert_eq!(layout_center(&centers, 4).x, 0.0);
        assert_eq!(layout_center(&[], 0), LayoutPoint { x: 0.0, y: 0.0 });
    }
}
