//! `.call`：按魔物库记录逐体贴入

use std::time::Duration;

use serde_json::Number;

use super::Engine;
use crate::command::CallCommand;
use crate::core::EngineError;
use crate::payload::{apply_sword_shards, SpawnPayload};

impl Engine {
    pub(super) async fn run_call(&self, cmd: CallCommand) -> Result<(), EngineError> {
        if !self.monsters.ensure_ready().await {
            return Err(EngineError::CatalogUnavailable(self.monsters.name().to_string()));
        }
        let record = self
            .monsters
            .find_by_exact_name(&cmd.name)
            .ok_or_else(|| EngineError::LookupMiss(cmd.name.clone()))?;
        let base = SpawnPayload::from_record(record)?;

        let clones = cmd.clones(&cmd.name);
        let total = clones.len();
        for (i, spec) in clones.into_iter().enumerate() {
            let mut payload = base.clone();
            payload.data.name = spec.name;
            if let Some(init) = spec.initiative {
                payload.data.initiative = Some(Number::from(init));
            }
            apply_sword_shards(&mut payload, cmd.shards);
            let json = payload.to_json()?;

            let pasted = {
                let _lane = self.lane.enter().await;
                self.paste.paste_json(&json).await
            };
            match pasted {
                Ok(_) => tracing::info!(
                    piece = %payload.data.name,
                    initiative = ?spec.initiative,
                    shards = cmd.shards,
                    progress = %format!("{}/{}", i + 1, total),
                    "Piece pasted"
                ),
                // 单体失败不影响后续
                Err(e) => tracing::warn!(piece = %payload.data.name, error = %e, "Paste failed"),
            }

            if i + 1 < total {
                tokio::time::sleep(Duration::from_millis(self.config.call.clone_gap_ms)).await;
            }
        }
        Ok(())
    }
}
