//! `/add`

use super::Engine;
use crate::command::DamageCommand;
use crate::core::EngineError;

impl Engine {
    pub(super) async fn run_damage(&self, cmd: DamageCommand) -> Result<(), EngineError> {
        tracing::info!(speaker = %cmd.speaker, total = cmd.total, hits = cmd.hits, "Damage tallied");
        if !self.poster.reply(&cmd.reply()).await? {
            return Err(EngineError::UiElementNotFound("chat input".into()));
        }
        Ok(())
    }
}
