//! `.move`

use super::Engine;
use crate::command::MoveCommand;
use crate::core::EngineError;

impl Engine {
    pub(super) async fn run_move(&self, cmd: MoveCommand) -> Result<(), EngineError> {
        let _lane = self.lane.enter().await;
        self.relocator.relocate(&cmd.name, &cmd.target, None).await?;
        Ok(())
    }
}
