//! `.execute`：换算时间点后并发发送

use super::Engine;
use crate::command::MacroScript;
use crate::core::EngineError;
use crate::script::{run_schedule, schedule};

impl Engine {
    pub(super) async fn run_script(&self, script: MacroScript) -> Result<(), EngineError> {
        let sends = schedule(&script, &self.config.script);
        if sends.is_empty() {
            tracing::debug!("Empty macro, nothing to send");
            return Ok(());
        }
        let planned = sends.len();
        let sent = run_schedule(sends, self.poster.clone()).await;
        tracing::info!(planned, sent, "Macro finished");
        Ok(())
    }
}
