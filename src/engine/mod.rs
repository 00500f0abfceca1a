//! 引擎：接收聊天事件，去重后解析并分派到各方言的处理流程
//!
//! 处理顺序：识别方言 → 分钟闸门 → 账本查重并标记 → 解析 → 排自删除 → 派生任务执行。
//! 每条被接受的指令在独立任务里执行，任务自己捕获错误并写日志。
//! 会改动 UI 的步骤都要经过引擎持有的 UI 车道。

mod call;
mod curse;
mod damage;
mod execute;
mod gacha;
mod movement;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::catalog::Catalog;
use crate::command::{Command, CommandParser, Dialect, ParseOutcome};
use crate::config::AppConfig;
use crate::core::{BusyGate, BusyPermit, Clock, EngineError, UiLane};
use crate::dedup::{fingerprint, is_current_minute, LedgerFile, ProcessedLedger};
use crate::executor::{ChatPoster, PasteSearch, Relocator};
use crate::retract::{RetractOutcome, RetractScheduler};
use crate::ui::{ChatEvent, UiAdapter};

pub use curse::{curse_table, depth_points, roll_curse, CurseTable};
pub use gacha::pick_rarity;

/// 事件被忽略的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// 不是任何方言
    NotACommand,
    /// 时间标签不是当前分钟（含历史消息）
    StaleMinute,
    /// TTL 内已处理过
    AlreadyProcessed,
    /// 同类重量流程正在执行
    Busy,
}

/// handle 的结果
#[derive(Debug)]
pub enum Dispatch {
    Accepted {
        dialect: Dialect,
        /// 解析失败（NoMatch / Invalid）时没有任务
        task: Option<JoinHandle<()>>,
        retraction: Option<JoinHandle<RetractOutcome>>,
    },
    Ignored(IgnoreReason),
}

impl Dispatch {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Dispatch::Accepted { .. })
    }

    /// 等待任务与自删除都结束（测试与演练用）
    pub async fn settle(self) -> Option<RetractOutcome> {
        let Dispatch::Accepted { task, retraction, .. } = self else {
            return None;
        };
        if let Some(task) = task {
            let _ = task.await;
        }
        match retraction {
            Some(r) => r.await.ok(),
            None => None,
        }
    }
}

pub struct Engine {
    ui: Arc<dyn UiAdapter>,
    clock: Arc<dyn Clock>,
    config: AppConfig,
    parser: CommandParser,
    session: Arc<ProcessedLedger>,
    durable: Arc<ProcessedLedger>,
    lane: UiLane,
    gacha_gate: BusyGate,
    retractor: Arc<RetractScheduler>,
    paste: PasteSearch,
    relocator: Relocator,
    poster: Arc<ChatPoster>,
    monsters: Arc<Catalog>,
    gacha_items: Arc<Catalog>,
}

impl Engine {
    /// 持久账本文件在 `<data_dir>/<durable_file>`，启动时加载
    pub fn new(
        ui: Arc<dyn UiAdapter>,
        clock: Arc<dyn Clock>,
        config: AppConfig,
        monsters: Arc<Catalog>,
        gacha_items: Arc<Catalog>,
    ) -> Result<Self, EngineError> {
        let dedup = &config.dedup;
        let session = ProcessedLedger::session(
            secs_to_ms(dedup.session_ttl_secs),
            dedup.session_max_entries,
            clock.clone(),
        );
        let durable_path = config.app.data_dir().join(&dedup.durable_file);
        let durable = ProcessedLedger::durable(
            secs_to_ms(dedup.durable_ttl_secs),
            dedup.durable_max_entries,
            LedgerFile::new(durable_path),
            clock.clone(),
        )?;

        let lane = UiLane::new();
        let timing = config.timing.clone();
        Ok(Self {
            parser: CommandParser::new(config.call.max_count),
            session: Arc::new(session),
            durable: Arc::new(durable),
            gacha_gate: BusyGate::new("gacha"),
            retractor: Arc::new(RetractScheduler::new(ui.clone(), lane.clone(), timing.clone())),
            paste: PasteSearch::new(ui.clone(), timing.clone()),
            relocator: Relocator::new(ui.clone(), timing.clone()),
            poster: Arc::new(ChatPoster::new(
                ui.clone(),
                lane.clone(),
                Duration::from_millis(timing.reply_cooldown_ms),
            )),
            lane,
            ui,
            clock,
            config,
            monsters,
            gacha_items,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session_ledger(&self) -> Arc<ProcessedLedger> {
        self.session.clone()
    }

    pub fn durable_ledger(&self) -> Arc<ProcessedLedger> {
        self.durable.clone()
    }

    pub fn lane(&self) -> &UiLane {
        &self.lane
    }

    fn ledger_for(&self, dialect: Dialect) -> &ProcessedLedger {
        if dialect.durable() {
            &self.durable
        } else {
            &self.session
        }
    }

    fn retract_delay(&self, dialect: Dialect) -> Duration {
        let ms = match dialect {
            Dialect::ExecuteScript => self.config.timing.execute_retract_delay_ms,
            _ => self.config.timing.retract_delay_ms,
        };
        Duration::from_millis(ms)
    }

    /// 处理一条聊天事件
    pub fn handle(self: &Arc<Self>, event: ChatEvent) -> Dispatch {
        let Some(dialect) = crate::command::detect(&event.body) else {
            return Dispatch::Ignored(IgnoreReason::NotACommand);
        };
        if !is_current_minute(event.time_label.as_deref(), self.clock.as_ref()) {
            tracing::trace!(dialect = %dialect, node = %event.node, "Outside current minute, skipped");
            return Dispatch::Ignored(IgnoreReason::StaleMinute);
        }

        let key = fingerprint(&event);
        let ledger = self.ledger_for(dialect);
        if ledger.is_processed(key.as_str()) {
            tracing::debug!(dialect = %dialect, fingerprint = %key, ledger = ledger.name(), "Already processed");
            return Dispatch::Ignored(IgnoreReason::AlreadyProcessed);
        }
        if let Err(e) = ledger.mark_processed(key.as_str()) {
            // 内存中已记录，只是没能写盘
            tracing::error!(ledger = ledger.name(), error = %e, "Failed to persist processed ledger");
        }

        let outcome = self.parser.parse_as(dialect, &event.body, &event.speaker);

        // 重量流程在派生任务前抢闸门，并发的第二次直接拒绝
        let gacha_permit = match &outcome {
            ParseOutcome::Command(Command::GachaRoll(_)) => match self.gacha_gate.try_enter() {
                Some(permit) => Some(permit),
                None => {
                    let err = EngineError::Busy(self.gacha_gate.name());
                    tracing::warn!(dialect = %dialect, error = %err, "Command rejected");
                    return Dispatch::Ignored(IgnoreReason::Busy);
                }
            },
            _ => None,
        };

        let retraction = if dialect.retracts() {
            self.retractor.schedule(event.node.clone(), self.retract_delay(dialect))
        } else {
            None
        };

        let task = match outcome {
            ParseOutcome::Command(command) => {
                tracing::info!(dialect = %dialect, speaker = %event.speaker, "Command accepted");
                Some(self.spawn_command(command, gacha_permit))
            }
            ParseOutcome::NoMatch => {
                tracing::debug!(dialect = %dialect, "Command syntax did not match");
                None
            }
            ParseOutcome::Invalid { reason, .. } => {
                tracing::warn!(dialect = %dialect, reason = %reason, body = %event.body, "Invalid command");
                None
            }
        };

        Dispatch::Accepted {
            dialect,
            task,
            retraction,
        }
    }

    fn spawn_command(self: &Arc<Self>, command: Command, permit: Option<BusyPermit>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let dialect = command.dialect();
            let result = this.execute(command).await;
            drop(permit);
            match result {
                Ok(()) => tracing::debug!(dialect = %dialect, "Command finished"),
                Err(e) if e.is_expected() => tracing::warn!(dialect = %dialect, error = %e, "Command ended early"),
                Err(e) => tracing::error!(dialect = %dialect, error = %e, "Command failed"),
            }
        })
    }

    /// 按指令类型分派
    pub async fn execute(&self, command: Command) -> Result<(), EngineError> {
        match command {
            Command::Call(cmd) => self.run_call(cmd).await,
            Command::Move(cmd) => self.run_move(cmd).await,
            Command::Curse(cmd) => self.run_curse(cmd).await,
            Command::ExecuteScript(script) => self.run_script(script).await,
            Command::GachaRoll(cmd) => self.run_gacha(cmd).await,
            Command::AddDamage(cmd) => self.run_damage(cmd).await,
        }
    }

    /// 消费事件直到通道关闭或收到取消
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<ChatEvent>, token: CancellationToken) {
        tracing::info!("Engine started");
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Engine stopping (cancelled)");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        let _ = self.handle(event);
                    }
                    None => {
                        tracing::info!("Engine stopping (event source closed)");
                        break;
                    }
                }
            }
        }
    }
}

fn secs_to_ms(secs: u64) -> i64 {
    i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX)
}
