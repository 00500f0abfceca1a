//! 去重：事件指纹、分钟闸门、已处理账本（会话 / 持久）

pub mod fingerprint;
pub mod gate;
pub mod ledger;
pub mod persistence;

use thiserror::Error;

pub use fingerprint::{fingerprint, fingerprint_parts, normalize_ws, Fingerprint};
pub use gate::{is_current_minute, label_minute};
pub use ledger::ProcessedLedger;
pub use persistence::LedgerFile;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ledger encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}
