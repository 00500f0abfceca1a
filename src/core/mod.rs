//! 核心层：错误分类、有界重试、时钟、UI 车道、优雅关闭

pub mod clock;
pub mod error;
pub mod lane;
pub mod retry;
pub mod shutdown;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::EngineError;
pub use lane::{BusyGate, BusyPermit, LanePermit, UiLane};
pub use retry::{poll_until, RetryPolicy};
pub use shutdown::{LedgerFlush, ShutdownCleanup, ShutdownCoordinator, ShutdownManager, ShutdownReason};
