//! UI 动作执行：贴入、带身份校验的移动、聊天发帖
//!
//! 所有等待都通过 core::poll_until，有界且可配置。

pub mod paste;
pub mod poster;
pub mod relocation;

pub use paste::{CandidatePoint, PasteSearch, CANDIDATE_FRACTIONS};
pub use poster::ChatPoster;
pub use relocation::{format_coord, locate_piece, Placement, Relocator, CENTER_FACTOR};
