//! 引擎错误类型
//!
//! 解析失败（NoMatch / Invalid）不是错误，而是 `ParseOutcome`；这里只收录指令执行期间的失败。
//! 每个指令任务在顶层捕获 EngineError 并写日志，不会影响其它在途任务。

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::dedup::LedgerError;
use crate::ui::UiError;

/// 指令执行过程中可能出现的错误（查找不到、UI 元素缺失、身份校验失败等）
#[derive(Error, Debug)]
pub enum EngineError {
    /// 指令引用的名字不在目录中，视同「无数据」安静结束
    #[error("Lookup miss: {0}")]
    LookupMiss(String),

    /// 有界重试内找不到目标元素（菜单项、对话框、输入框……）
    #[error("UI element not found: {0}")]
    UiElementNotFound(String),

    /// 候选坐标全部试完仍未出现「貼り付け」
    #[error("Paste target not found after {attempts} candidate points")]
    PasteTargetNotFound { attempts: usize },

    /// 打开的棋子与目标名字不一致
    #[error("Identity mismatch: expected '{expected}', opened '{found}'")]
    IdentityMismatch { expected: String, found: String },

    /// 对话框里读不到名字，无法确认身份
    #[error("Identity unverifiable for '{0}'")]
    IdentityUnverifiable(String),

    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// 同类重量流程正在执行
    #[error("Busy: {0}")]
    Busy(&'static str),

    #[error("Clipboard write failed: {0}")]
    Clipboard(String),

    #[error("UI adapter error: {0}")]
    Ui(#[from] UiError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] LedgerError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// 预期内的「没做成」：目录缺项、忙碌、身份不符等，按 warn 记录；其余按 error 记录
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            EngineError::LookupMiss(_)
                | EngineError::Busy(_)
                | EngineError::IdentityMismatch { .. }
                | EngineError::IdentityUnverifiable(_)
                | EngineError::UiElementNotFound(_)
                | EngineError::PasteTargetNotFound { .. }
                | EngineError::CatalogUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_classification() {
        assert!(EngineError::LookupMiss("Goblin".into()).is_expected());
        assert!(EngineError::Busy("gacha").is_expected());
        assert!(!EngineError::Clipboard("denied".into()).is_expected());
        assert!(!EngineError::Ui(UiError::Disconnected).is_expected());
    }

    #[test]
    fn test_mismatch_message_names_both_sides() {
        let err = EngineError::IdentityMismatch {
            expected: "GoblinA".into(),
            found: "GoblinB".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("GoblinA"));
        assert!(msg.contains("GoblinB"));
    }
}
