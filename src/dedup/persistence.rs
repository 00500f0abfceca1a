//! 持久账本文件
//!
//! 单个 JSON 对象：指纹 → 最后一次见到的 Unix 毫秒。进程重启后重新加载，
//! 避免重量指令（召唤、宏、抽卡）在刷新页面后被重复执行。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::LedgerError;

#[derive(Debug, Clone)]
pub struct LedgerFile {
    path: PathBuf,
}

impl LedgerFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 文件不存在时返回空表；内容损坏时同样返回空表并记 warn，不阻止启动
    pub fn load(&self) -> Result<HashMap<String, i64>, LedgerError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let data = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str::<HashMap<String, i64>>(&data) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Processed ledger unreadable, starting empty");
                Ok(HashMap::new())
            }
        }
    }

    /// 写入 JSON；父目录不存在时自动创建
    pub fn save(&self, entries: &HashMap<String, i64>) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string(entries)?)?;
        Ok(())
    }
}
