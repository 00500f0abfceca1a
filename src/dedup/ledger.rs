//! 已处理账本
//!
//! 指纹 → 最后见到的毫秒时间。裁剪规则：先删掉超过 TTL 的条目，
//! 再按最后见到时间从旧到新淘汰，直到条目数不超过上限。
//! 会话账本只在内存里；持久账本每次标记后写回文件。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{LedgerError, LedgerFile};
use crate::core::Clock;

pub struct ProcessedLedger {
    name: &'static str,
    ttl_ms: i64,
    max_entries: usize,
    entries: Mutex<HashMap<String, i64>>,
    file: Option<LedgerFile>,
    clock: Arc<dyn Clock>,
}

impl ProcessedLedger {
    /// 内存账本（生命周期与引擎进程相同）
    pub fn session(ttl_ms: i64, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: "session",
            ttl_ms,
            max_entries,
            entries: Mutex::new(HashMap::new()),
            file: None,
            clock,
        }
    }

    /// 文件账本：启动时加载并立即裁剪
    pub fn durable(
        ttl_ms: i64,
        max_entries: usize,
        file: LedgerFile,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LedgerError> {
        let loaded = file.load()?;
        let ledger = Self {
            name: "durable",
            ttl_ms,
            max_entries,
            entries: Mutex::new(loaded),
            file: Some(file),
            clock,
        };
        ledger.prune();
        tracing::debug!(ledger = ledger.name, entries = ledger.len(), "Processed ledger loaded");
        Ok(ledger)
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// TTL 内见过即视为已处理
    pub fn is_processed(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        match self.entries().get(key) {
            Some(&seen) => now - seen <= self.ttl_ms,
            None => false,
        }
    }

    /// 记录并裁剪；持久账本同时写回文件
    pub fn mark_processed(&self, key: &str) -> Result<(), LedgerError> {
        let now = self.clock.now_ms();
        {
            let mut entries = self.entries();
            entries.insert(key.to_string(), now);
            Self::prune_locked(&mut entries, now, self.ttl_ms, self.max_entries);
        }
        self.persist()
    }

    pub fn prune(&self) {
        let now = self.clock.now_ms();
        let mut entries = self.entries();
        Self::prune_locked(&mut entries, now, self.ttl_ms, self.max_entries);
    }

    /// 裁剪后写回文件（内存账本无操作）
    pub fn flush(&self) -> Result<(), LedgerError> {
        self.prune();
        self.persist()
    }

    fn persist(&self) -> Result<(), LedgerError> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        let snapshot = self.entries().clone();
        file.save(&snapshot)
    }

    fn prune_locked(entries: &mut HashMap<String, i64>, now: i64, ttl_ms: i64, max_entries: usize) {
        entries.retain(|_, seen| now - *seen <= ttl_ms);
        if entries.len() <= max_entries {
            return;
        }
        let mut by_age: Vec<(String, i64)> = entries.iter().map(|(k, v)| (k.clone(), *v)).collect();
        by_age.sort_by_key(|(_, seen)| *seen);
        let excess = entries.len() - max_entries;
        for (key, _) in by_age.into_iter().take(excess) {
            entries.remove(&key);
        }
    }
}
