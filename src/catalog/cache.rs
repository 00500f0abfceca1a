//! 目录本地缓存
//!
//! `<dir>/<name>.json` 保存记录数组，`<dir>/<name>.meta.json` 保存元数据。
//! 只有 engine_version 与当前程序版本一致的缓存才会被使用。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::CatalogError;

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub saved_at_ms: i64,
    pub engine_version: String,
    /// 数据源自报的版本（`{ "version": … }`），没有则为 null
    pub declared_version: Option<Value>,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct CatalogCache {
    dir: PathBuf,
    name: String,
}

impl CatalogCache {
    pub fn new(dir: impl AsRef<Path>, name: &str) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            name: name.to_string(),
        }
    }

    pub fn data_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.name))
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(format!("{}.meta.json", self.name))
    }

    /// 读取可用的缓存；不存在、版本不符或内容为空都返回 None
    pub fn load(&self) -> Result<Option<(Vec<Value>, CacheMeta)>, CatalogError> {
        let (data_path, meta_path) = (self.data_path(), self.meta_path());
        if !data_path.exists() || !meta_path.exists() {
            return Ok(None);
        }
        let meta: CacheMeta = serde_json::from_str(&std::fs::read_to_string(&meta_path)?)?;
        if meta.engine_version != ENGINE_VERSION {
            tracing::info!(
                catalog = %self.name,
                cached = %meta.engine_version,
                current = ENGINE_VERSION,
                "Catalog cache written by another engine version, ignoring"
            );
            return Ok(None);
        }
        let records: Vec<Value> = serde_json::from_str(&std::fs::read_to_string(&data_path)?)?;
        if records.is_empty() {
            return Ok(None);
        }
        Ok(Some((records, meta)))
    }

    pub fn save(&self, records: &[Value], declared_version: Option<Value>, now_ms: i64) -> Result<CacheMeta, CatalogError> {
        std::fs::create_dir_all(&self.dir)?;
        let meta = CacheMeta {
            saved_at_ms: now_ms,
            engine_version: ENGINE_VERSION.to_string(),
            declared_version,
            count: records.len(),
        };
        std::fs::write(self.data_path(), serde_json::to_string(records)?)?;
        std::fs::write(self.meta_path(), serde_json::to_string_pretty(&meta)?)?;
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CatalogCache::new(dir.path(), "monsters");
        let records = vec![json!({"data": {"name": "Goblin"}})];
        cache.save(&records, Some(json!("v8")), 123).unwrap();

        let (loaded, meta) = cache.load().unwrap().unwrap();
        assert_eq!(loaded, records);
        assert_eq!(meta.count, 1);
        assert_eq!(meta.saved_at_ms, 123);
        assert_eq!(meta.declared_version, Some(json!("v8")));
        assert!(dir.path().join("monsters.meta.json").exists());
    }

    #[test]
    fn test_other_engine_version_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CatalogCache::new(dir.path(), "gacha");
        cache.save(&[json!({"name": "x"})], None, 1).unwrap();
        let stale = CacheMeta {
            saved_at_ms: 1,
            engine_version: "0.0.0-old".into(),
            declared_version: None,
            count: 1,
        };
        std::fs::write(cache.meta_path(), serde_json::to_string(&stale).unwrap()).unwrap();
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn test_missing_cache() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CatalogCache::new(dir.path(), "none").load().unwrap().is_none());
    }
}
