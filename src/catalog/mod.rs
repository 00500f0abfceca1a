//! 只读目录：魔物数据库、扭蛋道具库
//!
//! ensure_ready 只会真正执行一次（OnceCell）：优先用本地缓存，缓存不可用时从远端拉取并写回缓存。
//! 加载失败后目录保持不可用，查询一律返回 None，不自动重试。
//! 就绪之后的查询都是同步的。

pub mod cache;
pub mod fetch;

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::OnceCell;

pub use cache::{CacheMeta, CatalogCache, ENGINE_VERSION};
pub use fetch::{extract_records, CatalogFetcher};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected catalog shape: {0}")]
    Shape(String),

    #[error("Catalog is empty")]
    Empty,
}

/// 目录的来源与索引方式
#[derive(Debug, Clone)]
pub struct CatalogSpec {
    pub name: String,
    pub url: String,
    /// 按该字段分桶（扭蛋按 rarity）
    pub bucket_field: Option<String>,
    pub timeout: Duration,
}

/// 就绪后的只读索引
#[derive(Debug, Default)]
pub struct CatalogIndex {
    records: Vec<Value>,
    by_name: HashMap<String, usize>,
    buckets: HashMap<String, Vec<usize>>,
}

/// 记录名：优先 data.name，其次顶层 name
pub fn record_name(record: &Value) -> Option<&str> {
    record
        .get("data")
        .and_then(|d| d.get("name"))
        .and_then(Value::as_str)
        .or_else(|| record.get("name").and_then(Value::as_str))
}

/// 桶键：数字取整数形式，字符串去空白
fn bucket_key(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(|i| i.to_string())
            .or_else(|| n.as_f64().map(|f| f.to_string())),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

impl CatalogIndex {
    pub fn build(records: Vec<Value>, bucket_field: Option<&str>) -> Self {
        let mut by_name = HashMap::new();
        let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            if let Some(name) = record_name(record) {
                // 同名取第一条
                by_name.entry(name.to_string()).or_insert(i);
            }
            if let Some(key) = bucket_field.and_then(|f| record.get(f)).and_then(bucket_key) {
                buckets.entry(key).or_default().push(i);
            }
        }
        Self {
            records,
            by_name,
            buckets,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn bucket_len(&self, key: &str) -> usize {
        self.buckets.get(key).map(Vec::len).unwrap_or(0)
    }
}

pub struct Catalog {
    spec: CatalogSpec,
    cache: CatalogCache,
    fetcher: CatalogFetcher,
    ready: OnceCell<Option<CatalogIndex>>,
}

impl Catalog {
    pub fn new(spec: CatalogSpec, cache_dir: impl AsRef<Path>) -> Self {
        let cache = CatalogCache::new(cache_dir, &spec.name);
        let fetcher = CatalogFetcher::new(spec.timeout);
        Self {
            spec,
            cache,
            fetcher,
            ready: OnceCell::new(),
        }
    }

    /// 直接用给定记录构建（离线演练与测试）
    pub fn preloaded(name: &str, records: Vec<Value>, bucket_field: Option<&str>) -> Self {
        let spec = CatalogSpec {
            name: name.to_string(),
            url: String::new(),
            bucket_field: bucket_field.map(str::to_string),
            timeout: Duration::from_secs(1),
        };
        let index = if records.is_empty() {
            None
        } else {
            Some(CatalogIndex::build(records, bucket_field))
        };
        let catalog = Self::new(spec, std::env::temp_dir());
        let _ = catalog.ready.set(index);
        catalog
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// 加载一次；之后的调用直接返回同一结果
    pub async fn ensure_ready(&self) -> bool {
        self.ready
            .get_or_init(|| async {
                match self.load().await {
                    Ok(index) => {
                        tracing::info!(catalog = %self.spec.name, records = index.len(), "Catalog ready");
                        Some(index)
                    }
                    Err(e) => {
                        tracing::error!(catalog = %self.spec.name, error = %e, "Catalog unavailable");
                        None
                    }
                }
            })
            .await
            .is_some()
    }

    async fn load(&self) -> Result<CatalogIndex, CatalogError> {
        let bucket_field = self.spec.bucket_field.as_deref();
        match self.cache.load() {
            Ok(Some((records, meta))) => {
                tracing::debug!(catalog = %self.spec.name, saved_at_ms = meta.saved_at_ms, "Catalog loaded from cache");
                return Ok(CatalogIndex::build(records, bucket_field));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(catalog = %self.spec.name, error = %e, "Catalog cache unreadable, refetching"),
        }

        let now_ms = chrono::Utc::now().timestamp_millis();
        let (records, declared_version) = self.fetcher.fetch(&self.spec.url, now_ms).await?;
        if let Err(e) = self.cache.save(&records, declared_version, now_ms) {
            tracing::warn!(catalog = %self.spec.name, error = %e, "Failed to write catalog cache");
        }
        Ok(CatalogIndex::build(records, bucket_field))
    }

    fn index(&self) -> Option<&CatalogIndex> {
        self.ready.get().and_then(Option::as_ref)
    }

    pub fn is_ready(&self) -> bool {
        self.index().is_some()
    }

    pub fn find_by_exact_name(&self, name: &str) -> Option<&Value> {
        let index = self.index()?;
        index.by_name.get(name).map(|&i| &index.records[i])
    }

    pub fn bucket_len(&self, key: &str) -> usize {
        self.index().map(|i| i.bucket_len(key)).unwrap_or(0)
    }

    pub fn pick_random_by_bucket<R: Rng + ?Sized>(&self, key: &str, rng: &mut R) -> Option<&Value> {
        let index = self.index()?;
        let bucket = index.buckets.get(key)?;
        if bucket.is_empty() {
            return None;
        }
        let i = bucket[rng.gen_range(0..bucket.len())];
        index.records.get(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    #[tokio::test]
    async fn test_preloaded_lookup_prefers_data_name() {
        let catalog = Catalog::preloaded(
            "monsters",
            vec![
                json!({"name": "outer", "data": {"name": "Goblin"}}),
                json!({"name": "Kobold"}),
            ],
            None,
        );
        assert!(catalog.ensure_ready().await);
        assert!(catalog.find_by_exact_name("Goblin").is_some());
        assert!(catalog.find_by_exact_name("outer").is_none());
        assert!(catalog.find_by_exact_name("Kobold").is_some());
        assert!(catalog.find_by_exact_name("goblin").is_none());
    }

    #[tokio::test]
    async fn test_buckets() {
        let catalog = Catalog::preloaded(
            "gacha",
            vec![
                json!({"name": "a", "rarity": 1}),
                json!({"name": "b", "rarity": "1"}),
                json!({"name": "c", "rarity": 3}),
            ],
            Some("rarity"),
        );
        assert_eq!(catalog.bucket_len("1"), 2);
        assert_eq!(catalog.bucket_len("2"), 0);
        let mut rng = StdRng::seed_from_u64(7);
        let picked = catalog.pick_random_by_bucket("3", &mut rng).unwrap();
        assert_eq!(picked["name"], "c");
        assert!(catalog.pick_random_by_bucket("2", &mut rng).is_none());
    }

    #[tokio::test]
    async fn test_empty_preload_is_unavailable() {
        let catalog = Catalog::preloaded("monsters", Vec::new(), None);
        assert!(!catalog.ensure_ready().await);
        assert!(catalog.find_by_exact_name("Goblin").is_none());
    }

    #[tokio::test]
    async fn test_loads_from_cache_without_network() {
        let dir = tempfile::tempdir().unwrap();
        CatalogCache::new(dir.path(), "monsters")
            .save(&[json!({"data": {"name": "Goblin"}})], None, 1)
            .unwrap();
        let spec = CatalogSpec {
            name: "monsters".into(),
            url: "http://127.0.0.1:9/unreachable.json".into(),
            bucket_field: None,
            timeout: Duration::from_millis(200),
        };
        let catalog = Catalog::new(spec, dir.path());
        assert!(catalog.ensure_ready().await);
        assert!(catalog.find_by_exact_name("Goblin").is_some());
    }

    #[tokio::test]
    async fn test_fetch_failure_without_cache() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CatalogSpec {
            name: "monsters".into(),
            url: "http://127.0.0.1:9/unreachable.json".into(),
            bucket_field: None,
            timeout: Duration::from_millis(200),
        };
        let catalog = Catalog::new(spec, dir.path());
        assert!(!catalog.ensure_ready().await);
        assert!(!catalog.ensure_ready().await);
        assert!(!catalog.is_ready());
    }
}
