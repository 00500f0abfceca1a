//! 远端拉取与形状校验
//!
//! 接受裸数组或 `{ "items": [...] }`；其他形状或空集合一律视为失败。

use std::time::Duration;

use reqwest::header::CACHE_CONTROL;
use serde_json::Value;

use super::CatalogError;

/// 从 JSON 中取出记录数组，顺带返回数据源自报的版本
pub fn extract_records(json: Value) -> Result<(Vec<Value>, Option<Value>), CatalogError> {
    let (records, version) = match json {
        Value::Array(items) => (items, None),
        Value::Object(mut map) => {
            let version = map.remove("version");
            match map.remove("items") {
                Some(Value::Array(items)) => (items, version),
                Some(_) => return Err(CatalogError::Shape("'items' is not an array".into())),
                None => return Err(CatalogError::Shape("object without 'items'".into())),
            }
        }
        _ => return Err(CatalogError::Shape("expected an array or an object".into())),
    };
    if records.is_empty() {
        return Err(CatalogError::Empty);
    }
    Ok((records, version))
}

pub struct CatalogFetcher {
    client: reqwest::Client,
}

impl CatalogFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// GET（禁用缓存，附加 `_=<ms>`），返回记录与自报版本
    pub async fn fetch(&self, url: &str, now_ms: i64) -> Result<(Vec<Value>, Option<Value>), CatalogError> {
        tracing::info!(url, "Fetching catalog");
        let json: Value = self
            .client
            .get(url)
            .query(&[("_", now_ms.to_string())])
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        extract_records(json)
    }
}
