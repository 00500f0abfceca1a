//! 贴入用的棋子 JSON
//!
//! 宿主通过剪贴板接受 `{ "kind": "character", "data": { … } }`。这里只为会被改写的字段建类型，
//! 其余字段放在 flatten 的 extra 里原样带回，保证往返不丢字段。

pub mod gacha;
pub mod shards;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

pub use gacha::{build_gacha_memo, build_gacha_piece};
pub use shards::{apply_sword_shards, shard_resist_bonus};

fn default_kind() -> String {
    "character".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnPayload {
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub data: PieceData,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceData {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiative: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Vec<StatusEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<ParamEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_status: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 状态条（HP1 / MP1 …），value 与 max 在数据库里通常是字符串
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 参数（生命抵抗力 …）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamEntry {
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SpawnPayload {
    pub fn from_record(record: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(record.clone())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// 按 parseInt 的方式取前导整数：`"12"`、`"12点"`、`12` 都得到 12
pub fn leading_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim_start();
            let end = s
                .char_indices()
                .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
                .map(|(i, _)| i)
                .unwrap_or(s.len());
            s[..end].parse().ok()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_fields_survive_roundtrip() {
        let record = json!({
            "kind": "character",
            "data": {
                "name": "Goblin",
                "color": "#888",
                "status": [{"label": "HP1", "value": "12", "max": "12", "hidden": false}],
                "faces": [{"iconUrl": "x"}]
            },
            "meta": {"source": "db"}
        });
        let payload = SpawnPayload::from_record(&record).unwrap();
        assert_eq!(payload.data.name, "Goblin");
        let back: Value = serde_json::from_str(&payload.to_json().unwrap()).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_missing_kind_defaults() {
        let payload = SpawnPayload::from_record(&json!({"data": {"name": "x"}})).unwrap();
        assert_eq!(payload.kind, "character");
    }

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int(&json!("12")), Some(12));
        assert_eq!(leading_int(&json!(" 7点")), Some(7));
        assert_eq!(leading_int(&json!("-3")), Some(-3));
        assert_eq!(leading_int(&json!(4)), Some(4));
        assert_eq!(leading_int(&json!("abc")), None);
        assert_eq!(leading_int(&Value::Null), None);
    }
}
