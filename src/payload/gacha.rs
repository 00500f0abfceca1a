//! 扭蛋道具 → 棋子 JSON

use serde_json::{json, Number, Value};

use super::SpawnPayload;

const RULE: &str = "_______________________________________________________";
const DEFAULT_ITEM_NAME: &str = "アイテム";

fn field_text(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn normalize_newlines(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}

fn hyphen_if_empty(s: &str) -> String {
    let s = s.trim();
    if s.is_empty() {
        "-".to_string()
    } else {
        s.to_string()
    }
}

/// 道具卡的 memo：编号、所有者、消耗 / 发动 / 判定、效果、特殊处理（可选）、风味文
pub fn build_gacha_memo(item: &Value, owner: &str) -> String {
    let block = |key: &str| hyphen_if_empty(&normalize_newlines(&field_text(item, key)));
    let special = normalize_newlines(&field_text(item, "special")).trim().to_string();

    let mut lines = vec![
        format!("🔷ItemID：{}", field_text(item, "id")),
        format!("🔷所有者：{owner}"),
        RULE.to_string(),
        format!("【コスト】{}", block("cost")),
        format!("【発動】{}", block("trigger")),
        format!("【判定】{}", block("check")),
        RULE.to_string(),
        "【効果】".to_string(),
        block("effect"),
    ];
    if !special.is_empty() {
        lines.push(String::new());
        lines.push("★特殊処理".to_string());
        lines.push(special);
    }
    lines.push(RULE.to_string());
    lines.push(block("flavor"));
    lines.join("\n")
}

/// 以道具自带的 ccfoliaPaste 为底稿，覆盖名称、memo、尺寸并清空状态
pub fn build_gacha_piece(
    item: &Value,
    owner: &str,
    rarity: u8,
    token_size: u32,
) -> Result<SpawnPayload, serde_json::Error> {
    let mut base = match item.get("ccfoliaPaste") {
        Some(paste @ Value::Object(_)) => paste.clone(),
        _ => json!({ "kind": "character", "data": {} }),
    };
    if let Some(map) = base.as_object_mut() {
        if !map.get("data").is_some_and(Value::is_object) {
            map.insert("data".into(), json!({}));
        }
        if !map.get("kind").and_then(Value::as_str).is_some_and(|k| !k.is_empty()) {
            map.insert("kind".into(), json!("character"));
        }
    }
    let mut payload = SpawnPayload::from_record(&base)?;
    let data = &mut payload.data;

    let raw_name = match item.get("name") {
        Some(v) if !v.is_null() => field_text(item, "name"),
        _ if !data.name.is_empty() => data.name.clone(),
        _ => DEFAULT_ITEM_NAME.to_string(),
    };
    data.name = format!("【★{rarity}】{raw_name}");
    data.memo = Some(build_gacha_memo(item, owner));

    let icon = field_text(item, "imageUrl").trim().to_string();
    data.icon_url = (!icon.is_empty()).then_some(icon);

    data.width = Some(Number::from(token_size));
    data.height = Some(Number::from(token_size));
    data.hide_status = Some(true);
    data.status = Some(Vec::new());
    data.params = Some(Vec::new());
    data.commands = Some(String::new());
    data.initiative.get_or_insert_with(|| Number::from(0));
    data.external_url.get_or_insert_with(String::new);

    Ok(payload)
}
