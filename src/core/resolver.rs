use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::debug;

use crate::models::instruction::{Instruction, INSTRUCTION_KEYS};

// 贪婪匹配，跨行：第一个 `{` 到最后一个 `}`
static EMBEDDED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("embedded JSON pattern"));

/// 从结构化对象、内嵌 JSON 的文本或扁平参数中提取指令。
///
/// 优先级：结构化对象 > 文本中的 JSON (最多解开一层 `instruction`) > 扁平参数 >
/// 扁平参数里的 `instruction` 值。都不满足时返回 `None`，由调用方决定后续处理。
/// 这里只提取结构，不校验操作语义。
pub fn resolve(raw: Option<&Value>, flat: &Map<String, Value>) -> Option<Instruction> {
    if let Some(found) = raw.and_then(resolve_raw) {
        return Some(found);
    }

    let present: Map<String, Value> = INSTRUCTION_KEYS
        .iter()
        .filter_map(|key| {
            flat.get(*key)
                .filter(|v| !v.is_null())
                .map(|v| (key.to_string(), v.clone()))
        })
        .collect();
    if !present.is_empty() {
        debug!("使用扁平参数构造指令: {:?}", present.keys().collect::<Vec<_>>());
        return Some(Instruction::from_map(&present));
    }

    match flat.get("instruction") {
        Some(inner) if !inner.is_null() => resolve(Some(inner), &Map::new()),
        _ => None,
    }
}

fn resolve_raw(raw: &Value) -> Option<Instruction> {
    match raw {
        Value::Object(map) => Some(Instruction::from_map(map)),
        Value::String(text) => resolve_text(text),
        _ => None,
    }
}

fn resolve_text(text: &str) -> Option<Instruction> {
    let found = EMBEDDED_JSON.find(text.trim())?;
    let parsed = match serde_json::from_str::<Value>(found.as_str()) {
        Ok(Value::Object(map)) => map,
        Ok(_) => return None,
        Err(e) => {
            debug!("文本中的 JSON 无法解析，忽略: {}", e);
            return None;
        }
    };

    match parsed.get("instruction") {
        Some(Value::Object(inner)) => return Some(Instruction::from_map(inner)),
        Some(Value::String(inner)) => match serde_json::from_str::<Value>(inner) {
            Ok(Value::Object(map)) => return Some(Instruction::from_map(&map)),
            Ok(_) => return None,
            Err(e) => debug!("内层 instruction 不是合法 JSON，使用外层对象: {}", e),
        },
        _ => {}
    }
    Some(Instruction::from_map(&parsed))
}
