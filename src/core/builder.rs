use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::debug;

use crate::core::alias_engine::CanonicalField;
use crate::core::resolver::resolve;
use crate::models::instruction::Instruction;

/// 提问中出现这些词时按金额统计
const PRICE_CUES: [&str; 4] = ["revenue", "price", "amount", "$"];

/// 透传已有指令，或根据提问和列集合构造默认的聚合指令
///
/// 只做关键词匹配，不是语义理解；列不存在时照样给出默认列名，由执行阶段报错。
pub fn build_or_validate(
    question: Option<&str>,
    raw: Option<&Value>,
    schema: &HashSet<String>,
) -> Instruction {
    if let Some(instr) = resolve(raw, &Map::new()) {
        if instr.operation.as_deref().is_some_and(|op| !op.is_empty()) {
            debug!("透传已有指令");
            return instr;
        }
    }

    let q = question.unwrap_or_default().to_lowercase();
    let location = CanonicalField::Location.as_str();

    let group_by = if q.contains(location) && schema.contains(location) {
        location
    } else {
        CanonicalField::ProductId.as_str()
    };

    let metric = if PRICE_CUES.iter().any(|cue| q.contains(cue)) {
        CanonicalField::ActualPrice
    } else {
        CanonicalField::ActualQuantity
    };

    debug!(group_by, metric = metric.as_str(), "按提问构造默认指令");
    Instruction::aggregate(group_by, metric.as_str(), "sum")
}
