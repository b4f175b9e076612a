use serde::Serialize;
use serde_json::{Map, Value};

/// 可以通过扁平参数传入的指令字段
pub const INSTRUCTION_KEYS: [&str; 5] = ["operation", "group_by", "metric", "agg_func", "condition"];

/// 查询指令 (线协议为 JSON 对象)
///
/// 字段在解析阶段不做语义校验，缺失或为空的字段由执行器给出具体的错误文本。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Instruction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agg_func: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Missing,
    Filter,
    Aggregate,
    FilterSum,
    Unsupported(String),
}

impl Operation {
    /// 去掉首尾空白并转小写后再匹配
    pub fn parse(raw: &str) -> Self {
        let op = raw.trim().to_lowercase();
        match op.as_str() {
            "" => Operation::Missing,
            "filter" => Operation::Filter,
            "aggregate" => Operation::Aggregate,
            "filter_sum" => Operation::FilterSum,
            _ => Operation::Unsupported(op),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Sum,
    Mean,
    Count,
}

impl AggFunc {
    /// 缺省为 sum；只做小写化，不去空白
    pub fn parse(raw: Option<&str>) -> Result<Self, String> {
        let agg = raw.filter(|s| !s.is_empty()).unwrap_or("sum").to_lowercase();
        match agg.as_str() {
            "sum" => Ok(AggFunc::Sum),
            "mean" => Ok(AggFunc::Mean),
            "count" => Ok(AggFunc::Count),
            _ => Err(agg),
        }
    }
}

impl Instruction {
    /// 从任意 JSON 对象提取指令字段，数字和布尔值按文本处理，其余类型视为缺失
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let field = |key: &str| map.get(key).and_then(scalar_text);
        Self {
            operation: field("operation"),
            condition: field("condition"),
            group_by: field("group_by"),
            metric: field("metric"),
            agg_func: field("agg_func"),
        }
    }

    pub fn aggregate(group_by: &str, metric: &str, agg_func: &str) -> Self {
        Self {
            operation: Some("aggregate".to_string()),
            condition: None,
            group_by: Some(group_by.to_string()),
            metric: Some(metric.to_string()),
            agg_func: Some(agg_func.to_string()),
        }
    }

    pub fn operation(&self) -> Operation {
        Operation::parse(self.operation.as_deref().unwrap_or_default())
    }

    pub fn agg_func(&self) -> Result<AggFunc, String> {
        AggFunc::parse(self.agg_func.as_deref())
    }

    /// 紧凑 JSON 形式，例如 `{"operation":"aggregate","group_by":"product_id",...}`
    pub fn to_compact_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
