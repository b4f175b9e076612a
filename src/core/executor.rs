use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::core::condition::Condition;
use crate::core::resolver::resolve;
use crate::error::QueryError;
use crate::infra::table::{render_frame, render_series};
use crate::models::dataset::{format_number, Cell, Dataset};
use crate::models::instruction::{AggFunc, Instruction, Operation};

pub const NO_ROWS_MATCHED: &str = "No rows matched.";

/// 数据工具入口：先解析指令，再执行；所有结果 (包括错误) 都是文本
pub fn run_data_tool(raw: Option<&Value>, flat: &Map<String, Value>, dataset: &Dataset) -> String {
    match resolve(raw, flat) {
        Some(instr) => execute(&instr, dataset),
        None => {
            warn!("未能从输入中解析出指令");
            QueryError::NoInstruction.to_string()
        }
    }
}

/// 执行指令，不会 panic；失败时返回描述性错误文本
pub fn execute(instruction: &Instruction, dataset: &Dataset) -> String {
    match run(instruction, dataset) {
        Ok(out) => out,
        Err(e) => {
            warn!("指令执行失败: {}", e);
            e.to_string()
        }
    }
}

fn run(instruction: &Instruction, dataset: &Dataset) -> Result<String, QueryError> {
    let op = instruction.operation();
    debug!("执行操作: {:?}", op);
    match op {
        Operation::Missing => Err(QueryError::MissingOperation),
        Operation::Filter => filter(instruction, dataset),
        Operation::Aggregate => aggregate(instruction, dataset),
        Operation::FilterSum => filter_sum(instruction, dataset),
        Operation::Unsupported(op) => Err(QueryError::UnsupportedOperation(op)),
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

fn filter(instruction: &Instruction, dataset: &Dataset) -> Result<String, QueryError> {
    let condition = present(&instruction.condition).ok_or(QueryError::MissingField {
        operation: "filter",
        required: "'condition'",
    })?;

    let matched = Condition::parse(condition, dataset.columns())
        .and_then(|c| c.filter(dataset.rows()))
        .map_err(QueryError::FilterCondition)?;

    if matched.is_empty() {
        return Ok(NO_ROWS_MATCHED.to_string());
    }
    Ok(render_frame(dataset.columns(), &matched))
}

fn aggregate(instruction: &Instruction, dataset: &Dataset) -> Result<String, QueryError> {
    let (Some(group_by), Some(metric)) = (present(&instruction.group_by), present(&instruction.metric))
    else {
        return Err(QueryError::MissingField {
            operation: "aggregate",
            required: "'group_by' and 'metric'",
        });
    };
    let key_idx = dataset
        .column_index(group_by)
        .ok_or_else(|| QueryError::UnknownGroupBy(group_by.to_string()))?;
    let metric_idx = dataset
        .column_index(metric)
        .ok_or_else(|| QueryError::UnknownMetric(metric.to_string()))?;
    let agg = instruction
        .agg_func()
        .map_err(QueryError::UnsupportedAggregation)?;

    let mut groups = group_rows(dataset, key_idx, metric_idx);
    groups.sort_by(|a, b| group_key_order(&a.0, &b.0));

    let mut reduced: Vec<(String, f64)> = groups
        .into_iter()
        .map(|(key, values)| (key.to_string(), reduce(agg, &values)))
        .collect();
    // 稳定排序：值相同的组保持分组键顺序
    reduced.sort_by(|a, b| descending_nan_last(a.1, b.1));

    let entries: Vec<(String, String)> = reduced
        .into_iter()
        .map(|(key, value)| {
            let text = match agg {
                AggFunc::Count => format!("{}", value as u64),
                AggFunc::Sum | AggFunc::Mean => format_number(value),
            };
            (key, text)
        })
        .collect();

    Ok(render_series(group_by, &entries))
}

fn filter_sum(instruction: &Instruction, dataset: &Dataset) -> Result<String, QueryError> {
    let (Some(condition), Some(metric)) = (present(&instruction.condition), present(&instruction.metric))
    else {
        return Err(QueryError::MissingField {
            operation: "filter_sum",
            required: "'condition' and 'metric'",
        });
    };
    let metric_idx = dataset
        .column_index(metric)
        .ok_or_else(|| QueryError::UnknownMetric(metric.to_string()))?;

    // 条件在强制转换后的数据上求值
    let coerced = dataset.coerce_numeric(metric_idx);
    let matched = Condition::parse(condition, coerced.columns())
        .and_then(|c| c.filter(coerced.rows()))
        .map_err(QueryError::FilterSumCondition)?;

    let total: f64 = matched
        .iter()
        .filter_map(|row| row.get(metric_idx).and_then(Cell::as_number))
        .fold(0.0, |acc, v| acc + v);
    Ok(format_number(total))
}

/// 按分组键收集指标值 (无法解析的值记为 None)；空键单独成组
fn group_rows(dataset: &Dataset, key_idx: usize, metric_idx: usize) -> Vec<(Cell, Vec<Option<f64>>)> {
    let mut groups: Vec<(Cell, Vec<Option<f64>>)> = Vec::new();
    let mut positions: HashMap<Option<String>, usize> = HashMap::new();

    for row in dataset.rows() {
        let key = row.get(key_idx).cloned().unwrap_or(Cell::Null);
        let value = row.get(metric_idx).and_then(Cell::as_number);
        let identity = if key.is_null() { None } else { Some(key.to_string()) };

        let pos = *positions.entry(identity).or_insert_with(|| {
            groups.push((key, Vec::new()));
            groups.len() - 1
        });
        groups[pos].1.push(value);
    }
    groups
}

/// 分组键顺序：数值列按数值升序，否则按文本；空键排在最后
fn group_key_order(a: &Cell, b: &Cell) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) if a.is_numeric() && b.is_numeric() => a
            .as_number()
            .partial_cmp(&b.as_number())
            .unwrap_or(Ordering::Equal),
        (false, false) => a.to_string().cmp(&b.to_string()),
    }
}

/// count 只统计非缺失值；求和从 +0.0 起算，空组为 0.0
fn reduce(agg: AggFunc, values: &[Option<f64>]) -> f64 {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let total = present.iter().fold(0.0, |acc, v| acc + v);
    match agg {
        AggFunc::Sum => total,
        AggFunc::Mean if present.is_empty() => f64::NAN,
        AggFunc::Mean => total / present.len() as f64,
        AggFunc::Count => present.len() as f64,
    }
}

fn descending_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn dataset(columns: &[&str], rows: &[&[Option<&str>]]) -> Dataset {
        Dataset::from_raw(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| v.map(str::to_string)).collect())
                .collect(),
        )
    }

    fn sales() -> Dataset {
        dataset(
            &["location", "product_id", "actual_quantity", "actual_price"],
            &[
                &[Some("Lima"), Some("A"), Some("10"), Some("1.5")],
                &[Some("Quito"), Some("B"), Some("30"), Some("2")],
                &[Some("Lima"), Some("C"), Some("20"), Some("oops")],
            ],
        )
    }

    fn instr(value: serde_json::Value) -> Instruction {
        Instruction::from_map(value.as_object().unwrap())
    }

    #[test]
    fn missing_and_unsupported_operations() {
        let ds = sales();
        assert_eq!(
            execute(&instr(json!({})), &ds),
            "Error: missing 'operation' in instruction."
        );
        assert_eq!(
            execute(&instr(json!({"operation": "  "})), &ds),
            "Error: missing 'operation' in instruction."
        );
        assert_eq!(
            execute(&instr(json!({"operation": " Pivot "})), &ds),
            "Unsupported operation: pivot"
        );
    }

    #[test]
    fn aggregate_sorts_descending() {
        let out = execute(
            &instr(json!({"operation": "aggregate", "group_by": "product_id", "metric": "actual_quantity"})),
            &sales(),
        );
        assert_eq!(out, "product_id\nB    30.0\nC    20.0\nA    10.0");
    }

    #[test]
    fn aggregate_ties_keep_group_key_order() {
        let ds = dataset(
            &["product_id", "actual_quantity"],
            &[
                &[Some("Z"), Some("5")],
                &[Some("M"), Some("5")],
                &[Some("A"), Some("5")],
            ],
        );
        let out = execute(
            &instr(json!({"operation": "aggregate", "group_by": "product_id", "metric": "actual_quantity"})),
            &ds,
        );
        assert_eq!(out, "product_id\nA    5.0\nM    5.0\nZ    5.0");
    }

    #[test]
    fn aggregate_mean_and_count_skip_non_numeric() {
        let ds = sales();
        let mean = execute(
            &instr(json!({"operation": "aggregate", "group_by": "location", "metric": "actual_price", "agg_func": "mean"})),
            &ds,
        );
        assert_eq!(mean, "location\nQuito    2.0\nLima     1.5");

        let count = execute(
            &instr(json!({"operation": "aggregate", "group_by": "location", "metric": "actual_price", "agg_func": "COUNT"})),
            &ds,
        );
        assert_eq!(count, "location\nLima     1\nQuito    1");
    }

    #[test]
    fn group_without_numeric_values_sums_to_zero() {
        let ds = dataset(
            &["location", "actual_price"],
            &[
                &[Some("Lima"), Some("5")],
                &[Some("Quito"), Some("n/d")],
                &[Some("Quito"), None],
            ],
        );
        let out = execute(
            &instr(json!({"operation": "aggregate", "group_by": "location", "metric": "actual_price"})),
            &ds,
        );
        assert_eq!(out, "location\nLima     5.0\nQuito    0.0");
    }

    #[test]
    fn null_group_keys_form_their_own_group() {
        let ds = dataset(
            &["location", "actual_quantity"],
            &[
                &[Some("Lima"), Some("1")],
                &[None, Some("4")],
                &[None, Some("2")],
            ],
        );
        let out = execute(
            &instr(json!({"operation": "aggregate", "group_by": "location", "metric": "actual_quantity"})),
            &ds,
        );
        assert_eq!(out, "location\nNaN     6.0\nLima    1.0");
    }

    #[test]
    fn numeric_group_keys_order_numerically() {
        let ds = dataset(
            &["store", "actual_quantity"],
            &[&[Some("10"), Some("1")], &[Some("9"), Some("1")]],
        );
        let out = execute(
            &instr(json!({"operation": "aggregate", "group_by": "store", "metric": "actual_quantity", "agg_func": "count"})),
            &ds,
        );
        assert_eq!(out, "store\n9     1\n10    1");
    }

    #[test]
    fn aggregate_errors_are_field_specific() {
        let ds = sales();
        assert_eq!(
            execute(&instr(json!({"operation": "aggregate", "group_by": "product_id"})), &ds),
            "Error: 'aggregate' requires 'group_by' and 'metric'."
        );
        let out = execute(
            &instr(json!({"operation": "aggregate", "group_by": "nonexistent", "metric": "actual_quantity"})),
            &ds,
        );
        assert!(out.contains("unknown group_by column"));
        assert!(out.contains("nonexistent"));
        assert_eq!(
            execute(&instr(json!({"operation": "aggregate", "group_by": "location", "metric": "revenue"})), &ds),
            "Error: unknown metric column 'revenue'."
        );
        assert_eq!(
            execute(
                &instr(json!({"operation": "aggregate", "group_by": "location", "metric": "actual_price", "agg_func": "median"})),
                &ds
            ),
            "Unsupported aggregation: median"
        );
    }

    #[test]
    fn filter_renders_matching_rows_in_order() {
        let out = execute(
            &instr(json!({"operation": "filter", "condition": "location == 'Lima'"})),
            &sales(),
        );
        assert_eq!(
            out,
            "location product_id actual_quantity actual_price\n    Lima          A              10          1.5\n    Lima          C              20         oops"
        );
    }

    #[test]
    fn filter_edge_cases() {
        let ds = sales();
        assert_eq!(
            execute(&instr(json!({"operation": "filter"})), &ds),
            "Error: 'filter' requires 'condition'."
        );
        assert_eq!(
            execute(&instr(json!({"operation": "filter", "condition": "actual_quantity > 100"})), &ds),
            "No rows matched."
        );
        let out = execute(&instr(json!({"operation": "filter", "condition": "location =="})), &ds);
        assert!(out.starts_with("Error in filter condition: "), "{}", out);
    }

    #[test]
    fn filter_sum_coerces_and_sums() {
        let ds = sales();
        assert_eq!(
            execute(
                &instr(json!({"operation": "filter_sum", "condition": "location == 'Lima'", "metric": "actual_quantity"})),
                &ds
            ),
            "30.0"
        );
        assert_eq!(
            execute(
                &instr(json!({"operation": "filter_sum", "condition": "location == 'Lima'", "metric": "actual_price"})),
                &ds
            ),
            "1.5"
        );
        assert_eq!(
            execute(
                &instr(json!({"operation": "filter_sum", "condition": "actual_price > 1", "metric": "actual_price"})),
                &ds
            ),
            "3.5"
        );
    }

    #[test]
    fn filter_sum_with_no_matches_is_zero() {
        let out = execute(
            &instr(json!({"operation": "filter_sum", "condition": "location == 'Oslo'", "metric": "actual_quantity"})),
            &sales(),
        );
        assert_eq!(out, "0.0");
        assert!(!out.starts_with('-'));
    }

    #[test]
    fn runaway_conditions_come_back_as_text() {
        let ds = sales();
        let nested = format!("{}location == 'Lima'{}", "(".repeat(50_000), ")".repeat(50_000));
        let out = execute(&instr(json!({"operation": "filter", "condition": nested})), &ds);
        assert!(out.starts_with("Error in filter condition: "), "{}", out);

        let chain = vec!["location == 'X'"; 100_000].join(" or ");
        let out = execute(
            &instr(json!({"operation": "filter_sum", "condition": chain, "metric": "actual_quantity"})),
            &ds,
        );
        assert!(out.starts_with("Error in filter_sum: "), "{}", out);
    }

    #[test]
    fn filter_sum_errors() {
        let ds = sales();
        assert_eq!(
            execute(&instr(json!({"operation": "filter_sum", "metric": "actual_price"})), &ds),
            "Error: 'filter_sum' requires 'condition' and 'metric'."
        );
        assert_eq!(
            execute(&instr(json!({"operation": "filter_sum", "condition": "x > 1", "metric": "nope"})), &ds),
            "Error: unknown metric column 'nope'."
        );
        let out = execute(
            &instr(json!({"operation": "filter_sum", "condition": "colour == 'red'", "metric": "actual_price"})),
            &ds,
        );
        assert!(out.starts_with("Error in filter_sum: "));
        assert!(out.contains("colour"));
    }

    #[test]
    fn data_tool_requires_an_instruction() {
        let ds = sales();
        assert_eq!(
            run_data_tool(Some(&json!("just words")), &Map::new(), &ds),
            r#"Error: expected JSON like {"operation": "...", ...}."#
        );
        let raw = json!(r#"{"operation":"filter_sum","condition":"product_id == 'B'","metric":"actual_quantity"}"#);
        assert_eq!(run_data_tool(Some(&raw), &Map::new(), &ds), "30.0");
    }
}
