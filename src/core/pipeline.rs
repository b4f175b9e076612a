use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{info, instrument};

use crate::core::alias_engine::AliasEngine;
use crate::core::builder::build_or_validate;
use crate::core::executor::run_data_tool;
use crate::core::summarizer::summarize;
use crate::error::DataError;
use crate::infra::loader::load_dataset;
use crate::models::dataset::Dataset;

const LOG_PREVIEW_CHARS: usize = 500;

/// 一次提问的三个中间结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutcome {
    pub validator: String,
    pub tool_output: String,
    pub insights: String,
}

/// 加载数据集后跑完整流程；只有数据集加载失败会以错误返回
pub fn ask(path: &Path, aliases: &AliasEngine, question: &str) -> Result<PipelineOutcome, DataError> {
    let dataset = load_dataset(path, aliases)?;
    Ok(answer_question(question, &dataset))
}

/// 构造指令 → 执行 → 摘要
#[instrument(skip(dataset), fields(question = %question))]
pub fn answer_question(question: &str, dataset: &Dataset) -> PipelineOutcome {
    info!("=== 开始处理提问 ===");

    let validator = build_or_validate(Some(question), None, &dataset.schema()).to_compact_json();
    info!("[VALIDATOR] {}", validator);

    let tool_output = run_data_tool(Some(&Value::String(validator.clone())), &Map::new(), dataset);
    info!("[DATA TOOL] (前 {} 字符)\n{}", LOG_PREVIEW_CHARS, preview(&tool_output));

    let insights = summarize(&tool_output);
    info!("[INSIGHTS] {}", insights);

    PipelineOutcome {
        validator,
        tool_output,
        insights,
    }
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(LOG_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
