use axum::{extract::State, Json};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

use crate::ax_state::AppState;
use crate::core::executor::run_data_tool;
use crate::infra::loader::load_dataset;
use crate::models::context::QueryResponse;

/// 直接执行指令
///
/// 请求体可以是 `{"instruction": <对象或字符串>}`，也可以直接平铺 operation / metric 等字段；
/// 非对象的请求体整体当作指令。成功与失败都以文本返回。
pub async fn run_query(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Json<QueryResponse> {
    let (raw, flat) = match body {
        Value::Object(mut map) => (map.remove("instruction"), map),
        other => (Some(other), Map::new()),
    };

    let worker_state = Arc::clone(&state);
    let output = tokio::task::spawn_blocking(move || {
        match load_dataset(&worker_state.config.dataset_path, &worker_state.aliases) {
            Ok(dataset) => run_data_tool(raw.as_ref(), &flat, &dataset),
            Err(e) => {
                warn!("数据集加载失败: {}", e);
                format!("Error executing instruction: {}", e)
            }
        }
    })
    .await
    .unwrap_or_else(|e| format!("Error executing instruction: {}", e));

    Json(QueryResponse { output })
}
