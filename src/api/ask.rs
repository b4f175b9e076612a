use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::ax_state::AppState;
use crate::core::pipeline;
use crate::models::context::{AskRequest, AskResponse};

const OFFLINE_MODE: &str = "offline";

/// 提问入口：构造指令 → 执行 → 摘要
pub async fn ask_question(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Response {
    // 请求体不是合法 JSON 时按空提问处理
    let question = payload
        .ok()
        .and_then(|Json(req)| req.question)
        .map(|q| q.trim().to_string())
        .unwrap_or_default();
    if question.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing 'question'" })),
        )
            .into_response();
    }

    let request_id = Uuid::new_v4();
    info!(%request_id, "收到提问: {}", question);

    let worker_state = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        pipeline::ask(
            &worker_state.config.dataset_path,
            &worker_state.aliases,
            &question,
        )
    })
    .await;

    match result {
        Ok(Ok(outcome)) => Json(AskResponse {
            request_id,
            mode: OFFLINE_MODE,
            validator: outcome.validator,
            tool_output: outcome.tool_output,
            insights: outcome.insights,
        })
        .into_response(),
        Ok(Err(e)) => {
            error!(%request_id, "数据集加载失败: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
        Err(e) => {
            error!(%request_id, "处理任务异常退出: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("pipeline task failed: {}", e) })),
            )
                .into_response()
        }
    }
}
