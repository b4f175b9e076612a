use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::ax_state::AppState;
use crate::infra::loader::load_dataset;
use crate::models::context::{DatasetPreview, DatasetQuery};

const DEFAULT_PREVIEW_LIMIT: i64 = 50;
const MAX_PREVIEW_LIMIT: i64 = 500;

/// 数据集预览：列名 + 前 N 行 (全部转为文本) + 总行数
pub async fn preview_dataset(
    State(state): State<Arc<AppState>>,
    query: Result<Query<DatasetQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return internal_error(rejection.body_text()),
    };
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PREVIEW_LIMIT)
        .clamp(1, MAX_PREVIEW_LIMIT) as usize;

    let worker_state = Arc::clone(&state);
    let loaded = tokio::task::spawn_blocking(move || {
        load_dataset(&worker_state.config.dataset_path, &worker_state.aliases)
    })
    .await;

    let dataset = match loaded {
        Ok(Ok(ds)) => ds,
        Ok(Err(e)) => return internal_error(e.to_string()),
        Err(e) => return internal_error(format!("dataset task failed: {}", e)),
    };

    let rows = dataset
        .rows()
        .iter()
        .take(limit)
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect();

    Json(DatasetPreview {
        columns: dataset.columns().to_vec(),
        rows,
        total_rows: dataset.len(),
        limit,
    })
    .into_response()
}

fn internal_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}
