use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: Option<String>, // 用户提问内容
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub request_id: Uuid,
    pub mode: &'static str, // 当前只有离线流程

    pub validator: String,
    pub tool_output: String,
    pub insights: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DatasetQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DatasetPreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub output: String,
}
