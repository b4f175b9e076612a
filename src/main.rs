use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sales_query::api::ask::ask_question;
use sales_query::api::dataset::preview_dataset;
use sales_query::api::health::health;
use sales_query::api::query::run_query;
use sales_query::ax_state::AppState;
use sales_query::core::alias_engine::AliasEngine;
use sales_query::infra::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    let aliases = AliasEngine::standard().context("构建列名别名表失败")?;
    info!(
        "数据集路径: {}，别名条目: {}",
        config.dataset_path.display(),
        aliases.len()
    );

    let addr = config.bind_addr();
    let state = Arc::new(AppState { config, aliases });

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = Router::new()
        .route("/api/ask", post(ask_question))
        .route("/api/dataset", get(preview_dataset))
        .route("/api/query", post(run_query))
        .route("/api/health", get(health))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    info!("🚀 Sales Query 服务运行在 http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("无法监听 {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}
