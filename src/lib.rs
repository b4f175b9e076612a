pub mod api;
pub mod core;
pub mod error;
pub mod infra;
pub mod models;

pub mod ax_state {
    use crate::core::alias_engine::AliasEngine;
    use crate::infra::config::AppConfig;

    /// 请求间共享的只读状态；数据集每次请求重新加载
    pub struct AppState {
        pub config: AppConfig,
        pub aliases: AliasEngine,
    }
}
