use anyhow::Context;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_DATASET_PATH: &str = "data/sales.csv";
pub const DEFAULT_PORT: u16 = 5000;

/// 进程级配置，启动时从环境变量 (含 .env) 读取一次
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// SALES_CSV
    pub dataset_path: PathBuf,
    /// PORT
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
            port: DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let dataset_path = non_empty("SALES_CSV")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET_PATH));

        let port = match non_empty("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT 不是合法端口: {}", raw))?,
            None => DEFAULT_PORT,
        };

        Ok(Self { dataset_path, port })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}
