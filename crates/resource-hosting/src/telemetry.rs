//! 日志安装入口。
//!
//! # 教案式说明
//! - **意图（Why）**：托管节点通常是常驻进程，需要一次性装配 `tracing` 全局 Subscriber，
//!   让协调器与镜像对象输出的结构化字段（`mirror_id`、`address`、`uri` 等）统一落地；
//! - **逻辑（How）**：使用 `tracing-subscriber` 组装 `EnvFilter + fmt` Layer，过滤规则取 `RUST_LOG`，
//!   缺省为 `info`；
//! - **契约（What）**：重复调用返回 [`TelemetryError::AlreadyInstalled`]；外部已设置全局 Subscriber 时返回
//!   [`TelemetryError::SubscriberAlreadySet`]。

use std::sync::OnceLock;

use thiserror::Error;
use tracing::dispatcher;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt};

static INSTALLED: OnceLock<()> = OnceLock::new();

/// 日志安装过程可能出现的错误。
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("hosting telemetry is already installed")]
    AlreadyInstalled,
    #[error("a global tracing subscriber is already set")]
    SubscriberAlreadySet,
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] dispatcher::SetGlobalDefaultError),
}

/// 安装全局 `tracing` Subscriber。
pub fn install() -> Result<(), TelemetryError> {
    if INSTALLED.get().is_some() {
        return Err(TelemetryError::AlreadyInstalled);
    }
    if dispatcher::has_been_set() {
        return Err(TelemetryError::SubscriberAlreadySet);
    }

    let subscriber = tracing_subscriber::registry()
        .with(build_env_filter())
        .with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber)?;

    INSTALLED
        .set(())
        .map_err(|_| TelemetryError::AlreadyInstalled)
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
