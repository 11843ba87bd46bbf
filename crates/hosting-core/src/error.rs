//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为托管子系统与外部协作方（存活通道、发现服务、源端监视器）之间的失败语义提供集中定义；
//! - `startHosting` 不在本地恢复任何失败，因此错误必须保留“平台/协议失败”与“非法参数”的类别区分，
//!   以便调用方决定是否重试。
//!
//! ## 设计要求（What）
//! - 所有错误派生 `thiserror::Error`，满足 `Send + Sync + 'static`；
//! - 每个变体映射到稳定错误码（`hosting.*`），供日志字段与告警规则使用；
//! - [`HostingErrorKind`] 只有三类：平台、非法参数、其余一律归为通用失败。

use thiserror::Error;

/// 托管子系统错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：协作方在各自执行上下文中报告失败，协调器需要原样向 `startHosting` 的调用方传播，
///   不得在传播过程中丢失错误类别；
/// - **契约 (What)**：
///   - [`HostingError::Platform`] 对应底层协议栈/平台失败，`code` 保存协作方给出的原始结果码；
///   - [`HostingError::InvalidArgument`] 对应调用参数或配置非法；
///   - [`HostingError::NotAttached`] 表示协调器尚未绑定协作方就被要求启动；
///   - [`HostingError::Other`] 兜底承载其他失败；
/// - **风险 (Trade-offs)**：`detail` 使用 `String` 保存上下文，牺牲少量分配换取可读性。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum HostingError {
    /// 平台或协议层失败，例如订阅请求被协议栈拒绝。
    #[error("platform failure (code {code}): {detail}")]
    Platform { code: i32, detail: String },

    /// 参数或配置非法。
    #[error("invalid argument: {detail}")]
    InvalidArgument { detail: String },

    /// 协调器未绑定运行平台。
    #[error("hosting platform is not attached")]
    NotAttached,

    /// 无法归入以上类别的失败。
    #[error("hosting failure: {detail}")]
    Other { detail: String },
}

/// 错误类别，对应 `startHosting` 向外暴露的三种可区分失败。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HostingErrorKind {
    /// 平台/协议失败。
    Platform,
    /// 非法参数失败。
    InvalidArgument,
    /// 其余失败。
    Generic,
}

impl HostingError {
    /// 构造平台失败。
    pub fn platform(code: i32, detail: impl Into<String>) -> Self {
        HostingError::Platform {
            code,
            detail: detail.into(),
        }
    }

    /// 构造非法参数失败。
    pub fn invalid_argument(detail: impl Into<String>) -> Self {
        HostingError::InvalidArgument {
            detail: detail.into(),
        }
    }

    /// 构造通用失败。
    pub fn other(detail: impl Into<String>) -> Self {
        HostingError::Other {
            detail: detail.into(),
        }
    }

    /// 返回错误类别。
    ///
    /// - **契约 (What)**：`NotAttached` 与 `Other` 同属 [`HostingErrorKind::Generic`]，
    ///   调用方不应依赖二者的区分做重试决策。
    pub fn kind(&self) -> HostingErrorKind {
        match self {
            HostingError::Platform { .. } => HostingErrorKind::Platform,
            HostingError::InvalidArgument { .. } => HostingErrorKind::InvalidArgument,
            HostingError::NotAttached | HostingError::Other { .. } => HostingErrorKind::Generic,
        }
    }

    /// 稳定错误码，用作结构化日志字段。
    pub fn code(&self) -> &'static str {
        match self {
            HostingError::Platform { .. } => "hosting.platform",
            HostingError::InvalidArgument { .. } => "hosting.invalid_argument",
            HostingError::NotAttached => "hosting.not_attached",
            HostingError::Other { .. } => "hosting.other",
        }
    }
}

/// 托管子系统统一的 `Result` 别名。
pub type Result<T, E = HostingError> = core::result::Result<T, E>;
