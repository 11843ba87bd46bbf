//! # 存活通道契约（Presence Channel）
//!
//! ## 核心意图（Why）
//! - 存活信标是托管节点重新扫描某个设备的触发器：设备上线或资源集合变化时，协议栈在订阅回调中
//!   交付结果码、单调递增的序列号与源地址；
//! - 托管子系统只依赖订阅/退订两个动作，传输与编码细节留给协作方。
//!
//! ## 行为契约（What）
//! - [`PresenceResult`] 覆盖协议栈定义的全部结果码，未定义的值落入 [`PresenceResult::Unknown`]，
//!   以便向前兼容；
//! - [`PresenceResult::class`] 把结果码归入三类：通告（触发定向发现）、离开/通道失败（当前不处理）、
//!   其余（忽略）；
//! - 回调在协作方自己的执行上下文中运行，实现方不得在回调中阻塞或 panic。

use std::sync::Arc;

use crate::{descriptor::ConnectivityScope, error::Result};

/// 存活回调：`(结果码, 序列号, 源地址)`。
///
/// - **契约 (What)**：每个订阅绑定一个独立的回调实例，不在多个逻辑订阅之间共享。
pub type PresenceCallback = Arc<dyn Fn(PresenceResult, u32, &str) + Send + Sync + 'static>;

/// 协议栈结果码。
///
/// # 教案式说明
/// - **意图 (Why)**：存活回调的第一个参数复用协议栈的通用结果码表，协调器需要对其完整分类；
/// - **契约 (What)**：[`code`](Self::code) 与 [`from_code`](Self::from_code) 保持双向一致，
///   任何未列出的数值都映射为 `Unknown(code)`；
/// - **风险 (Trade-offs)**：新增结果码时需同时更新编码表与 [`class`](Self::class)。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PresenceResult {
    Ok,
    ResourceCreated,
    ResourceDeleted,
    Continue,
    InvalidUri,
    InvalidQuery,
    InvalidIp,
    InvalidPort,
    InvalidCallback,
    InvalidMethod,
    InvalidParam,
    InvalidObserveParam,
    NoMemory,
    CommError,
    Timeout,
    AdapterNotEnabled,
    NotImplemented,
    NoResource,
    ResourceError,
    SlowResource,
    DuplicateRequest,
    NoObservers,
    ObserverNotFound,
    VirtualDoNotHandle,
    InvalidOption,
    MalformedResponse,
    PersistentBufferRequired,
    InvalidRequestHandle,
    InvalidDeviceInfo,
    InvalidJson,
    PresenceStopped,
    PresenceTimeout,
    PresenceDoNotHandle,
    Error,
    /// 编码表之外的数值。
    Unknown(i32),
}

/// 结果码对托管协调器的意义。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PresenceClass {
    /// 设备在线或正在通告，触发定向发现。
    Announcing,
    /// 设备离开或通道失败；预留给未来的过期镜像驱逐。
    Departure,
    /// 与托管无关，忽略。
    Ignored,
}

const CODE_TABLE: &[(i32, PresenceResult)] = &[
    (0, PresenceResult::Ok),
    (1, PresenceResult::ResourceCreated),
    (2, PresenceResult::ResourceDeleted),
    (3, PresenceResult::Continue),
    (20, PresenceResult::InvalidUri),
    (21, PresenceResult::InvalidQuery),
    (22, PresenceResult::InvalidIp),
    (23, PresenceResult::InvalidPort),
    (24, PresenceResult::InvalidCallback),
    (25, PresenceResult::InvalidMethod),
    (26, PresenceResult::InvalidParam),
    (27, PresenceResult::InvalidObserveParam),
    (28, PresenceResult::NoMemory),
    (29, PresenceResult::CommError),
    (30, PresenceResult::Timeout),
    (31, PresenceResult::AdapterNotEnabled),
    (32, PresenceResult::NotImplemented),
    (33, PresenceResult::NoResource),
    (34, PresenceResult::ResourceError),
    (35, PresenceResult::SlowResource),
    (36, PresenceResult::DuplicateRequest),
    (37, PresenceResult::NoObservers),
    (38, PresenceResult::ObserverNotFound),
    (39, PresenceResult::VirtualDoNotHandle),
    (40, PresenceResult::InvalidOption),
    (41, PresenceResult::MalformedResponse),
    (42, PresenceResult::PersistentBufferRequired),
    (43, PresenceResult::InvalidRequestHandle),
    (44, PresenceResult::InvalidDeviceInfo),
    (45, PresenceResult::InvalidJson),
    (128, PresenceResult::PresenceStopped),
    (129, PresenceResult::PresenceTimeout),
    (130, PresenceResult::PresenceDoNotHandle),
    (255, PresenceResult::Error),
];

impl PresenceResult {
    /// 由协议栈数值解析结果码。
    pub fn from_code(code: i32) -> Self {
        CODE_TABLE
            .iter()
            .find(|(value, _)| *value == code)
            .map(|(_, result)| *result)
            .unwrap_or(PresenceResult::Unknown(code))
    }

    /// 返回协议栈数值。
    pub fn code(self) -> i32 {
        if let PresenceResult::Unknown(code) = self {
            return code;
        }
        CODE_TABLE
            .iter()
            .find(|(_, result)| *result == self)
            .map(|(value, _)| *value)
            .unwrap_or(-1)
    }

    /// 按托管语义分类。
    ///
    /// # 教案式注释
    /// - **意图 (Why)**：只有“在线/新建/持续通告”三类值值得重新扫描源端；
    /// - **执行 (How)**：显式列出通告类与离开类，其余定义值与未知值一律忽略，新增结果码默认不触发动作。
    pub fn class(self) -> PresenceClass {
        match self {
            PresenceResult::Ok | PresenceResult::ResourceCreated | PresenceResult::Continue => {
                PresenceClass::Announcing
            }
            PresenceResult::ResourceDeleted
            | PresenceResult::CommError
            | PresenceResult::Timeout
            | PresenceResult::PresenceStopped
            | PresenceResult::PresenceTimeout
            | PresenceResult::PresenceDoNotHandle
            | PresenceResult::Error => PresenceClass::Departure,
            _ => PresenceClass::Ignored,
        }
    }

    /// 编码表中全部已定义的结果码，按数值升序。
    pub fn defined() -> impl Iterator<Item = PresenceResult> {
        CODE_TABLE.iter().map(|(_, result)| *result)
    }
}

/// 一次存活订阅的句柄。
///
/// - **契约 (What)**：`unsubscribe` 在未订阅状态下必须是安全的空操作；句柄被丢弃时是否自动退订
///   由实现方决定，协调器总会显式退订。
pub trait PresenceSubscription: Send + Sync {
    /// 订阅是否仍然有效。
    fn is_subscribed(&self) -> bool;

    /// 取消订阅。
    fn unsubscribe(&mut self) -> Result<()>;
}

/// 存活通道。
///
/// # 教案式说明
/// - **意图 (Why)**：隔离具体协议栈，协调器仅需要“按 `(地址, 作用域)` 订阅并接收回调”；
/// - **契约 (What)**：
///   - 订阅成功返回处于 *Subscribed* 状态的句柄；
///   - 失败时返回的错误类别必须如实反映失败原因（平台失败或非法参数），协调器会原样传播；
///   - `callback` 可能在任意线程上被调用，且可能在 `subscribe` 返回之前就被调用。
pub trait PresenceChannel: Send + Sync + 'static {
    fn subscribe(
        &self,
        address: &str,
        scope: ConnectivityScope,
        callback: PresenceCallback,
    ) -> Result<Box<dyn PresenceSubscription>>;
}
