//! # 源端监视契约（Origin Monitor）
//!
//! ## 核心意图（Why）
//! - 镜像对象需要持续感知源端的可达状态与属性变化，才能在源端休眠或失联时继续服务，
//!   并在源端确实消失时自我终止；
//! - 具体的观察/缓存机制属于协作方，镜像对象只消费一条事件流。
//!
//! ## 行为契约（What）
//! - [`OriginMonitor::watch`] 为一个描述符打开事件流；丢弃流即视为停止观察；
//! - 事件流结束意味着协作方无法再提供同步，镜像对象会将其视为不可恢复故障。

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::{descriptor::RemoteResourceDescriptor, error::Result};

/// 资源属性快照。
pub type ResourceAttributes = BTreeMap<String, serde_json::Value>;

/// 源端可达状态。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OriginState {
    /// 源端在线。
    Alive,
    /// 已发出探测请求，等待源端应答。
    Requested,
    /// 在约定时间内未收到源端信号。
    LostSignal,
    /// 源端显式移除了资源。
    Destroyed,
}

impl OriginState {
    /// 该状态是否意味着源端已丢失。
    pub fn is_lost(self) -> bool {
        matches!(self, OriginState::LostSignal | OriginState::Destroyed)
    }
}

/// 源端事件。
#[derive(Clone, Debug, PartialEq)]
pub enum OriginEvent {
    /// 可达状态变化。
    State(OriginState),
    /// 最新的属性快照。
    Attributes(ResourceAttributes),
    /// 同步过程出现不可恢复故障。
    Fault(String),
}

/// 源端事件流。
pub type OriginWatch = BoxStream<'static, OriginEvent>;

/// 源端监视器。
///
/// # 教案式说明
/// - **意图 (Why)**：把“观察源端”抽象为异步打开一条事件流，镜像对象在自己的任务中驱动它，
///   不占用发现/存活回调的执行上下文；
/// - **契约 (What)**：打开失败返回 `Err`，镜像对象会立即走终止路径；
/// - **风险 (Trade-offs)**：协作方若从不结束事件流，镜像对象只能由强制拆除终止。
#[async_trait]
pub trait OriginMonitor: Send + Sync + 'static {
    async fn watch(&self, descriptor: &RemoteResourceDescriptor) -> Result<OriginWatch>;
}
