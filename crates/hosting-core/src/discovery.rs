//! # 发现服务契约（Discovery Service）
//!
//! - **意图 (Why)**：托管协调器通过发现查询枚举“可托管”资源，既有不限主机的组播扫描，
//!   也有由存活信标触发的单主机定向扫描；
//! - **契约 (What)**：每次查询绑定一个回调，回调针对每个候选资源调用一次（零次或多次），
//!   异步且不保证在调用线程上执行；查询本身不可单独取消。

use std::sync::Arc;

use crate::{
    descriptor::{ConnectivityScope, RemoteResourceDescriptor},
    error::Result,
};

/// 发现回调：每次交付一个候选描述符。
pub type DiscoveryCallback = Arc<dyn Fn(RemoteResourceDescriptor) + Send + Sync + 'static>;

/// 发现服务。
///
/// - `host` 为 `None` 时表示组播扫描，否则为定向查询的目标地址；
/// - `query` 为带类型过滤参数的路径，例如 `"/oic/res?rt=Resource.Hosting"`；
/// - 返回 `Err` 仅表示请求未能发出，已发出的查询的失败不会回报。
pub trait DiscoveryService: Send + Sync + 'static {
    fn discover(
        &self,
        host: Option<&str>,
        query: &str,
        scope: ConnectivityScope,
        callback: DiscoveryCallback,
    ) -> Result<()>;
}
