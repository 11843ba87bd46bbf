#![deny(unsafe_code)]

//! # hosting-core
//!
//! ## 定位与职责（Why）
//! - 定义资源托管子系统与外部协作方之间的边界：远端资源描述、存活通道、发现服务与源端监视器；
//! - 协作方的传输、编码与重试策略均不在本 crate 范围内，这里只固定“调用形状”与错误类别。
//!
//! ## 架构嵌入（Where）
//! - `resource-hosting` 依赖本 crate 实现协调器与镜像对象；
//! - 平台适配层（协议栈绑定）实现本 crate 的各个 trait 后注入协调器。

pub mod descriptor;
pub mod discovery;
pub mod error;
pub mod origin;
pub mod presence;

pub use descriptor::{
    ConnectivityScope, HOSTING_TAG, RemoteResourceDescriptor, is_hostable_uri, mirror_uri_of,
};
pub use discovery::{DiscoveryCallback, DiscoveryService};
pub use error::{HostingError, HostingErrorKind, Result};
pub use origin::{OriginEvent, OriginMonitor, OriginState, OriginWatch, ResourceAttributes};
pub use presence::{
    PresenceCallback, PresenceChannel, PresenceClass, PresenceResult, PresenceSubscription,
};
