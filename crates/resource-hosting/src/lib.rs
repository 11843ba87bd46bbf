#![deny(unsafe_code)]

//! # resource-hosting
//!
//! ## 定位与职责（Why）
//! - 让资源受限的 IoT 设备把资源的长期可用性委托给供给更充足的节点：源端把资源标记为可托管
//!   （URI 以 `/hosting` 结尾），托管节点监听存活通道、发现这些资源并创建本地镜像；
//! - 本 crate 实现其中的协调部分：把异步的存活/发现事件收敛为一份一致、去重的镜像对象集合，
//!   并约束镜像对象的生命周期。
//!
//! ## 架构嵌入（Where）
//! - `config`：部署相关的地址、查询与去重策略；
//! - `registry`：协调器独占的镜像注册表，单锁串行化全部复合操作；
//! - `mirror`：镜像对象及其同步任务；
//! - `coordinator`：进程级单例与三个入口 `instance` / `start_hosting` / `stop_hosting`；
//! - `telemetry`：常驻进程的 `tracing` 装配。
//!
//! ## 使用方式（How）
//! 1. 平台层实现 `hosting-core` 中的协作方 trait，构造 [`HostingPlatform`]；
//! 2. 调用 [`instance`] 取得单例并 [`attach`](HostingCoordinator::attach)；
//! 3. [`start_hosting`](HostingCoordinator::start_hosting) / [`stop_hosting`](HostingCoordinator::stop_hosting)。

pub mod config;
pub mod coordinator;
pub mod mirror;
pub mod registry;
pub mod telemetry;

pub use config::{DedupPolicy, HostingConfig};
pub use coordinator::{HostingCoordinator, HostingPlatform, instance};
pub use hosting_core;
pub use mirror::{MirrorId, MirrorObject, MirrorSnapshot, MirrorState};
pub use registry::{Admission, DedupKey, HostingRegistry};
