//! # HostingRegistry：镜像对象仓储
//!
//! ## 核心意图（Why）
//! - 注册表同时被三个可能并发的调用点修改：发现回调（准入）、镜像对象的终止回调（移除）与
//!   `stop_hosting`（批量移除）；
//! - 所有查找与修改经由同一把协调器持有的互斥锁串行化，“查找 + 插入”与“查找 + 移除”
//!   都是原子复合操作，并与“停止中”闩锁的检查处于同一临界区。
//!
//! ## 行为契约（What）
//! - 任意时刻每个 [`DedupKey`] 至多对应一个镜像对象；
//! - 移除按 `(键, MirrorId)` 进行：键不存在、或键已被更新的镜像占用时均为空操作；
//! - 闩锁置位后拒绝一切准入，直到 [`reopen`](HostingRegistry::reopen)。
//!
//! ## 风险提示（Trade-offs）
//! - 准入时的构造闭包在锁内执行，只允许做内存分配级别的工作；镜像的建立在锁外激活。

use std::{collections::HashMap, sync::Arc};

use hosting_core::RemoteResourceDescriptor;
use parking_lot::Mutex;

use crate::{
    config::DedupPolicy,
    mirror::{MirrorId, MirrorObject},
};

/// 托管去重键。
///
/// - **契约 (What)**：默认策略下只包含 `(address, uri)`；当策略纳入实例标识时，
///   `instance_id` 取描述符上的值（缺失为 `None`）。
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct DedupKey {
    address: String,
    uri: String,
    instance_id: Option<String>,
}

impl DedupKey {
    pub fn new(descriptor: &RemoteResourceDescriptor, policy: DedupPolicy) -> Self {
        Self {
            address: descriptor.address().to_owned(),
            uri: descriptor.uri().to_owned(),
            instance_id: if policy.includes_instance() {
                descriptor.instance_id().map(str::to_owned)
            } else {
                None
            },
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

/// 一次准入尝试的结果。
#[derive(Debug)]
pub enum Admission {
    /// 新镜像已插入注册表，调用方需在锁外激活。
    Admitted(Arc<MirrorObject>),
    /// 同键镜像已存在，候选被丢弃。
    AlreadyHosted(MirrorId),
    /// 拆除已开始，拒绝准入。
    Stopping,
}

#[derive(Debug, Default)]
struct RegistryState {
    entries: HashMap<DedupKey, Arc<MirrorObject>>,
    stopping: bool,
    next_id: u64,
}

/// 协调器独占的镜像对象注册表。
#[derive(Debug, Default)]
pub struct HostingRegistry {
    state: Mutex<RegistryState>,
}

impl HostingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 原子地完成“闩锁检查 + 查重 + 构造 + 插入”。
    ///
    /// # 教案式注释
    /// - **意图 (Why)**：两个发现回调同时交付同一资源时，只有一个能观察到空位；
    /// - **契约 (What)**：
    ///   - `build` 仅在准入成功时调用一次，参数为新分配的 [`MirrorId`]；
    ///   - `build` 在锁内执行，不得阻塞，也不得回调注册表；
    /// - **后置条件**：返回 [`Admission::Admitted`] 时注册表已包含该镜像。
    pub fn admit<F>(&self, key: DedupKey, build: F) -> Admission
    where
        F: FnOnce(MirrorId) -> Arc<MirrorObject>,
    {
        let mut state = self.state.lock();
        if state.stopping {
            return Admission::Stopping;
        }
        if let Some(existing) = state.entries.get(&key) {
            return Admission::AlreadyHosted(existing.id());
        }
        state.next_id += 1;
        let mirror = build(MirrorId::new(state.next_id));
        state.entries.insert(key, Arc::clone(&mirror));
        Admission::Admitted(mirror)
    }

    /// 按键与镜像标识移除条目。
    ///
    /// - **契约 (What)**：仅当键存在且其镜像标识等于 `id` 时移除并返回该镜像；
    ///   否则返回 `None`，重复调用不会改变注册表。
    pub fn remove(&self, key: &DedupKey, id: MirrorId) -> Option<Arc<MirrorObject>> {
        let mut state = self.state.lock();
        match state.entries.get(key) {
            Some(current) if current.id() == id => state.entries.remove(key),
            _ => None,
        }
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// 置位“停止中”闩锁；返回闩锁此前是否已置位。
    pub fn latch_stopping(&self) -> bool {
        let mut state = self.state.lock();
        core::mem::replace(&mut state.stopping, true)
    }

    /// 清除闩锁，重新允许准入。
    pub fn reopen(&self) {
        self.state.lock().stopping = false;
    }

    pub fn is_stopping(&self) -> bool {
        self.state.lock().stopping
    }

    /// 取出全部镜像并清空注册表。
    ///
    /// - **执行 (How)**：两阶段拆除的第一阶段；调用方在锁外逐个拆除返回的镜像，
    ///   此时到达的终止回调只会命中空表。
    pub fn drain(&self) -> Vec<Arc<MirrorObject>> {
        let mut state = self.state.lock();
        state.entries.drain().map(|(_, mirror)| mirror).collect()
    }

    /// 当前镜像的快照列表。
    pub fn mirrors(&self) -> Vec<Arc<MirrorObject>> {
        self.state.lock().entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }
}
