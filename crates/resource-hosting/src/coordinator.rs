//! # HostingCoordinator：托管协调器
//!
//! ## 核心意图（Why）
//! - 把两个相互独立的异步事件源（存活通道、发现服务）汇聚为一份一致、去重的镜像对象集合；
//! - 存活信标触发对该设备的定向重扫；发现回调逐个交付候选，经标签过滤与去重后准入为镜像。
//!
//! ## 架构定位（Where）
//! - 进程级单例由 [`instance`] 惰性构造；平台协作方通过 [`HostingCoordinator::attach`] 显式注入，
//!   随后才能 [`start_hosting`](HostingCoordinator::start_hosting)；
//! - 测试与嵌入场景可直接 [`HostingCoordinator::new`] 构造独立实例。
//!
//! ## 并发模型（How）
//! - 注册表的全部修改经由 [`HostingRegistry`] 内的单把锁串行化；
//! - 绑定给协作方的每个回调都是独立闭包，持有指向协调器内部状态的 `Weak` 引用，
//!   协调器被丢弃后迟到的回调自然失效；
//! - `stop_hosting` 先置位“停止中”闩锁，再退订，最后两阶段拆除镜像。
//!
//! ## 风险提示（Trade-offs）
//! - 离开类存活事件当前只记录日志，不驱逐过期镜像；镜像依赖自身的源端监视完成回收。

use std::sync::{Arc, OnceLock, Weak};

use hosting_core::{
    DiscoveryCallback, DiscoveryService, HostingError, OriginMonitor, PresenceCallback,
    PresenceChannel, PresenceClass, PresenceResult, PresenceSubscription,
    RemoteResourceDescriptor, Result,
};
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tracing::{debug, info, trace, warn};

use crate::{
    config::HostingConfig,
    mirror::{MirrorId, MirrorObject},
    registry::{Admission, DedupKey, HostingRegistry},
};

static INSTANCE: OnceLock<HostingCoordinator> = OnceLock::new();

/// 返回进程级协调器单例。
///
/// - **契约 (What)**：首次调用在一次性初始化原语的互斥保护下构造实例，并发的首次调用只会构造一次；
///   之后的调用无锁返回同一实例。
pub fn instance() -> &'static HostingCoordinator {
    INSTANCE.get_or_init(HostingCoordinator::new)
}

/// 协调器运行所需的平台协作方。
///
/// # 教案式说明
/// - **意图 (Why)**：协调器本身不认识任何协议栈，存活、发现与源端监视都来自外部实现；
/// - **契约 (What)**：`runtime` 是镜像对象派生同步任务所用的 Tokio 运行时句柄，
///   发现/存活回调可能运行在非 Tokio 线程上，因此不能依赖 `Handle::current()`。
#[derive(Clone)]
pub struct HostingPlatform {
    pub presence: Arc<dyn PresenceChannel>,
    pub discovery: Arc<dyn DiscoveryService>,
    pub origin: Arc<dyn OriginMonitor>,
    pub runtime: Handle,
}

impl HostingPlatform {
    pub fn new(
        presence: Arc<dyn PresenceChannel>,
        discovery: Arc<dyn DiscoveryService>,
        origin: Arc<dyn OriginMonitor>,
        runtime: Handle,
    ) -> Self {
        Self {
            presence,
            discovery,
            origin,
            runtime,
        }
    }
}

impl core::fmt::Debug for HostingPlatform {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HostingPlatform").finish_non_exhaustive()
    }
}

struct Binding {
    platform: HostingPlatform,
    config: HostingConfig,
    query: String,
}

struct CoordinatorInner {
    binding: RwLock<Option<Arc<Binding>>>,
    registry: HostingRegistry,
    subscription: Mutex<Option<Box<dyn PresenceSubscription>>>,
}

/// 资源托管协调器。
///
/// # 教案式说明
/// - **意图 (Why)**：拥有存活订阅、驱动重扫、过滤并去重候选、持有镜像注册表，并在停止时拆除一切；
/// - **契约 (What)**：
///   - [`start_hosting`](Self::start_hosting) 先订阅组播存活通道，再发起一次不限主机的发现扫描；
///     任一步骤失败都原样向调用方传播，注册表保持为空；
///   - [`stop_hosting`](Self::stop_hosting) 可在回调进行中安全调用，从不返回错误；
///   - 连续两次 `start_hosting` 之间是否需要 `stop_hosting` 由调用方保证；
/// - **风险 (Trade-offs)**：句柄克隆共享同一内部状态，丢弃全部句柄后迟到的协作方回调直接失效。
#[derive(Clone)]
pub struct HostingCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl Default for HostingCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl HostingCoordinator {
    /// 构造未绑定平台的协调器。
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                binding: RwLock::new(None),
                registry: HostingRegistry::new(),
                subscription: Mutex::new(None),
            }),
        }
    }

    /// 等价于 [`instance`]。
    pub fn instance() -> &'static HostingCoordinator {
        instance()
    }

    /// 绑定平台协作方与配置。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：配置非法时返回 [`HostingError::InvalidArgument`] 且不替换已有绑定；
    ///   仍持有存活订阅或注册表非空时同样拒绝，需先 [`stop_hosting`](Self::stop_hosting)；
    /// - **风险 (Trade-offs)**：去重键按绑定时的策略计算，运行中替换策略会让新旧键互不相等。
    pub fn attach(&self, platform: HostingPlatform, config: HostingConfig) -> Result<()> {
        config.validate()?;
        let mut binding = self.inner.binding.write();
        if self.inner.subscription.lock().is_some() || !self.inner.registry.is_empty() {
            return Err(HostingError::invalid_argument(
                "cannot attach while hosting is active, stop hosting first",
            ));
        }
        let query = config.discovery_query();
        info!(
            presence_address = %config.presence_address,
            query = %query,
            dedup_policy = ?config.dedup_policy,
            "hosting platform attached"
        );
        *binding = Some(Arc::new(Binding {
            platform,
            config,
            query,
        }));
        Ok(())
    }

    /// 开始托管：订阅组播存活通道，随后发起一次组播发现扫描。
    ///
    /// # 教案式注释
    /// - **执行 (How)**：
    ///   1. 以 [`HostingConfig::presence_address`] 订阅，回调绑定到本协调器；订阅失败时闩锁保持原状；
    ///   2. 订阅成功后清除“停止中”闩锁，替换并释放此前持有的订阅句柄，保证至多持有一个；
    ///   3. 发起不限主机的发现；若失败，按停止路径重新置位闩锁、释放订阅并拆除已准入的镜像；
    /// - **错误 (What)**：未绑定平台返回 [`HostingError::NotAttached`]；其余错误保持协作方给出的类别，
    ///   失败返回后注册表为空或保持调用前的内容。
    pub fn start_hosting(&self) -> Result<()> {
        let binding = self.inner.binding().ok_or(HostingError::NotAttached)?;

        let callback = CoordinatorInner::presence_callback(&self.inner);
        let subscription = binding
            .platform
            .presence
            .subscribe(
                &binding.config.presence_address,
                binding.config.connectivity,
                callback,
            )
            .inspect_err(|err| {
                warn!(code = err.code(), error = %err, "presence subscription failed");
            })?;

        self.inner.registry.reopen();
        let previous = self.inner.subscription.lock().replace(subscription);
        if let Some(previous) = previous {
            release_subscription(previous);
        }

        if let Err(err) = CoordinatorInner::request_discovery(&self.inner, &binding, None) {
            warn!(code = err.code(), error = %err, "multicast discovery failed");
            let released = self.inner.shut_down();
            debug!(released, "hosting rolled back after discovery failure");
            return Err(err);
        }

        info!(
            presence_address = %binding.config.presence_address,
            "resource hosting started"
        );
        Ok(())
    }

    /// 停止托管：退订存活通道并拆除全部镜像。
    ///
    /// # 教案式注释
    /// - **执行 (How)**：先置位闩锁阻止新的准入，再退订（未订阅时不调用 `unsubscribe`），
    ///   最后取出全部镜像并在锁外逐个强制拆除；
    /// - **契约 (What)**：退订失败只记录日志；迟到的终止回调只会命中空注册表。
    pub fn stop_hosting(&self) {
        let released = self.inner.shut_down();
        info!(released, "resource hosting stopped");
    }

    /// 当前托管的镜像数量。
    pub fn hosted_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// 当前托管镜像绑定的描述符。
    pub fn hosted_descriptors(&self) -> Vec<RemoteResourceDescriptor> {
        self.inner
            .registry
            .mirrors()
            .iter()
            .map(|mirror| mirror.remote_descriptor().clone())
            .collect()
    }

    /// 当前托管的镜像对象。
    pub fn hosted_mirrors(&self) -> Vec<Arc<MirrorObject>> {
        self.inner.registry.mirrors()
    }

    /// 是否持有有效的存活订阅。
    pub fn is_subscribed(&self) -> bool {
        self.inner
            .subscription
            .lock()
            .as_ref()
            .is_some_and(|subscription| subscription.is_subscribed())
    }

    pub fn is_stopping(&self) -> bool {
        self.inner.registry.is_stopping()
    }
}

impl core::fmt::Debug for HostingCoordinator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HostingCoordinator")
            .field("attached", &self.inner.binding().is_some())
            .field("hosted", &self.inner.registry.len())
            .field("stopping", &self.inner.registry.is_stopping())
            .finish()
    }
}

impl CoordinatorInner {
    fn binding(&self) -> Option<Arc<Binding>> {
        self.binding.read().clone()
    }

    /// 置位闩锁、释放订阅并两阶段拆除全部镜像，返回拆除的镜像数量。
    fn shut_down(&self) -> usize {
        self.registry.latch_stopping();

        let subscription = self.subscription.lock().take();
        if let Some(subscription) = subscription {
            release_subscription(subscription);
        }

        let drained = self.registry.drain();
        let released = drained.len();
        for mirror in drained {
            mirror.teardown();
        }
        released
    }

    fn presence_callback(this: &Arc<Self>) -> PresenceCallback {
        let weak = Arc::downgrade(this);
        Arc::new(move |result, sequence, address| {
            if let Some(inner) = weak.upgrade() {
                inner.on_presence(result, sequence, address);
            }
        })
    }

    fn discovery_callback(this: &Arc<Self>) -> DiscoveryCallback {
        let weak = Arc::downgrade(this);
        Arc::new(move |candidate| {
            if let Some(inner) = weak.upgrade() {
                CoordinatorInner::on_candidate(&inner, candidate);
            }
        })
    }

    /// 发起发现请求；`host` 为 `None` 表示组播扫描。
    fn request_discovery(this: &Arc<Self>, binding: &Binding, host: Option<&str>) -> Result<()> {
        debug!(host = host.unwrap_or("multicast"), query = %binding.query, "discovery requested");
        binding.platform.discovery.discover(
            host,
            &binding.query,
            binding.config.connectivity,
            Self::discovery_callback(this),
        )
    }

    /// 存活事件处理：通告类触发定向发现，其余只记录。
    ///
    /// - **契约 (What)**：运行在协作方的执行上下文中，任何失败都不得向外传播。
    fn on_presence(self: Arc<Self>, result: PresenceResult, sequence: u32, address: &str) {
        if self.registry.is_stopping() {
            trace!(?result, sequence, address, "presence ignored while stopping");
            return;
        }

        match result.class() {
            PresenceClass::Announcing => {
                let Some(binding) = self.binding() else {
                    return;
                };
                debug!(?result, sequence, address, "presence announcement");
                if let Err(err) = Self::request_discovery(&self, &binding, Some(address)) {
                    warn!(
                        address,
                        code = err.code(),
                        error = %err,
                        "targeted discovery failed"
                    );
                }
            }
            PresenceClass::Departure => {
                // TODO: 按源地址驱逐过期镜像，需要注册表提供按地址的批量移除。
                debug!(?result, sequence, address, "presence departure");
            }
            PresenceClass::Ignored => {
                trace!(?result, sequence, address, "presence ignored");
            }
        }
    }

    /// 发现候选处理：标签过滤 → 去重 → 构造并插入镜像 → 锁外激活。
    fn on_candidate(this: &Arc<Self>, candidate: RemoteResourceDescriptor) {
        if !candidate.is_hostable() {
            trace!(
                address = candidate.address(),
                uri = candidate.uri(),
                "candidate dropped: not tagged for hosting"
            );
            return;
        }
        let Some(binding) = this.binding() else {
            return;
        };

        let key = binding.config.dedup_key(&candidate);
        let on_terminate = {
            let weak: Weak<Self> = Arc::downgrade(this);
            let key = key.clone();
            move |id: MirrorId| {
                if let Some(inner) = weak.upgrade() {
                    inner.remove_mirror(&key, id);
                }
            }
        };

        let address = candidate.address().to_owned();
        let uri = candidate.uri().to_owned();
        let observable = candidate.is_observable();
        match this.registry.admit(key, move |id| {
            MirrorObject::initialize(id, candidate, on_terminate)
        }) {
            Admission::Admitted(mirror) => {
                info!(mirror_id = %mirror.id(), %address, %uri, observable, "resource hosted");
                mirror.activate(Arc::clone(&binding.platform.origin), &binding.platform.runtime);
            }
            Admission::AlreadyHosted(id) => {
                trace!(mirror_id = %id, %address, %uri, "candidate dropped: already hosted");
            }
            Admission::Stopping => {
                debug!(%address, %uri, "candidate dropped: hosting is stopping");
            }
        }
    }

    /// 移除入口：镜像终止回调经由此处离开注册表，重复调用为空操作。
    fn remove_mirror(&self, key: &DedupKey, id: MirrorId) {
        if self.registry.remove(key, id).is_some() {
            info!(mirror_id = %id, address = key.address(), uri = key.uri(), "mirror released");
        } else {
            trace!(mirror_id = %id, "mirror already released");
        }
    }
}

fn release_subscription(mut subscription: Box<dyn PresenceSubscription>) {
    if !subscription.is_subscribed() {
        return;
    }
    if let Err(err) = subscription.unsubscribe() {
        warn!(code = err.code(), error = %err, "presence unsubscribe failed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use hosting_core::{ConnectivityScope, OriginWatch};

    use super::*;

    struct SilentPresence;

    struct NoopSubscription;

    impl PresenceSubscription for NoopSubscription {
        fn is_subscribed(&self) -> bool {
            false
        }

        fn unsubscribe(&mut self) -> Result<()> {
            Ok(())
        }
    }

    impl PresenceChannel for SilentPresence {
        fn subscribe(
            &self,
            _address: &str,
            _scope: ConnectivityScope,
            _callback: PresenceCallback,
        ) -> Result<Box<dyn PresenceSubscription>> {
            Ok(Box::new(NoopSubscription))
        }
    }

    #[derive(Default)]
    struct CountingDiscovery {
        calls: AtomicUsize,
    }

    impl DiscoveryService for CountingDiscovery {
        fn discover(
            &self,
            _host: Option<&str>,
            _query: &str,
            _scope: ConnectivityScope,
            _callback: DiscoveryCallback,
        ) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct PendingOrigin;

    #[async_trait]
    impl OriginMonitor for PendingOrigin {
        async fn watch(&self, _descriptor: &RemoteResourceDescriptor) -> Result<OriginWatch> {
            Ok(Box::pin(futures::stream::pending()))
        }
    }

    fn attached(runtime: &tokio::runtime::Runtime) -> HostingCoordinator {
        let coordinator = HostingCoordinator::new();
        coordinator
            .attach(
                HostingPlatform::new(
                    Arc::new(SilentPresence),
                    Arc::new(CountingDiscovery::default()),
                    Arc::new(PendingOrigin),
                    runtime.handle().clone(),
                ),
                HostingConfig::default(),
            )
            .expect("默认配置合法");
        coordinator
    }

    #[test]
    fn termination_after_forced_teardown_is_noop() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        let coordinator = attached(&runtime);
        let candidate = RemoteResourceDescriptor::new("node-5683", "/a/light/hosting");
        CoordinatorInner::on_candidate(&coordinator.inner, candidate.clone());
        let mirror = coordinator.hosted_mirrors().pop().expect("应已托管");
        let key = HostingConfig::default().dedup_key(&candidate);

        coordinator.stop_hosting();
        assert_eq!(coordinator.hosted_count(), 0);

        coordinator.inner.remove_mirror(&key, mirror.id());
        coordinator.inner.remove_mirror(&key, mirror.id());
        assert_eq!(coordinator.hosted_count(), 0);
    }

    #[test]
    fn removal_entry_point_is_idempotent() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        let coordinator = attached(&runtime);
        let first = RemoteResourceDescriptor::new("node-1", "/a/light/hosting");
        let second = RemoteResourceDescriptor::new("node-2", "/a/light/hosting");
        CoordinatorInner::on_candidate(&coordinator.inner, first.clone());
        CoordinatorInner::on_candidate(&coordinator.inner, second);

        let key = HostingConfig::default().dedup_key(&first);
        let id = coordinator
            .hosted_mirrors()
            .into_iter()
            .find(|mirror| mirror.remote_descriptor().address() == "node-1")
            .map(|mirror| mirror.id())
            .expect("node-1 应已托管");

        coordinator.inner.remove_mirror(&key, id);
        let once = coordinator.hosted_descriptors();
        coordinator.inner.remove_mirror(&key, id);
        assert_eq!(coordinator.hosted_descriptors(), once);
        assert_eq!(once.len(), 1);
    }

    #[test]
    fn detached_coordinator_refuses_to_start() {
        let coordinator = HostingCoordinator::new();
        let err = coordinator.start_hosting().expect_err("未绑定平台不能启动");
        assert_eq!(err, HostingError::NotAttached);
        assert_eq!(err.kind(), hosting_core::HostingErrorKind::Generic);
        assert_eq!(coordinator.hosted_count(), 0);
    }
}
