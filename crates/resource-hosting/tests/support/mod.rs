//! 集成测试共享的协作方替身。
//!
//! # 教案级导览
//! - **Why**：协调器的全部输入都来自外部协作方回调，测试需要能够在任意时刻、任意线程上
//!   “扮演”存活通道与发现服务，并逐条脚本化源端事件；
//! - **How**：替身只记录调用并保存回调，由测试显式触发；源端事件流使用 `futures` 无界通道，
//!   发送端由测试持有；
//! - **What**：所有替身均可跨线程共享，记录内容通过快照方法读取。

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::channel::mpsc::{UnboundedSender, unbounded};
use parking_lot::Mutex;
use resource_hosting::{
    HostingConfig, HostingCoordinator, HostingPlatform,
    hosting_core::{
        ConnectivityScope, DiscoveryCallback, DiscoveryService, HostingError, OriginEvent,
        OriginMonitor, OriginWatch, PresenceCallback, PresenceChannel, PresenceResult,
        PresenceSubscription, RemoteResourceDescriptor, Result,
    },
};

/// 存活通道替身：保存最近一次订阅的回调，统计退订次数。
#[derive(Default)]
pub struct RecordingPresence {
    subscriptions: Mutex<Vec<(String, ConnectivityScope)>>,
    callback: Mutex<Option<PresenceCallback>>,
    failure: Mutex<Option<HostingError>>,
    unsubscribes: Arc<AtomicUsize>,
}

impl RecordingPresence {
    pub fn fail_with(&self, err: HostingError) {
        *self.failure.lock() = Some(err);
    }

    pub fn subscriptions(&self) -> Vec<(String, ConnectivityScope)> {
        self.subscriptions.lock().clone()
    }

    pub fn unsubscribes(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    /// 以协作方身份投递一条存活事件。
    pub fn announce(&self, result: PresenceResult, sequence: u32, address: &str) {
        let callback = self.callback.lock().clone();
        if let Some(callback) = callback {
            callback(result, sequence, address);
        }
    }
}

struct RecordingSubscription {
    subscribed: AtomicBool,
    unsubscribes: Arc<AtomicUsize>,
}

impl PresenceSubscription for RecordingSubscription {
    fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }

    fn unsubscribe(&mut self) -> Result<()> {
        if self.subscribed.swap(false, Ordering::SeqCst) {
            self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl PresenceChannel for RecordingPresence {
    fn subscribe(
        &self,
        address: &str,
        scope: ConnectivityScope,
        callback: PresenceCallback,
    ) -> Result<Box<dyn PresenceSubscription>> {
        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }
        self.subscriptions.lock().push((address.to_owned(), scope));
        *self.callback.lock() = Some(callback);
        Ok(Box::new(RecordingSubscription {
            subscribed: AtomicBool::new(true),
            unsubscribes: Arc::clone(&self.unsubscribes),
        }))
    }
}

/// 一次发现请求的记录。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiscoveryRequest {
    pub host: Option<String>,
    pub query: String,
    pub scope: ConnectivityScope,
}

/// 发现服务替身：记录请求并保存每个请求独立绑定的回调。
#[derive(Default)]
pub struct RecordingDiscovery {
    requests: Mutex<Vec<(DiscoveryRequest, DiscoveryCallback)>>,
    failure: Mutex<Option<HostingError>>,
}

impl RecordingDiscovery {
    pub fn fail_with(&self, err: HostingError) {
        *self.failure.lock() = Some(err);
    }

    pub fn recover(&self) {
        self.failure.lock().take();
    }

    pub fn requests(&self) -> Vec<DiscoveryRequest> {
        self.requests
            .lock()
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    /// 通过第 `index` 个请求绑定的回调交付一个候选。
    pub fn respond(&self, index: usize, candidate: RemoteResourceDescriptor) {
        let callback = self.requests.lock()[index].1.clone();
        callback(candidate);
    }

    /// 通过最近一次请求的回调交付一个候选。
    pub fn respond_last(&self, candidate: RemoteResourceDescriptor) {
        let index = self.requests.lock().len() - 1;
        self.respond(index, candidate);
    }
}

impl DiscoveryService for RecordingDiscovery {
    fn discover(
        &self,
        host: Option<&str>,
        query: &str,
        scope: ConnectivityScope,
        callback: DiscoveryCallback,
    ) -> Result<()> {
        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }
        self.requests.lock().push((
            DiscoveryRequest {
                host: host.map(str::to_owned),
                query: query.to_owned(),
                scope,
            },
            callback,
        ));
        Ok(())
    }
}

/// 源端监视替身：每次 `watch` 建立一条由测试驱动的事件流。
#[derive(Default)]
pub struct ScriptedOrigin {
    streams: Mutex<HashMap<(String, String), UnboundedSender<OriginEvent>>>,
    failure: Mutex<Option<HostingError>>,
    opened: AtomicUsize,
}

impl ScriptedOrigin {
    pub fn fail_with(&self, err: HostingError) {
        *self.failure.lock() = Some(err);
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn is_watching(&self, address: &str, uri: &str) -> bool {
        self.streams
            .lock()
            .get(&(address.to_owned(), uri.to_owned()))
            .is_some_and(|sender| !sender.is_closed())
    }

    /// 向指定资源的事件流推送事件；流不存在或已关闭时返回 `false`。
    pub fn push(&self, address: &str, uri: &str, event: OriginEvent) -> bool {
        self.streams
            .lock()
            .get(&(address.to_owned(), uri.to_owned()))
            .is_some_and(|sender| sender.unbounded_send(event).is_ok())
    }

    /// 结束指定资源的事件流。
    pub fn close(&self, address: &str, uri: &str) {
        if let Some(sender) = self
            .streams
            .lock()
            .remove(&(address.to_owned(), uri.to_owned()))
        {
            sender.close_channel();
        }
    }
}

#[async_trait]
impl OriginMonitor for ScriptedOrigin {
    async fn watch(&self, descriptor: &RemoteResourceDescriptor) -> Result<OriginWatch> {
        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }
        let (tx, rx) = unbounded();
        self.streams.lock().insert(
            (descriptor.address().to_owned(), descriptor.uri().to_owned()),
            tx,
        );
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::pin(rx))
    }
}

/// 一组已绑定到协调器的替身。
pub struct Harness {
    pub coordinator: HostingCoordinator,
    pub presence: Arc<RecordingPresence>,
    pub discovery: Arc<RecordingDiscovery>,
    pub origin: Arc<ScriptedOrigin>,
}

impl Harness {
    /// 在当前 Tokio 运行时上以默认配置构造。
    pub fn new() -> Self {
        Self::with_config(HostingConfig::default())
    }

    pub fn with_config(config: HostingConfig) -> Self {
        let presence = Arc::new(RecordingPresence::default());
        let discovery = Arc::new(RecordingDiscovery::default());
        let origin = Arc::new(ScriptedOrigin::default());
        let harness = Self {
            coordinator: HostingCoordinator::new(),
            presence,
            discovery,
            origin,
        };
        harness
            .coordinator
            .attach(harness.platform(), config)
            .expect("测试配置必须合法");
        harness
    }

    /// 以同一组替身构造平台，用于重新绑定。
    pub fn platform(&self) -> HostingPlatform {
        HostingPlatform::new(
            self.presence.clone(),
            self.discovery.clone(),
            self.origin.clone(),
            tokio::runtime::Handle::current(),
        )
    }

    /// 启动托管并断言成功。
    pub fn started() -> Self {
        let harness = Self::new();
        harness.coordinator.start_hosting().expect("启动托管");
        harness
    }
}

pub fn hostable(address: &str, uri: &str) -> RemoteResourceDescriptor {
    RemoteResourceDescriptor::new(address, uri)
        .with_resource_type("oic.r.light")
        .with_interface("oic.if.baseline")
        .with_observable(true)
}

/// 轮询直到条件成立，超时返回 `false`。
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
