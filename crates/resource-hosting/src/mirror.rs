//! # 镜像对象（MirrorObject）
//!
//! ## 核心意图（Why）
//! - 一个镜像对象代表某个远端资源在本节点上的活动镜像：源端休眠或暂时不可达时，
//!   由镜像继续向客户端提供最近一次同步到的状态；
//! - 镜像一旦激活便独立于协调器运行，在源端丢失时自行终止并通知协调器。
//!
//! ## 生命周期（What）
//! - `Created`（准入时构造）→ `Active`（同步任务已派生）→ `Terminated`（自我终止或被强制拆除）；
//! - `Terminated` 为吸收态，任何路径都不会离开；
//! - 终止回调至多触发一次：自我终止路径触发它，强制拆除路径直接丢弃它。
//!
//! ## 实现策略（How）
//! - 生命周期状态、终止回调与停止信号放在同一把锁内，状态跃迁与回调摘取是原子的；
//! - 同步任务用 `tokio::select!` 在“停止信号”与“源端事件流”之间竞赛；
//! - 终止回调在锁外调用，回调回到协调器时不会与本对象的锁形成嵌套。

use std::{fmt, sync::Arc};

use futures_util::StreamExt;
use hosting_core::{
    HostingError, OriginEvent, OriginMonitor, OriginState, RemoteResourceDescriptor,
    ResourceAttributes, mirror_uri_of,
};
use parking_lot::{Mutex, RwLock};
use tokio::{runtime::Handle, sync::oneshot};
use tracing::{debug, info, warn};

/// 镜像对象在进程内的唯一标识。
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MirrorId(u64);

impl MirrorId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for MirrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mirror-{}", self.0)
    }
}

/// 镜像生命周期状态。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MirrorState {
    Created,
    Active,
    Terminated,
}

impl MirrorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, MirrorState::Terminated)
    }
}

/// 自我终止的原因，仅用于日志。
#[derive(Clone, Debug, PartialEq)]
pub enum TerminationCause {
    /// 源端失联或被移除。
    OriginLost(OriginState),
    /// 源端事件流报告不可恢复故障。
    Fault(String),
    /// 无法打开源端事件流。
    WatchFailed(HostingError),
    /// 源端事件流提前结束。
    StreamEnded,
    /// 同步任务未运行到结束就被丢弃，例如所在运行时已关闭。
    Abandoned,
}

impl fmt::Display for TerminationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationCause::OriginLost(state) => write!(f, "origin lost ({state:?})"),
            TerminationCause::Fault(reason) => write!(f, "synchronization fault: {reason}"),
            TerminationCause::WatchFailed(err) => write!(f, "watch failed: {err}"),
            TerminationCause::StreamEnded => f.write_str("origin stream ended"),
            TerminationCause::Abandoned => f.write_str("synchronization task dropped"),
        }
    }
}

/// 本地镜像对外呈现的状态。
///
/// - `uri`：去掉托管标签后的服务 URI；
/// - `revision`：每收到一次属性快照自增，首个快照为 1。
#[derive(Clone, Debug, PartialEq)]
pub struct MirrorSnapshot {
    pub uri: String,
    pub resource_types: Vec<String>,
    pub interfaces: Vec<String>,
    pub attributes: ResourceAttributes,
    pub revision: u64,
}

type TerminationCallback = Box<dyn FnOnce(MirrorId) + Send + 'static>;

struct Lifecycle {
    state: MirrorState,
    on_terminate: Option<TerminationCallback>,
    stop: Option<oneshot::Sender<()>>,
}

/// 一个远端资源的活动镜像。
///
/// # 教案式说明
/// - **意图 (Why)**：把“与源端同步”的全部资源（事件流、本地快照、后台任务）收拢到一个对象上，
///   协调器只需持有 `Arc<MirrorObject>` 并在需要时拆除；
/// - **契约 (What)**：
///   - [`initialize`](Self::initialize) 绑定唯一描述符与一次性终止回调；
///   - [`activate`](Self::activate) 在调用方提供的运行时上派生同步任务，只对 `Created` 状态生效；
///   - [`teardown`](Self::teardown) 可在任意状态下安全调用，且从不触发终止回调；
/// - **风险 (Trade-offs)**：若源端事件流永不结束且从不报告丢失，镜像只能由强制拆除回收。
pub struct MirrorObject {
    id: MirrorId,
    descriptor: RemoteResourceDescriptor,
    lifecycle: Mutex<Lifecycle>,
    snapshot: RwLock<Option<MirrorSnapshot>>,
}

impl MirrorObject {
    /// 绑定描述符与终止回调，构造处于 `Created` 状态的镜像。
    ///
    /// - **契约 (What)**：只做内存分配，可在注册表锁内调用；`on_terminate` 收到本镜像的标识。
    pub fn initialize<F>(
        id: MirrorId,
        descriptor: RemoteResourceDescriptor,
        on_terminate: F,
    ) -> Arc<Self>
    where
        F: FnOnce(MirrorId) + Send + 'static,
    {
        Arc::new(Self {
            id,
            descriptor,
            lifecycle: Mutex::new(Lifecycle {
                state: MirrorState::Created,
                on_terminate: Some(Box::new(on_terminate)),
                stop: None,
            }),
            snapshot: RwLock::new(None),
        })
    }

    pub fn id(&self) -> MirrorId {
        self.id
    }

    /// 绑定的远端描述符，供协调器去重查找。
    pub fn remote_descriptor(&self) -> &RemoteResourceDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> MirrorState {
        self.lifecycle.lock().state
    }

    /// 本地镜像的最新快照；尚未收到源端属性或已终止时为 `None`。
    pub fn snapshot(&self) -> Option<MirrorSnapshot> {
        self.snapshot.read().clone()
    }

    /// 派生同步任务，`Created → Active`。
    ///
    /// # 教案式注释
    /// - **前置条件**：调用方不持有注册表锁；
    /// - **执行 (How)**：在生命周期锁内完成状态跃迁并登记停止信号，随后在锁外派生任务；
    ///   若在此之前已被强制拆除，则直接返回 `false`；
    /// - **后置条件**：返回 `true` 表示任务已提交给运行时；运行时已关闭时任务会被立即丢弃，
    ///   镜像随之以 [`TerminationCause::Abandoned`] 自我终止。
    pub fn activate(self: &Arc<Self>, origin: Arc<dyn OriginMonitor>, runtime: &Handle) -> bool {
        let stop = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != MirrorState::Created {
                return false;
            }
            let (tx, rx) = oneshot::channel();
            lifecycle.stop = Some(tx);
            lifecycle.state = MirrorState::Active;
            rx
        };

        debug!(mirror_id = %self.id, uri = self.descriptor.uri(), "mirror activated");
        runtime.spawn(synchronize(TaskGuard(Arc::clone(self)), origin, stop));
        true
    }

    /// 强制拆除：跃迁到 `Terminated`，丢弃终止回调并通知同步任务退出。
    ///
    /// - **契约 (What)**：无论终止回调是否已经触发都可以安全调用；返回本次调用是否完成了跃迁。
    pub fn teardown(&self) -> bool {
        let (callback, stop) = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state.is_terminal() {
                return false;
            }
            lifecycle.state = MirrorState::Terminated;
            (lifecycle.on_terminate.take(), lifecycle.stop.take())
        };
        drop(callback);
        if let Some(stop) = stop {
            let _ = stop.send(());
        }
        self.snapshot.write().take();
        debug!(mirror_id = %self.id, uri = self.descriptor.uri(), "mirror torn down");
        true
    }

    /// 自我终止：跃迁到 `Terminated` 并恰好一次地触发终止回调。
    fn terminate(&self, cause: TerminationCause) {
        let callback = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state.is_terminal() {
                return;
            }
            lifecycle.state = MirrorState::Terminated;
            lifecycle.stop = None;
            lifecycle.on_terminate.take()
        };

        info!(
            mirror_id = %self.id,
            address = self.descriptor.address(),
            uri = self.descriptor.uri(),
            %cause,
            "mirror terminated"
        );
        if let Some(callback) = callback {
            callback(self.id);
        }
    }

    fn publish(&self, attributes: ResourceAttributes) {
        let mut snapshot = self.snapshot.write();
        // 在快照写锁内检查状态，拆除路径随后的清空不会被覆盖。
        if self.state().is_terminal() {
            return;
        }
        match snapshot.as_mut() {
            Some(current) => {
                current.attributes = attributes;
                current.revision += 1;
            }
            None => {
                let uri = mirror_uri_of(self.descriptor.uri())
                    .unwrap_or(self.descriptor.uri())
                    .to_owned();
                debug!(mirror_id = %self.id, mirror_uri = %uri, "mirror published");
                *snapshot = Some(MirrorSnapshot {
                    uri,
                    resource_types: self.descriptor.resource_types().to_vec(),
                    interfaces: self.descriptor.interfaces().to_vec(),
                    attributes,
                    revision: 1,
                });
            }
        }
    }
}

/// 同步任务持有的镜像引用。
///
/// - **契约 (What)**：随任务 future 一起被丢弃；若此时镜像尚未终止，按 [`TerminationCause::Abandoned`]
///   走自我终止路径。正常退出时镜像已处于终止态，这里是空操作。
struct TaskGuard(Arc<MirrorObject>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.terminate(TerminationCause::Abandoned);
        self.0.snapshot.write().take();
    }
}

async fn synchronize(
    guard: TaskGuard,
    origin: Arc<dyn OriginMonitor>,
    mut stop: oneshot::Receiver<()>,
) {
    let mirror = &guard.0;
    let opened = tokio::select! {
        _ = &mut stop => return,
        opened = origin.watch(&mirror.descriptor) => opened,
    };
    let mut watch = match opened {
        Ok(watch) => watch,
        Err(err) => {
            warn!(mirror_id = %mirror.id, code = err.code(), error = %err, "origin watch failed");
            mirror.terminate(TerminationCause::WatchFailed(err));
            return;
        }
    };

    loop {
        let event = tokio::select! {
            _ = &mut stop => break,
            event = watch.next() => event,
        };
        match event {
            Some(OriginEvent::Attributes(attributes)) => mirror.publish(attributes),
            Some(OriginEvent::State(state)) if state.is_lost() => {
                mirror.terminate(TerminationCause::OriginLost(state));
                break;
            }
            Some(OriginEvent::State(state)) => {
                debug!(mirror_id = %mirror.id, ?state, "origin state");
            }
            Some(OriginEvent::Fault(reason)) => {
                mirror.terminate(TerminationCause::Fault(reason));
                break;
            }
            None => {
                mirror.terminate(TerminationCause::StreamEnded);
                break;
            }
        }
    }
    drop(watch);
}

impl fmt::Debug for MirrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorObject")
            .field("id", &self.id)
            .field("address", &self.descriptor.address())
            .field("uri", &self.descriptor.uri())
            .field("state", &self.state())
            .finish()
    }
}
