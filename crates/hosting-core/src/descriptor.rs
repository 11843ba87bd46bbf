//! # 远端资源描述（RemoteResourceDescriptor）
//!
//! ## 核心意图（Why）
//! - 发现服务每次回调交付一个候选资源，托管协调器据此完成标签过滤与去重；
//! - 描述符是镜像对象唯一绑定的输入，生命周期内不可变。
//!
//! ## 行为契约（What）
//! - 托管身份默认由 `(address, uri)` 决定；`instance_id` 字段存在但是否参与去重由上层策略决定；
//! - [`is_hostable_uri`] 是准入的权威判定：URI 必须以 [`HOSTING_TAG`] 精确结尾（区分大小写）；
//! - [`mirror_uri_of`] 去掉托管标签，得到本地镜像对外服务的 URI。

use serde::{Deserialize, Serialize};

/// 源端标记“可托管”资源所用的 URI 后缀。
pub const HOSTING_TAG: &str = "/hosting";

/// 连接作用域，对应协议栈的连通性类型。
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityScope {
    /// 交由协议栈选择全部可用适配器。
    #[default]
    Default,
    /// 仅 IP 适配器。
    Ip,
    /// 仅 BLE GATT 适配器。
    Ble,
    /// 仅蓝牙 RFCOMM 适配器。
    Rfcomm,
}

/// 一个远端资源的描述。
///
/// # 教案式说明
/// - **意图 (Why)**：把传输地址、URI、类型标签与可观察标志集中在一个值类型中，
///   便于跨回调上下文以所有权方式传递；
/// - **契约 (What)**：
///   - `address`：源端传输地址字符串，例如 `"coap://192.168.0.7:5683"`；
///   - `uri`：资源路径，例如 `"/a/light/hosting"`；
///   - `resource_types` / `interfaces`：源端通告的类型与接口标签；
///   - `observable`：源端是否支持观察；
///   - `instance_id`：资源实例标识，可选；
/// - **风险 (Trade-offs)**：派生的 `PartialEq` 比较全部字段，托管去重请使用
///   [`same_resource`](Self::same_resource) 或上层的去重键，而非 `==`。
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RemoteResourceDescriptor {
    address: String,
    uri: String,
    #[serde(default)]
    resource_types: Vec<String>,
    #[serde(default)]
    interfaces: Vec<String>,
    #[serde(default)]
    observable: bool,
    #[serde(default)]
    instance_id: Option<String>,
}

impl RemoteResourceDescriptor {
    /// 以地址与 URI 构造描述符，其余字段取空值。
    pub fn new(address: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            uri: uri.into(),
            resource_types: Vec::new(),
            interfaces: Vec::new(),
            observable: false,
            instance_id: None,
        }
    }

    /// 追加资源类型标签。
    #[must_use]
    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_types.push(resource_type.into());
        self
    }

    /// 追加接口标签。
    #[must_use]
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// 设置可观察标志。
    #[must_use]
    pub fn with_observable(mut self, observable: bool) -> Self {
        self.observable = observable;
        self
    }

    /// 设置资源实例标识。
    #[must_use]
    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn resource_types(&self) -> &[String] {
        &self.resource_types
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn is_observable(&self) -> bool {
        self.observable
    }

    pub fn instance_id(&self) -> Option<&str> {
        self.instance_id.as_deref()
    }

    /// 是否携带托管标签。
    pub fn is_hostable(&self) -> bool {
        is_hostable_uri(&self.uri)
    }

    /// 判断两个描述符是否指向同一远端资源：地址相同且 URI 相同。
    ///
    /// - **契约 (What)**：不比较 `instance_id`；需要纳入实例标识时由调用方自行扩展比较。
    pub fn same_resource(&self, other: &Self) -> bool {
        self.address == other.address && self.uri == other.uri
    }
}

/// URI 是否以托管标签结尾。
///
/// # 教案式说明
/// - **契约 (What)**：精确、区分大小写的后缀匹配；长度不足标签长度的 URI 直接判否，不会越界；
/// - **注意 (Trade-offs)**：`"/hosting"` 本身也满足条件，此时镜像 URI 退化为空串，由调用方决定是否接受。
pub fn is_hostable_uri(uri: &str) -> bool {
    uri.ends_with(HOSTING_TAG)
}

/// 去掉托管标签后得到本地镜像 URI；未携带标签时返回 `None`。
pub fn mirror_uri_of(uri: &str) -> Option<&str> {
    uri.strip_suffix(HOSTING_TAG)
}
