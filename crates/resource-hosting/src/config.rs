//! # 托管配置（HostingConfig）
//!
//! ## 核心意图（Why）
//! - 协调器的组播存活地址、发现路径与类型过滤参数在不同部署中可能不同，集中成一个可反序列化的
//!   结构，避免散落的字符串常量；
//! - 去重是否纳入资源实例标识是一个显式的配置选择，而不是隐藏在比较函数里的注释。
//!
//! ## 行为契约（What）
//! - 所有字段都有默认值，TOML 中缺省的字段取 [`HostingConfig::default`]；
//! - 未知字段会被拒绝，避免拼写错误悄悄失效；
//! - 解析或校验失败统一返回 [`HostingError::InvalidArgument`]。

use hosting_core::{ConnectivityScope, HostingError, RemoteResourceDescriptor, Result};
use serde::Deserialize;

/// 默认组播存活地址。
pub const DEFAULT_PRESENCE_ADDRESS: &str = "coap://224.0.1.187:5683";
/// 默认发现路径。
pub const DEFAULT_DISCOVERY_URI: &str = "/oic/res";
/// 默认托管资源类型过滤值。
pub const DEFAULT_RESOURCE_TYPE: &str = "Resource.Hosting";

/// 去重策略。
///
/// # 教案式说明
/// - **意图 (Why)**：源端描述符携带资源实例标识，但历史行为只按 `(地址, URI)` 去重；
///   该字段是否参与比较必须显式选择；
/// - **契约 (What)**：
///   - [`DedupPolicy::AddressAndUri`]（默认）：实例标识不同但地址与 URI 相同的候选合并为一个镜像；
///   - [`DedupPolicy::AddressUriAndInstance`]：实例标识也参与比较，缺失的实例标识视为相等的“空”值。
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    #[default]
    AddressAndUri,
    AddressUriAndInstance,
}

impl DedupPolicy {
    /// 是否将实例标识纳入去重键。
    pub fn includes_instance(self) -> bool {
        matches!(self, DedupPolicy::AddressUriAndInstance)
    }
}

/// 托管协调器配置。
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HostingConfig {
    /// 存活订阅地址。
    pub presence_address: String,
    /// 发现查询路径，必须以 `/` 开头。
    pub discovery_uri: String,
    /// 发现查询的 `rt` 过滤值。
    pub resource_type: String,
    /// 订阅与发现使用的连接作用域。
    pub connectivity: ConnectivityScope,
    /// 候选去重策略。
    pub dedup_policy: DedupPolicy,
}

impl Default for HostingConfig {
    fn default() -> Self {
        Self {
            presence_address: DEFAULT_PRESENCE_ADDRESS.to_owned(),
            discovery_uri: DEFAULT_DISCOVERY_URI.to_owned(),
            resource_type: DEFAULT_RESOURCE_TYPE.to_owned(),
            connectivity: ConnectivityScope::Default,
            dedup_policy: DedupPolicy::AddressAndUri,
        }
    }
}

impl HostingConfig {
    /// 从 TOML 文本解析并校验配置。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：解析失败与校验失败均返回 [`HostingError::InvalidArgument`]，
    ///   `detail` 保留 `toml` 给出的位置信息；
    /// - **前置条件**：文本为 UTF-8，允许为空串（全部取默认值）。
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: HostingConfig = toml::from_str(text)
            .map_err(|err| HostingError::invalid_argument(format!("hosting config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// 校验字段取值。
    pub fn validate(&self) -> Result<()> {
        if self.presence_address.trim().is_empty() {
            return Err(HostingError::invalid_argument(
                "presence_address must not be empty",
            ));
        }
        if !self.discovery_uri.starts_with('/') {
            return Err(HostingError::invalid_argument(format!(
                "discovery_uri `{}` must start with `/`",
                self.discovery_uri
            )));
        }
        if self.resource_type.trim().is_empty() {
            return Err(HostingError::invalid_argument(
                "resource_type must not be empty",
            ));
        }
        Ok(())
    }

    /// 发现请求使用的带类型过滤参数的路径，例如 `/oic/res?rt=Resource.Hosting`。
    pub fn discovery_query(&self) -> String {
        format!("{}?rt={}", self.discovery_uri, self.resource_type)
    }

    /// 按当前去重策略为描述符构造去重键。
    pub fn dedup_key(&self, descriptor: &RemoteResourceDescriptor) -> crate::registry::DedupKey {
        crate::registry::DedupKey::new(descriptor, self.dedup_policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = HostingConfig::from_toml_str("").expect("空文档应取默认值");
        assert_eq!(config, HostingConfig::default());
        assert_eq!(config.discovery_query(), "/oic/res?rt=Resource.Hosting");
    }

    #[test]
    fn partial_document_overrides_named_fields() {
        let config = HostingConfig::from_toml_str(
            r#"
                presence_address = "coap://[ff02::158]:5683"
                connectivity = "ip"
                dedup_policy = "address_uri_and_instance"
            "#,
        )
        .expect("合法配置");
        assert_eq!(config.presence_address, "coap://[ff02::158]:5683");
        assert_eq!(config.connectivity, ConnectivityScope::Ip);
        assert!(config.dedup_policy.includes_instance());
        assert_eq!(config.resource_type, DEFAULT_RESOURCE_TYPE);
    }

    #[test]
    fn unknown_fields_and_bad_values_are_invalid_arguments() {
        let unknown = HostingConfig::from_toml_str("hosting_tag = \"/x\"").unwrap_err();
        assert_eq!(unknown.kind(), hosting_core::HostingErrorKind::InvalidArgument);

        let relative = HostingConfig::from_toml_str("discovery_uri = \"oic/res\"").unwrap_err();
        assert!(matches!(relative, HostingError::InvalidArgument { .. }));

        let blank = HostingConfig::from_toml_str("presence_address = \"  \"").unwrap_err();
        assert!(matches!(blank, HostingError::InvalidArgument { .. }));
    }
}
