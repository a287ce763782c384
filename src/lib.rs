//! 入站与客户端一致性及流量管理引擎
//!
//! 入站配置内嵌客户端列表（settings JSON 文档），本库负责让
//! client_traffic 统计表与文档保持一致，并承接节点的流量上报、
//! 配额与有效期管控。

pub mod config;
pub mod entity;
pub mod error;
pub mod inbound_manager;
pub mod migration;
pub mod settings;
pub mod traffic;
pub mod traffic_limiter;

#[cfg(test)]
pub(crate) mod test_util;

pub use error::{Error, Result};
pub use inbound_manager::InboundManager;
pub use settings::{ClientDiff, ClientSetting};
pub use traffic::{ClientTrafficReport, TrafficReport};
