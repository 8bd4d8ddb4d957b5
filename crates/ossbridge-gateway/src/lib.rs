#![warn(missing_docs)]

//! ossbridge gateway: OSS REST endpoint over a Swift backend with Keystone-style identity exchange

pub mod access_log;
pub mod acl;
pub mod acl_ops;
pub mod backend;
pub mod bucket_ops;
pub mod config;
pub mod credentials;
pub mod error;
pub mod error_map;
pub mod gateway;
pub mod keystone;
pub mod listing;
pub mod metadata;
pub mod object_ops;
pub mod oss_error;
pub mod oss_xml;
pub mod range;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod service_ops;
pub mod swift_client;

#[cfg(test)]
mod testing;

pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use gateway::Gateway;
pub use oss_error::{ErrorCode, OssError, OssResult};
