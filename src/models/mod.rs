//! Core data models for the application
//!
//! This module contains the primary data structures used throughout the application,
//! separated from the logic that operates on them.
//!
//! # Usage
//!
//! ```rust
//! use subforge::models::{Node, ProtocolOptions, ProxyType};
//!
//! let node = Node::new(
//!     "tokyo-01",
//!     "example.com",
//!     8388,
//!     ProtocolOptions::Shadowsocks {
//!         cipher: "aes-256-gcm".to_string(),
//!         password: "secret".to_string(),
//!     },
//! );
//! assert_eq!(node.proxy_type(), ProxyType::Shadowsocks);
//! assert_eq!(node.identity().credential, "secret");
//! ```

pub mod configs;
pub mod proxy;
pub mod proxy_group_config;
pub mod test_result;

pub use configs::{ClashConfig, BUILTIN_POLICIES};
pub use proxy::*;
pub use proxy_group_config::{ProxyGroup, ProxyGroupType};
pub use test_result::{DelayPhase, ProxyTestResult, MAX_STD_DEV, MIN_SUCCESS_RATE};
