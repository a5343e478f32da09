//! Proxy node model
//!
//! A [`Node`] keeps the protocol-specific credentials in a tagged
//! [`ProtocolOptions`] variant and the transport knobs in [`TransportOptions`].
//! On disk a node is a flat Clash proxy mapping (`name`, `type`, `server`,
//! `port`, credentials, transport keys); the conversion goes through
//! [`ClashProxy`].

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Protocol of a proxy node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProxyType {
    #[serde(rename = "ss")]
    Shadowsocks,
    #[serde(rename = "vmess")]
    VMess,
    #[serde(rename = "vless")]
    Vless,
    #[serde(rename = "trojan")]
    Trojan,
    #[serde(rename = "hysteria2", alias = "hy2")]
    Hysteria2,
}

impl ProxyType {
    pub const ALL: [ProxyType; 5] = [
        ProxyType::Shadowsocks,
        ProxyType::VMess,
        ProxyType::Vless,
        ProxyType::Trojan,
        ProxyType::Hysteria2,
    ];

    /// The Clash `type` value.
    pub fn as_str(self) -> &'static str {
        match self {
            ProxyType::Shadowsocks => "ss",
            ProxyType::VMess => "vmess",
            ProxyType::Vless => "vless",
            ProxyType::Trojan => "trojan",
            ProxyType::Hysteria2 => "hysteria2",
        }
    }

    /// Parses a Clash `type` value. `hy2` is accepted as an alias of `hysteria2`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ss" => Some(ProxyType::Shadowsocks),
            "vmess" => Some(ProxyType::VMess),
            "vless" => Some(ProxyType::Vless),
            "trojan" => Some(ProxyType::Trojan),
            "hysteria2" | "hy2" => Some(ProxyType::Hysteria2),
            _ => None,
        }
    }
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials and protocol parameters, one variant per supported protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolOptions {
    Shadowsocks { cipher: String, password: String },
    VMess { uuid: String, alter_id: u16, cipher: String },
    Vless { uuid: String },
    Trojan { password: String },
    Hysteria2 { password: String },
}

impl ProtocolOptions {
    pub fn proxy_type(&self) -> ProxyType {
        match self {
            ProtocolOptions::Shadowsocks { .. } => ProxyType::Shadowsocks,
            ProtocolOptions::VMess { .. } => ProxyType::VMess,
            ProtocolOptions::Vless { .. } => ProxyType::Vless,
            ProtocolOptions::Trojan { .. } => ProxyType::Trojan,
            ProtocolOptions::Hysteria2 { .. } => ProxyType::Hysteria2,
        }
    }

    /// The secret that identifies the account on the server (password or uuid).
    pub fn credential(&self) -> &str {
        match self {
            ProtocolOptions::Shadowsocks { password, .. }
            | ProtocolOptions::Trojan { password }
            | ProtocolOptions::Hysteria2 { password } => password,
            ProtocolOptions::VMess { uuid, .. } | ProtocolOptions::Vless { uuid } => uuid,
        }
    }
}

/// Transport and TLS settings shared by all protocols.
///
/// Rarely used sub-options (`ws-opts`, `client-fingerprint`, `flow`, ...) live
/// in `extra` under their Clash key so new transports need no schema change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportOptions {
    pub network: Option<String>,
    pub tls: Option<bool>,
    pub sni: Option<String>,
    pub skip_cert_verify: Option<bool>,
    pub udp: Option<bool>,
    pub extra: BTreeMap<String, Value>,
}

impl TransportOptions {
    /// Stores a `ws-opts` block with the given path and `Host` header.
    pub fn set_ws_opts(&mut self, path: &str, host: &str) {
        let mut headers = serde_yaml::Mapping::new();
        headers.insert(Value::from("Host"), Value::from(host));
        let mut opts = serde_yaml::Mapping::new();
        opts.insert(Value::from("path"), Value::from(path));
        opts.insert(Value::from("headers"), Value::Mapping(headers));
        self.extra.insert("ws-opts".to_string(), Value::Mapping(opts));
    }
}

/// Dedup identity of a node: `(server, port, type, credential)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeIdentity {
    pub server: String,
    pub port: u16,
    pub proxy_type: ProxyType,
    pub credential: String,
}

/// A proxy endpoint descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ClashProxy", try_from = "ClashProxy")]
pub struct Node {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub options: ProtocolOptions,
    pub transport: TransportOptions,
}

impl Node {
    pub fn new(name: impl Into<String>, server: impl Into<String>, port: u16, options: ProtocolOptions) -> Self {
        Node {
            name: name.into(),
            server: server.into(),
            port,
            options,
            transport: TransportOptions::default(),
        }
    }

    pub fn proxy_type(&self) -> ProxyType {
        self.options.proxy_type()
    }

    pub fn identity(&self) -> NodeIdentity {
        NodeIdentity {
            server: self.server.clone(),
            port: self.port,
            proxy_type: self.proxy_type(),
            credential: self.options.credential().to_string(),
        }
    }

    /// Builds a node from a structured Clash proxy mapping.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let record: ClashProxy = serde_yaml::from_value(value).map_err(|e| e.to_string())?;
        Node::try_from(record)
    }
}

fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    struct PortVisitor;

    impl<'de> Visitor<'de> for PortVisitor {
        type Value = u16;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a port number or a numeric string")
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u16::try_from(value).map_err(|_| E::custom(format!("port out of range: {}", value)))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u16::try_from(value).map_err(|_| E::custom(format!("port out of range: {}", value)))
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            value
                .trim()
                .parse::<u16>()
                .map_err(|_| E::custom(format!("invalid port: {}", value)))
        }
    }

    deserializer.deserialize_any(PortVisitor)
}

fn deserialize_opt_u16<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Flat Clash representation of a proxy, used for (de)serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClashProxy {
    pub name: String,
    #[serde(rename = "type")]
    pub proxy_type: String,
    pub server: String,
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cipher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Input-only alias of `password` for hysteria2
    #[serde(default, skip_serializing)]
    pub auth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(
        rename = "alterId",
        default,
        deserialize_with = "deserialize_opt_u16",
        skip_serializing_if = "Option::is_none"
    )]
    pub alter_id: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sni: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_cert_verify: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udp: Option<bool>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl From<Node> for ClashProxy {
    fn from(node: Node) -> Self {
        let proxy_type = node.proxy_type().as_str().to_string();
        let mut record = ClashProxy {
            name: node.name,
            proxy_type,
            server: node.server,
            port: node.port,
            cipher: None,
            password: None,
            auth: None,
            uuid: None,
            alter_id: None,
            network: node.transport.network,
            tls: node.transport.tls,
            sni: node.transport.sni,
            skip_cert_verify: node.transport.skip_cert_verify,
            udp: node.transport.udp,
            extra: node.transport.extra,
        };
        match node.options {
            ProtocolOptions::Shadowsocks { cipher, password } => {
                record.cipher = Some(cipher);
                record.password = Some(password);
            }
            ProtocolOptions::VMess {
                uuid,
                alter_id,
                cipher,
            } => {
                record.uuid = Some(uuid);
                record.alter_id = Some(alter_id);
                record.cipher = Some(cipher);
            }
            ProtocolOptions::Vless { uuid } => record.uuid = Some(uuid),
            ProtocolOptions::Trojan { password } => record.password = Some(password),
            ProtocolOptions::Hysteria2 { password } => record.password = Some(password),
        }
        record
    }
}

impl TryFrom<ClashProxy> for Node {
    type Error = String;

    fn try_from(record: ClashProxy) -> Result<Self, Self::Error> {
        let proxy_type = ProxyType::from_name(&record.proxy_type)
            .ok_or_else(|| format!("unsupported proxy type `{}`", record.proxy_type))?;
        let missing = |field: &str| format!("{} proxy `{}` has no {}", proxy_type, record.name, field);

        let options = match proxy_type {
            ProxyType::Shadowsocks => ProtocolOptions::Shadowsocks {
                cipher: record.cipher.clone().ok_or_else(|| missing("cipher"))?,
                password: record.password.clone().unwrap_or_default(),
            },
            ProxyType::VMess => ProtocolOptions::VMess {
                uuid: record.uuid.clone().ok_or_else(|| missing("uuid"))?,
                alter_id: record.alter_id.unwrap_or(0),
                cipher: record.cipher.clone().unwrap_or_else(|| "auto".to_string()),
            },
            ProxyType::Vless => ProtocolOptions::Vless {
                uuid: record.uuid.clone().ok_or_else(|| missing("uuid"))?,
            },
            ProxyType::Trojan => ProtocolOptions::Trojan {
                password: record.password.clone().ok_or_else(|| missing("password"))?,
            },
            ProxyType::Hysteria2 => ProtocolOptions::Hysteria2 {
                password: record
                    .password
                    .clone()
                    .or_else(|| record.auth.clone())
                    .ok_or_else(|| missing("password"))?,
            },
        };

        Ok(Node {
            name: record.name,
            server: record.server,
            port: record.port,
            options,
            transport: TransportOptions {
                network: record.network,
                tls: record.tls,
                sni: record.sni,
                skip_cert_verify: record.skip_cert_verify,
                udp: record.udp,
                extra: record.extra,
            },
        })
    }
}
