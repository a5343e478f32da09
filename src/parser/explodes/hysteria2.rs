use serde_yaml::Value;

use crate::models::{Node, ProtocolOptions};
use crate::parser::types::ParseError;
use crate::utils::url::url_decode;

use super::common::{default_remark, is_truthy, split_host_port, split_query, split_remark};

const SCHEME: &str = "hysteria2";

/// Parse a Hysteria2 link (`hysteria2://` or `hy2://`) into a Node
///
/// Format: `hysteria2://auth@host:port/?insecure=1&sni=..&obfs=..&obfs-password=..#remark`
pub fn explode_hysteria2(link: &str) -> Result<Node, ParseError> {
    let content = link
        .strip_prefix("hysteria2://")
        .or_else(|| link.strip_prefix("hy2://"))
        .ok_or_else(|| ParseError::malformed(SCHEME, "missing hysteria2:// prefix"))?;

    let (content, remark) = split_remark(content);
    let (content, params) = split_query(content);
    let (auth, host_port) = content
        .rsplit_once('@')
        .ok_or_else(|| ParseError::malformed(SCHEME, "missing `@` separator"))?;
    let password = url_decode(auth);
    if password.is_empty() {
        return Err(ParseError::malformed(SCHEME, "empty auth"));
    }
    // Port hopping ranges (`443,8443-8500`) keep their first port
    let host_port = host_port.split(',').next().unwrap_or(host_port);
    let (server, port) = split_host_port(SCHEME, host_port)?;

    let name = default_remark(remark, &server, port);
    let mut node = Node::new(name, server, port, ProtocolOptions::Hysteria2 { password });

    node.transport.skip_cert_verify = Some(is_truthy(params.get("insecure")));
    if let Some(sni) = params.get("sni").filter(|s| !s.is_empty()) {
        node.transport.sni = Some(sni.clone());
    }
    if let Some(obfs) = params.get("obfs").filter(|o| !o.is_empty() && *o != "none") {
        node.transport.extra.insert("obfs".to_string(), Value::from(obfs.as_str()));
        if let Some(secret) = params.get("obfs-password") {
            node.transport
                .extra
                .insert("obfs-password".to_string(), Value::from(secret.as_str()));
        }
    }
    node.transport
        .extra
        .insert("client-fingerprint".to_string(), Value::from("chrome"));

    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProxyType;

    #[test]
    fn test_hy2_link() {
        let node = explode_hysteria2("hy2://letmein@hy.example.com:443/?insecure=1&sni=bing.com#HY%202").unwrap();
        assert_eq!(node.proxy_type(), ProxyType::Hysteria2);
        assert_eq!(node.name, "HY 2");
        assert_eq!(node.port, 443);
        assert_eq!(node.options.credential(), "letmein");
        assert_eq!(node.transport.skip_cert_verify, Some(true));
        assert_eq!(node.transport.sni.as_deref(), Some("bing.com"));
    }

    #[test]
    fn test_obfs_and_port_hopping() {
        let node = explode_hysteria2("hysteria2://pw@1.2.3.4:20000,20001-20010?obfs=salamander&obfs-password=x#h").unwrap();
        assert_eq!(node.port, 20000);
        assert_eq!(node.transport.extra["obfs"], Value::from("salamander"));
        assert_eq!(node.transport.skip_cert_verify, Some(false));
    }

    #[test]
    fn test_serializes_password_and_auth() {
        let node = explode_hysteria2("hy2://pw@h:443#n").unwrap();
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["password"], "pw");
        assert_eq!(value["auth"], "pw");
        assert_eq!(value["type"], "hysteria2");
    }

    #[test]
    fn test_malformed() {
        assert!(explode_hysteria2("hy2://h:443#n").is_err());
        assert!(explode_hysteria2("hy2://pw@h#n").is_err());
    }
}
