use serde_yaml::{Mapping, Value};

use crate::models::{Node, ProtocolOptions};
use crate::parser::types::ParseError;

use super::common::{default_remark, is_truthy, split_host_port, split_query, split_remark};

const SCHEME: &str = "vless";

/// Parse a VLESS link into a Node
///
/// Format: `vless://uuid@host:port?security=tls&type=ws&path=..&host=..#remark`.
/// `security=reality` is mapped to TLS plus `reality-opts`.
pub fn explode_vless(link: &str) -> Result<Node, ParseError> {
    let content = link
        .strip_prefix("vless://")
        .ok_or_else(|| ParseError::malformed(SCHEME, "missing vless:// prefix"))?;

    let (content, remark) = split_remark(content);
    let (content, params) = split_query(content);
    let (uuid, host_port) = content
        .rsplit_once('@')
        .ok_or_else(|| ParseError::malformed(SCHEME, "missing `@` separator"))?;
    if uuid.is_empty() {
        return Err(ParseError::malformed(SCHEME, "empty uuid"));
    }
    let (server, port) = split_host_port(SCHEME, host_port)?;

    let name = default_remark(remark, &server, port);
    let mut node = Node::new(
        name,
        server,
        port,
        ProtocolOptions::Vless {
            uuid: uuid.to_string(),
        },
    );

    let security = params.get("security").map(String::as_str).unwrap_or("none");
    node.transport.tls = Some(security == "tls" || security == "reality");
    node.transport.skip_cert_verify = Some(is_truthy(params.get("skip-cert-verify")) || is_truthy(params.get("allowInsecure")));
    if let Some(sni) = params.get("sni").or_else(|| params.get("peer")).filter(|s| !s.is_empty()) {
        node.transport.sni = Some(sni.clone());
    }

    let network = params.get("type").map(String::as_str).unwrap_or("tcp");
    match network {
        "ws" => node.transport.set_ws_opts(
            params.get("path").map(String::as_str).unwrap_or(""),
            params.get("host").map(String::as_str).unwrap_or(""),
        ),
        "grpc" => {
            let mut opts = Mapping::new();
            opts.insert(
                Value::from("grpc-service-name"),
                Value::from(params.get("serviceName").map(String::as_str).unwrap_or("")),
            );
            node.transport.extra.insert("grpc-opts".to_string(), Value::Mapping(opts));
        }
        _ => {}
    }
    node.transport.network = Some(network.to_string());

    if security == "reality" {
        let mut opts = Mapping::new();
        if let Some(pbk) = params.get("pbk") {
            opts.insert(Value::from("public-key"), Value::from(pbk.as_str()));
        }
        if let Some(sid) = params.get("sid") {
            opts.insert(Value::from("short-id"), Value::from(sid.as_str()));
        }
        node.transport.extra.insert("reality-opts".to_string(), Value::Mapping(opts));
    }
    if let Some(flow) = params.get("flow").filter(|f| !f.is_empty()) {
        node.transport.extra.insert("flow".to_string(), Value::from(flow.as_str()));
    }
    if let Some(fp) = params.get("fp").filter(|f| !f.is_empty()) {
        node.transport
            .extra
            .insert("client-fingerprint".to_string(), Value::from(fp.as_str()));
    }

    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_tls_link() {
        let node = explode_vless(
            "vless://0f7a5c3e-1111-2222-3333-444455556666@sg.example.com:443?security=tls&sni=cdn.example.com&type=ws&path=%2Fws&host=cdn.example.com#SG%2001",
        )
        .unwrap();
        assert_eq!(node.name, "SG 01");
        assert_eq!(node.port, 443);
        assert_eq!(node.transport.tls, Some(true));
        assert_eq!(node.transport.sni.as_deref(), Some("cdn.example.com"));
        assert_eq!(node.transport.network.as_deref(), Some("ws"));
        let ws = node.transport.extra["ws-opts"].as_mapping().unwrap();
        assert_eq!(ws.get("path"), Some(&Value::from("/ws")));
    }

    #[test]
    fn test_reality_link() {
        let node = explode_vless(
            "vless://id@1.2.3.4:8443?security=reality&pbk=KEY&sid=ab&flow=xtls-rprx-vision&fp=chrome&type=tcp#r",
        )
        .unwrap();
        assert_eq!(node.transport.tls, Some(true));
        assert_eq!(node.transport.network.as_deref(), Some("tcp"));
        assert!(node.transport.extra.contains_key("reality-opts"));
        assert_eq!(node.transport.extra["flow"], Value::from("xtls-rprx-vision"));
    }

    #[test]
    fn test_plain_link_defaults() {
        let node = explode_vless("vless://id@host.example:80").unwrap();
        assert_eq!(node.name, "host.example (80)");
        assert_eq!(node.transport.tls, Some(false));
        assert_eq!(node.transport.skip_cert_verify, Some(false));
    }

    #[test]
    fn test_malformed() {
        assert!(explode_vless("vless://host.example:80#x").is_err());
        assert!(explode_vless("vless://id@host.example#x").is_err());
    }
}
