use serde_json::Value;

use crate::models::{Node, ProtocolOptions};
use crate::parser::types::ParseError;
use crate::utils::base64::base64_decode_str;
use crate::utils::url::url_decode;

use super::common::parse_port;

const SCHEME: &str = "vmess";

/// Reads a JSON field that may be either a string or a number.
fn json_str(json: &Value, key: &str) -> String {
    match json.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Parse a VMess link (`vmess://BASE64(JSON)`) into a Node
///
/// The JSON object follows the v2rayN share format: `add`, `port`, `id`,
/// `aid`, `net`, `tls`, `sni`, `host`, `path` and the remark in `ps`.
pub fn explode_vmess(link: &str) -> Result<Node, ParseError> {
    let encoded = link
        .strip_prefix("vmess://")
        .ok_or_else(|| ParseError::malformed(SCHEME, "missing vmess:// prefix"))?;
    // Some providers append a remark fragment to the base64 body
    let encoded = encoded.split('#').next().unwrap_or_default();

    let decoded = base64_decode_str(encoded).ok_or_else(|| ParseError::malformed(SCHEME, "invalid base64 body"))?;
    let json: Value =
        serde_json::from_str(&decoded).map_err(|e| ParseError::malformed(SCHEME, format!("invalid JSON: {}", e)))?;

    let server = json_str(&json, "add");
    if server.is_empty() {
        return Err(ParseError::malformed(SCHEME, "missing `add`"));
    }
    let port = parse_port(SCHEME, &json_str(&json, "port"))?;
    let uuid = json_str(&json, "id");
    if uuid.is_empty() {
        return Err(ParseError::malformed(SCHEME, "missing `id`"));
    }
    let alter_id = json_str(&json, "aid").parse::<u16>().unwrap_or(0);

    let mut name = url_decode(&json_str(&json, "ps"));
    if name.is_empty() {
        name = "vmess".to_string();
    }

    let mut node = Node::new(
        name,
        server,
        port,
        ProtocolOptions::VMess {
            uuid,
            alter_id,
            cipher: "auto".to_string(),
        },
    );

    let network = match json_str(&json, "net") {
        net if net.is_empty() => "tcp".to_string(),
        net => net,
    };
    if network == "ws" {
        node.transport
            .set_ws_opts(&json_str(&json, "path"), &json_str(&json, "host"));
    }
    node.transport.network = Some(network);
    node.transport.tls = Some(json_str(&json, "tls") == "tls");
    let sni = json_str(&json, "sni");
    if !sni.is_empty() {
        node.transport.sni = Some(sni);
    }

    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProxyType;

    #[test]
    fn test_ws_tls_link() {
        let link = "vmess://eyJ2IjoiMiIsInBzIjoiVVMgMDEiLCJhZGQiOiJ1cy5leGFtcGxlLmNvbSIsInBvcnQiOiI0NDMiLCJpZCI6ImI4MzEzODFkLTYzMjQtNGQ1My1hZDRmLThjZGE0OGIzMDgxMSIsImFpZCI6IjAiLCJuZXQiOiJ3cyIsInR5cGUiOiJub25lIiwiaG9zdCI6ImNkbi5leGFtcGxlLmNvbSIsInBhdGgiOiIvcmF5IiwidGxzIjoidGxzIiwic25pIjoiY2RuLmV4YW1wbGUuY29tIn0=";
        let node = explode_vmess(link).unwrap();
        assert_eq!(node.proxy_type(), ProxyType::VMess);
        assert_eq!(node.name, "US 01");
        assert_eq!(node.server, "us.example.com");
        assert_eq!(node.port, 443);
        assert_eq!(node.options.credential(), "b831381d-6324-4d53-ad4f-8cda48b30811");
        assert_eq!(node.transport.network.as_deref(), Some("ws"));
        assert_eq!(node.transport.tls, Some(true));
        assert_eq!(node.transport.sni.as_deref(), Some("cdn.example.com"));
        assert!(node.transport.extra.contains_key("ws-opts"));
    }

    #[test]
    fn test_numeric_fields_and_default_name() {
        let link = "vmess://eyJhZGQiOiAiMS4yLjMuNCIsICJwb3J0IjogODA4MCwgImlkIjogInV1aWQtMSIsICJhaWQiOiAyfQ==";
        let node = explode_vmess(link).unwrap();
        assert_eq!(node.name, "vmess");
        assert_eq!(node.port, 8080);
        assert_eq!(
            node.options,
            ProtocolOptions::VMess {
                uuid: "uuid-1".to_string(),
                alter_id: 2,
                cipher: "auto".to_string(),
            }
        );
        assert_eq!(node.transport.network.as_deref(), Some("tcp"));
        assert_eq!(node.transport.tls, Some(false));
    }

    #[test]
    fn test_invalid_payloads() {
        assert!(explode_vmess("vmess://%%%").is_err());
        // base64("not json")
        assert!(explode_vmess("vmess://bm90IGpzb24=").is_err());
        // base64("{}")
        assert!(explode_vmess("vmess://e30=").is_err());
    }
}
