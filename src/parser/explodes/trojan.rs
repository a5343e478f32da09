use crate::models::{Node, ProtocolOptions};
use crate::parser::types::ParseError;
use crate::utils::url::url_decode;

use super::common::{default_remark, is_truthy, split_host_port, split_query, split_remark};

const SCHEME: &str = "trojan";

/// Parse a Trojan link into a Node
///
/// Format: `trojan://password@host:port?sni=..&allowInsecure=1&type=ws#remark`.
/// A `user:password` user info keeps only the password.
pub fn explode_trojan(link: &str) -> Result<Node, ParseError> {
    let content = link
        .strip_prefix("trojan://")
        .ok_or_else(|| ParseError::malformed(SCHEME, "missing trojan:// prefix"))?;

    let (content, remark) = split_remark(content);
    let (content, params) = split_query(content);
    let (user_info, host_port) = content
        .rsplit_once('@')
        .ok_or_else(|| ParseError::malformed(SCHEME, "missing `@` separator"))?;
    let user_info = url_decode(user_info);
    let password = match user_info.split_once(':') {
        Some((_, password)) => password.to_string(),
        None => user_info,
    };
    if password.is_empty() {
        return Err(ParseError::malformed(SCHEME, "empty password"));
    }
    let (server, port) = split_host_port(SCHEME, host_port)?;

    let name = default_remark(remark, &server, port);
    let mut node = Node::new(name, server, port, ProtocolOptions::Trojan { password });

    if let Some(sni) = params.get("sni").or_else(|| params.get("peer")).filter(|s| !s.is_empty()) {
        node.transport.sni = Some(sni.clone());
    }
    node.transport.skip_cert_verify =
        Some(is_truthy(params.get("skip-cert-verify")) || is_truthy(params.get("allowInsecure")));

    if params.get("type").map(String::as_str) == Some("ws") {
        node.transport.network = Some("ws".to_string());
        node.transport.set_ws_opts(
            params.get("path").map(String::as_str).unwrap_or(""),
            params.get("host").map(String::as_str).unwrap_or(""),
        );
    }

    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_link() {
        let node = explode_trojan("trojan://secret@tr.example.com:443?sni=tr.example.com&skip-cert-verify=true#Trojan%20A").unwrap();
        assert_eq!(node.name, "Trojan A");
        assert_eq!(node.options.credential(), "secret");
        assert_eq!(node.port, 443);
        assert_eq!(node.transport.sni.as_deref(), Some("tr.example.com"));
        assert_eq!(node.transport.skip_cert_verify, Some(true));
        assert!(node.transport.network.is_none());
    }

    #[test]
    fn test_user_password_and_ws() {
        let node = explode_trojan("trojan://user:pw@h:8443?type=ws&path=%2Ft&allowInsecure=1#x").unwrap();
        assert_eq!(node.options.credential(), "pw");
        assert_eq!(node.transport.network.as_deref(), Some("ws"));
        assert_eq!(node.transport.skip_cert_verify, Some(true));
    }

    #[test]
    fn test_malformed() {
        assert!(explode_trojan("trojan://@h:443#x").is_err());
        assert!(explode_trojan("trojan://pw@h:none#x").is_err());
    }
}
