use crate::models::{Node, ProtocolOptions};
use crate::parser::types::ParseError;
use crate::utils::base64::base64_decode_str;
use crate::utils::url::url_decode;

use super::common::{default_remark, split_host_port, split_query, split_remark};

const SCHEME: &str = "ss";

/// Parse a Shadowsocks link into a Node
///
/// Accepts the SIP002 form `ss://BASE64(method:password)@host:port#remark`
/// (the user info may also be percent-encoded plain text) and the legacy
/// form `ss://BASE64(method:password@host:port)#remark`. A `plugin` query is
/// kept as the Clash `plugin` option.
pub fn explode_ss(link: &str) -> Result<Node, ParseError> {
    let content = link
        .strip_prefix("ss://")
        .ok_or_else(|| ParseError::malformed(SCHEME, "missing ss:// prefix"))?;

    let (content, remark) = split_remark(content);
    let (content, params) = split_query(content);

    let (cipher, password, server, port) = match content.rsplit_once('@') {
        Some((user_info, host_port)) => {
            let (cipher, password) = decode_user_info(user_info)?;
            let (server, port) = split_host_port(SCHEME, host_port)?;
            (cipher, password, server, port)
        }
        None => {
            let decoded = base64_decode_str(content)
                .ok_or_else(|| ParseError::malformed(SCHEME, "invalid base64 body"))?;
            let (user_info, host_port) = decoded
                .rsplit_once('@')
                .ok_or_else(|| ParseError::malformed(SCHEME, "missing `@` separator"))?;
            let (cipher, password) = split_method_password(user_info)?;
            let (server, port) = split_host_port(SCHEME, host_port)?;
            (cipher, password, server, port)
        }
    };

    let name = default_remark(remark, &server, port);
    let mut node = Node::new(name, server, port, ProtocolOptions::Shadowsocks { cipher, password });
    node.transport.udp = Some(true);

    if let Some(plugin) = params.get("plugin").filter(|p| !p.is_empty()) {
        let (plugin, opts) = match plugin.split_once(';') {
            Some((plugin, opts)) => (plugin, opts),
            None => (plugin.as_str(), ""),
        };
        let plugin = match plugin {
            "obfs-local" | "simple-obfs" => "obfs",
            other => other,
        };
        node.transport
            .extra
            .insert("plugin".to_string(), serde_yaml::Value::from(plugin));
        let opts = plugin_opts(opts);
        if !opts.is_empty() {
            node.transport
                .extra
                .insert("plugin-opts".to_string(), serde_yaml::Value::Mapping(opts));
        }
    }

    Ok(node)
}

/// `obfs=http;obfs-host=a.com` to `{mode: http, host: a.com}`.
fn plugin_opts(raw: &str) -> serde_yaml::Mapping {
    let mut opts = serde_yaml::Mapping::new();
    for pair in raw.split(';').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, "true"));
        let key = match key {
            "obfs" => "mode",
            "obfs-host" => "host",
            other => other,
        };
        opts.insert(serde_yaml::Value::from(key), serde_yaml::Value::from(value));
    }
    opts
}

fn decode_user_info(user_info: &str) -> Result<(String, String), ParseError> {
    if let Some(decoded) = base64_decode_str(user_info).filter(|d| d.contains(':')) {
        return split_method_password(&decoded);
    }
    split_method_password(&url_decode(user_info))
}

fn split_method_password(user_info: &str) -> Result<(String, String), ParseError> {
    let (cipher, password) = user_info
        .split_once(':')
        .ok_or_else(|| ParseError::malformed(SCHEME, "missing `method:password`"))?;
    if cipher.is_empty() {
        return Err(ParseError::malformed(SCHEME, "empty cipher"));
    }
    Ok((cipher.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProxyType;

    #[test]
    fn test_sip002_link() {
        let node = explode_ss("ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ=@example.com:8443#MyNode").unwrap();
        assert_eq!(node.name, "MyNode");
        assert_eq!(node.proxy_type(), ProxyType::Shadowsocks);
        assert_eq!(node.server, "example.com");
        assert_eq!(node.port, 8443);
        assert_eq!(
            node.options,
            ProtocolOptions::Shadowsocks {
                cipher: "aes-256-gcm".to_string(),
                password: "password".to_string(),
            }
        );
        assert_eq!(node.transport.udp, Some(true));
    }

    #[test]
    fn test_legacy_link_and_password_with_colon() {
        // base64("chacha20-ietf-poly1305:p:w@10.0.0.1:8388")
        let node = explode_ss("ss://Y2hhY2hhMjAtaWV0Zi1wb2x5MTMwNTpwOndAMTAuMC4wLjE6ODM4OA").unwrap();
        assert_eq!(node.server, "10.0.0.1");
        assert_eq!(node.port, 8388);
        assert_eq!(node.options.credential(), "p:w");
        assert_eq!(node.name, "10.0.0.1 (8388)");
    }

    #[test]
    fn test_plain_user_info_and_plugin() {
        let node = explode_ss("ss://aes-128-gcm:secret@h.example:443/?plugin=obfs-local%3Bobfs%3Dhttp#%E6%97%A5%E6%9C%AC").unwrap();
        assert_eq!(node.name, "日本");
        assert_eq!(node.options.credential(), "secret");
        assert_eq!(node.transport.extra["plugin"], serde_yaml::Value::from("obfs"));
        let opts = node.transport.extra["plugin-opts"].as_mapping().unwrap();
        assert_eq!(opts.get("mode"), Some(&serde_yaml::Value::from("http")));
    }

    #[test]
    fn test_malformed_links() {
        assert!(matches!(
            explode_ss("ss://!!!@example.com:8443"),
            Err(ParseError::MalformedLink { scheme: "ss", .. })
        ));
        assert!(explode_ss("ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ=@example.com:port").is_err());
        assert!(explode_ss("ss://bm9zZXBhcmF0b3I=").is_err());
    }
}
