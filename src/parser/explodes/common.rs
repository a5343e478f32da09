use std::collections::HashMap;

use crate::models::Node;
use crate::parser::types::ParseError;
use crate::utils::url::url_decode;

/// Normalize a proxy link into a [`Node`]
///
/// Dispatches on the scheme prefix. Unknown schemes yield
/// [`ParseError::UnsupportedScheme`], decoding problems
/// [`ParseError::MalformedLink`]. The caller decides whether to log and skip.
pub fn normalize(link: &str) -> Result<Node, ParseError> {
    let link = link.trim();

    if link.starts_with("hysteria2://") || link.starts_with("hy2://") {
        super::hysteria2::explode_hysteria2(link)
    } else if link.starts_with("trojan://") {
        super::trojan::explode_trojan(link)
    } else if link.starts_with("ss://") {
        super::ss::explode_ss(link)
    } else if link.starts_with("vless://") {
        super::vless::explode_vless(link)
    } else if link.starts_with("vmess://") {
        super::vmess::explode_vmess(link)
    } else {
        let scheme = link.split("://").next().unwrap_or_default();
        Err(ParseError::UnsupportedScheme(scheme.to_string()))
    }
}

/// Split `body#remark` into the body and the decoded remark.
pub(super) fn split_remark(body: &str) -> (&str, String) {
    match body.split_once('#') {
        Some((body, remark)) => (body, url_decode(remark.trim())),
        None => (body, String::new()),
    }
}

/// Split `body?query` into the body and its decoded query parameters.
///
/// The first occurrence of a key wins. A trailing `/` before the query
/// (`host:443/?sni=...`) is dropped.
pub(super) fn split_query(body: &str) -> (&str, HashMap<String, String>) {
    let (body, query) = match body.split_once('?') {
        Some((body, query)) => (body, query),
        None => (body, ""),
    };
    let mut params = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        params
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    (body.trim_end_matches('/'), params)
}

/// Parse `host:port`, also accepting a bracketed IPv6 host.
pub(super) fn split_host_port(scheme: &'static str, input: &str) -> Result<(String, u16), ParseError> {
    let (host, port) = input
        .rsplit_once(':')
        .ok_or_else(|| ParseError::malformed(scheme, format!("missing port in `{}`", input)))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(ParseError::malformed(scheme, "empty server"));
    }
    let port = parse_port(scheme, port)?;
    Ok((host.to_string(), port))
}

pub(super) fn parse_port(scheme: &'static str, port: &str) -> Result<u16, ParseError> {
    match port.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(ParseError::malformed(scheme, format!("invalid port `{}`", port))),
        Ok(port) => Ok(port),
    }
}

/// `"1"` and `"true"` (any case) are truthy query flags.
pub(super) fn is_truthy(value: Option<&String>) -> bool {
    value
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Remark to use when a link carries none.
pub(super) fn default_remark(remark: String, server: &str, port: u16) -> String {
    if remark.is_empty() {
        format!("{} ({})", server, port)
    } else {
        remark
    }
}
