use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::models::{Node, ProtocolOptions, ProxyType};
use crate::parser::explodes::normalize;
use crate::parser::types::{ParseError, SourcePayload};
use crate::utils::base64::base64_decode_str;
use crate::utils::url::url_decode;

/// Links embedded in free text (markdown pages, HTML, README files).
static LINK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:vless|vmess|trojan|hysteria2|hy2|ss)://[^#\s]*(?:#[^\s]*)?").unwrap()
});

/// One entry of a Shadowsocks JSON subscription.
#[derive(Debug, Deserialize)]
struct SsJsonEntry {
    #[serde(default)]
    remarks: String,
    server: String,
    server_port: u16,
    method: String,
    password: String,
}

/// What a fetched body turned out to be.
#[derive(Debug)]
enum ContentKind {
    Clash(Vec<serde_yaml::Value>),
    SsJson(Vec<Node>),
    Links(Vec<String>),
}

/// Convert normalized links into nodes, logging and skipping malformed ones.
pub fn explode_links<I, S>(links: I) -> Vec<Node>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut nodes = Vec::new();
    for link in links {
        let link = link.as_ref().trim();
        if link.is_empty() {
            continue;
        }
        match normalize(link) {
            Ok(node) => nodes.push(node),
            Err(ParseError::UnsupportedScheme(scheme)) => {
                debug!("Skipping line with unsupported scheme `{}`", scheme)
            }
            Err(e) => warn!("Skipping link {}: {}", truncate(link, 50), e),
        }
    }
    nodes
}

/// Convert structured Clash proxy records, keeping only `allowed` types
/// (all supported types when `allowed` is empty).
pub fn explode_structured(records: Vec<serde_yaml::Value>, allowed: &[ProxyType]) -> Vec<Node> {
    let mut nodes = Vec::new();
    for record in records {
        match Node::from_value(record) {
            Ok(node) if allowed.is_empty() || allowed.contains(&node.proxy_type()) => nodes.push(node),
            Ok(node) => debug!("Dropping {} node `{}`: type not allowed", node.proxy_type(), node.name),
            Err(reason) => warn!("{}", ParseError::UnsupportedType(reason)),
        }
    }
    nodes
}

/// Decode a fetched subscription body
///
/// Recognizes a Clash YAML document (optionally wrapped in `<pre>`), a
/// Shadowsocks JSON array, a Base64 list of links, and finally free text in
/// which links are searched for.
pub fn explode_content(content: &[u8], allowed: &[ProxyType]) -> Vec<Node> {
    match classify_content(&String::from_utf8_lossy(content)) {
        ContentKind::Clash(records) => explode_structured(records, allowed),
        ContentKind::SsJson(nodes) => nodes,
        ContentKind::Links(links) => explode_links(links),
    }
}

fn classify_content(text: &str) -> ContentKind {
    if text.contains("proxies:") {
        let stripped = strip_pre(text);
        match serde_yaml::from_str::<serde_yaml::Value>(&stripped) {
            Ok(doc) => {
                let records = doc
                    .get("proxies")
                    .and_then(|p| p.as_sequence())
                    .cloned()
                    .unwrap_or_default();
                return ContentKind::Clash(records);
            }
            Err(e) => debug!("Content mentions proxies but is not YAML: {}", e),
        }
    }

    let trimmed = text.trim();
    if trimmed.starts_with('[') {
        if let Ok(entries) = serde_json::from_str::<Vec<SsJsonEntry>>(trimmed) {
            return ContentKind::SsJson(entries.into_iter().map(ss_json_node).collect());
        }
    }

    if let Some(decoded) = base64_decode_str(trimmed) {
        let decoded = url_decode(&decoded);
        return ContentKind::Links(decoded.lines().map(str::to_string).collect());
    }

    let text = url_decode(text);
    ContentKind::Links(
        LINK_PATTERN
            .find_iter(&text)
            .map(|m| m.as_str().to_string())
            .collect(),
    )
}

fn strip_pre(text: &str) -> String {
    if !text.contains("</pre>") {
        return text.to_string();
    }
    let body = text
        .find("<pre")
        .and_then(|start| text[start..].find('>').map(|end| &text[start + end + 1..]))
        .unwrap_or(text);
    body.replace("</pre>", "")
}

fn ss_json_node(entry: SsJsonEntry) -> Node {
    let mut node = Node::new(
        entry.remarks,
        entry.server,
        entry.server_port,
        ProtocolOptions::Shadowsocks {
            cipher: entry.method,
            password: entry.password,
        },
    );
    node.transport.udp = Some(true);
    node
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Decode every source payload into nodes
///
/// Failed sources are logged and skipped; the order of nodes follows the
/// order of the payloads.
pub fn explode_sources(payloads: Vec<SourcePayload>, allowed: &[ProxyType]) -> Vec<Node> {
    let mut nodes = Vec::new();
    for payload in payloads {
        let before = nodes.len();
        match payload {
            SourcePayload::Links(links) => nodes.extend(explode_links(links)),
            SourcePayload::Content(content) => nodes.extend(explode_content(&content, allowed)),
            SourcePayload::Structured(records) => nodes.extend(explode_structured(records, allowed)),
            SourcePayload::Failed { source, reason } => {
                warn!("Skipping source {}: {}", source, reason);
                continue;
            }
        }
        debug!("Source yielded {} nodes", nodes.len() - before);
    }
    info!("Decoded {} nodes from all sources", nodes.len());
    nodes
}
