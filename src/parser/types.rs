use thiserror::Error;

/// Why a link or a structured record could not become a node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unsupported link scheme: {0}")]
    UnsupportedScheme(String),

    #[error("malformed {scheme} link: {reason}")]
    MalformedLink { scheme: &'static str, reason: String },

    #[error("unsupported proxy record: {0}")]
    UnsupportedType(String),
}

impl ParseError {
    pub(crate) fn malformed(scheme: &'static str, reason: impl Into<String>) -> Self {
        ParseError::MalformedLink {
            scheme,
            reason: reason.into(),
        }
    }
}

/// Already-fetched output of one subscription source.
#[derive(Debug, Clone)]
pub enum SourcePayload {
    /// Raw link lines (`ss://...`, `vmess://...`).
    Links(Vec<String>),
    /// A fetched body: Clash YAML, Base64 link list, plain text or a
    /// Shadowsocks JSON array.
    Content(Vec<u8>),
    /// Structured Clash proxy records.
    Structured(Vec<serde_yaml::Value>),
    /// The fetcher could not retrieve the source.
    Failed { source: String, reason: String },
}
