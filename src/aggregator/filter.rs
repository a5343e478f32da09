//! Name and GeoIP admissibility of nodes.

use std::net::{IpAddr, ToSocketAddrs};

use log::debug;

use crate::utils::string::find_keyword;

/// Region and operator markers that disqualify a node by name.
pub const DEFAULT_BANNED_KEYWORDS: &[&str] = &[
    "中国", "China", "CN", "电信", "移动", "联通", "Hong Kong", "Taiwan", "HK", "TW", "澳门", "Macao", "MO",
];

/// Country code rejected by the GeoIP check.
pub const DEFAULT_DISALLOWED_COUNTRY: &str = "CN";

/// Resolves a server host to one IP address.
pub trait HostResolver {
    fn resolve(&self, host: &str) -> Option<IpAddr>;
}

/// Resolver backed by the operating system (`getaddrinfo`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str) -> Option<IpAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Some(ip);
        }
        match (host, 0).to_socket_addrs() {
            Ok(mut addrs) => addrs.next().map(|addr| addr.ip()),
            Err(e) => {
                debug!("Cannot resolve {}: {}", host, e);
                None
            }
        }
    }
}

/// Country-for-IP oracle. `None` means unknown.
pub trait CountryLookup {
    fn country(&self, ip: IpAddr) -> Option<String>;
}

/// Outcome of the admissibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Admit,
    BannedName(String),
    DisallowedCountry(String),
}

impl Verdict {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Verdict::Admit)
    }

    /// Exclusion reason recorded for a rejection.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Verdict::Admit => None,
            Verdict::BannedName(_) => Some("name/GeoIP filter"),
            Verdict::DisallowedCountry(_) => Some("GeoIP filter"),
        }
    }
}

/// Decides whether a node may enter the configuration
///
/// The keyword check runs first. The network lookup only happens for names
/// that pass it, and only when a [`CountryLookup`] is configured. Resolution
/// or lookup failures admit the node.
pub struct NodeFilter {
    banned_keywords: Vec<String>,
    disallowed_country: String,
    resolver: Box<dyn HostResolver + Send + Sync>,
    country_lookup: Option<Box<dyn CountryLookup + Send + Sync>>,
}

impl Default for NodeFilter {
    fn default() -> Self {
        Self::new(
            DEFAULT_BANNED_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            DEFAULT_DISALLOWED_COUNTRY,
        )
    }
}

impl NodeFilter {
    pub fn new(banned_keywords: Vec<String>, disallowed_country: impl Into<String>) -> Self {
        Self {
            banned_keywords,
            disallowed_country: disallowed_country.into(),
            resolver: Box::new(SystemResolver),
            country_lookup: None,
        }
    }

    pub fn with_resolver(mut self, resolver: impl HostResolver + Send + Sync + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn with_country_lookup(mut self, lookup: impl CountryLookup + Send + Sync + 'static) -> Self {
        self.country_lookup = Some(Box::new(lookup));
        self
    }

    pub fn check(&self, name: &str, server: &str) -> Verdict {
        if let Some(keyword) = find_keyword(name, &self.banned_keywords) {
            return Verdict::BannedName(keyword.to_string());
        }

        let Some(lookup) = &self.country_lookup else {
            return Verdict::Admit;
        };
        if server.is_empty() {
            return Verdict::Admit;
        }
        let Some(ip) = self.resolver.resolve(server) else {
            return Verdict::Admit;
        };
        match lookup.country(ip) {
            Some(code) if code.eq_ignore_ascii_case(&self.disallowed_country) => Verdict::DisallowedCountry(code),
            Some(_) => Verdict::Admit,
            None => {
                debug!("GeoIP lookup found no country for {}", ip);
                Verdict::Admit
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct StaticResolver(HashMap<&'static str, IpAddr>);

    impl HostResolver for StaticResolver {
        fn resolve(&self, host: &str) -> Option<IpAddr> {
            host.parse().ok().or_else(|| self.0.get(host).copied())
        }
    }

    struct StaticCountries(HashMap<IpAddr, &'static str>);

    impl CountryLookup for StaticCountries {
        fn country(&self, ip: IpAddr) -> Option<String> {
            self.0.get(&ip).map(|c| c.to_string())
        }
    }

    fn filter() -> NodeFilter {
        let cn: IpAddr = "1.0.1.1".parse().unwrap();
        let jp: IpAddr = "1.0.16.1".parse().unwrap();
        NodeFilter::default()
            .with_resolver(StaticResolver(HashMap::from([("cn.example", cn), ("jp.example", jp)])))
            .with_country_lookup(StaticCountries(HashMap::from([(cn, "CN"), (jp, "JP")])))
    }

    #[test]
    fn test_banned_keyword() {
        assert_eq!(filter().check("HK-01", "jp.example"), Verdict::BannedName("HK".to_string()));
        assert_eq!(filter().check("香港 Taiwan", "jp.example").reason(), Some("name/GeoIP filter"));
    }

    #[test]
    fn test_geoip_reject() {
        let verdict = filter().check("Tokyo", "cn.example");
        assert_eq!(verdict, Verdict::DisallowedCountry("CN".to_string()));
        assert_eq!(verdict.reason(), Some("GeoIP filter"));
        assert!(filter().check("Tokyo", "jp.example").is_admitted());
    }

    #[test]
    fn test_geoip_fails_open() {
        // unresolvable host
        assert!(filter().check("Tokyo", "unknown.example").is_admitted());
        // resolvable, but the oracle knows nothing about the address
        assert!(filter().check("Tokyo", "203.0.113.9").is_admitted());
    }

    #[test]
    fn test_no_lookup_configured() {
        let filter = NodeFilter::default().with_resolver(StaticResolver(HashMap::new()));
        assert!(filter.check("Tokyo", "cn.example").is_admitted());
    }
}
