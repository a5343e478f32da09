use once_cell::sync::Lazy;

use crate::models::ClashConfig;

/// Name of the entry selector of the built-in template.
pub const ENTRY_SELECTOR: &str = "节点选择";

const DEFAULT_TEMPLATE: &str = r#"
port: 7890
socks-port: 7891
redir-port: 7892
allow-lan: true
mode: rule
log-level: info
external-controller: 127.0.0.1:9090
geodata-mode: true
geox-url:
  geoip: https://raw.githubusercontent.com/Loyalsoldier/geoip/release/geoip.dat
  mmdb: https://raw.githubusercontent.com/Loyalsoldier/geoip/release/GeoLite2-Country.mmdb
dns:
  enable: true
  ipv6: false
  default-nameserver:
    - 223.5.5.5
    - 119.29.29.29
  enhanced-mode: fake-ip
  fake-ip-range: 198.18.0.1/16
  use-hosts: true
  nameserver:
    - https://doh.pub/dns-query
    - https://dns.alidns.com/dns-query
  fallback:
    - https://doh.dns.sb/dns-query
    - https://dns.cloudflare.com/dns-query
    - https://dns.twnic.tw/dns-query
    - tls://8.8.4.4:853
  fallback-filter:
    geoip: true
    ipcidr:
      - 240.0.0.0/4
      - 0.0.0.0/32
proxies: []
proxy-groups:
  - name: 节点选择
    type: select
    proxies:
      - 自动选择
      - 故障转移
      - DIRECT
      - 手动选择
  - name: 自动选择
    type: url-test
    exclude-filter: (?i)中国|China|CN|电信|移动|联通
    proxies: []
    url: http://www.pinterest.com
    interval: 300
    tolerance: 50
  - name: 故障转移
    type: fallback
    exclude-filter: (?i)中国|China|CN|电信|移动|联通
    proxies: []
    url: http://www.gstatic.com/generate_204
    interval: 300
  - name: 手动选择
    type: select
    proxies: []
rules:
  - MATCH,节点选择
"#;

static TEMPLATE: Lazy<ClashConfig> = Lazy::new(|| serde_yaml::from_str(DEFAULT_TEMPLATE).unwrap());

/// Baseline document used when no configuration exists yet: local proxy
/// ports, fake-ip DNS, an entry selector over three node-bearing groups and
/// a catch-all rule.
pub fn default_template() -> ClashConfig {
    TEMPLATE.clone()
}
