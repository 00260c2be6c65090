//! Format detector (C5, §4.5): sniffs a fetched document's content to pick
//! which bulk parser (or the link-list fallback) should run.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat {
    LinkList,
    SsdLink,
    ClashYaml,
    SurgeIni,
    QuantumultX,
    SsNativeJson,
    SsrNativeJson,
    SsAndroidJson,
    SsTapJson,
    NetchJson,
    WireGuardConf,
    Unknown,
}

/// `DetectFormat(bytes) -> Format`. Order matters: the more specific sniffs
/// (explicit scheme prefixes, distinctive top-level keys) run before the
/// generic line-list fallback.
pub fn detect_format(content: &str) -> ContentFormat {
    let trimmed = content.trim_start();

    if trimmed.starts_with("ssd://") {
        return ContentFormat::SsdLink;
    }
    if trimmed.starts_with("[Interface]") {
        return ContentFormat::WireGuardConf;
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
            return detect_json_shape(&v);
        }
    }
    if looks_like_clash_yaml(trimmed) {
        return ContentFormat::ClashYaml;
    }
    if looks_like_surge_ini(trimmed) {
        return ContentFormat::SurgeIni;
    }
    if looks_like_quantumultx(trimmed) {
        return ContentFormat::QuantumultX;
    }
    if looks_like_link_list(trimmed) {
        return ContentFormat::LinkList;
    }
    ContentFormat::Unknown
}

fn detect_json_shape(v: &serde_json::Value) -> ContentFormat {
    if let Some(obj) = v.as_object() {
        if obj.contains_key("configs") {
            // SS and SSTap native configs both carry a top-level "configs"
            // array; SSTap's inner objects nest a "server" sub-object.
            if let Some(arr) = obj.get("configs").and_then(|c| c.as_array()) {
                if arr
                    .first()
                    .and_then(|first| first.as_object())
                    .map(|o| o.contains_key("server"))
                    .unwrap_or(false)
                {
                    return ContentFormat::SsTapJson;
                }
            }
            return ContentFormat::SsNativeJson;
        }
        if obj.contains_key("servers") && obj.contains_key("local_port") {
            return ContentFormat::SsrNativeJson;
        }
    }
    if let Some(arr) = v.as_array() {
        if arr
            .first()
            .and_then(|first| first.as_object())
            .map(|o| o.contains_key("Hostname") && o.contains_key("Type"))
            .unwrap_or(false)
        {
            return ContentFormat::NetchJson;
        }
        if arr
            .first()
            .and_then(|first| first.as_object())
            .map(|o| o.contains_key("server") && o.contains_key("server_port"))
            .unwrap_or(false)
        {
            return ContentFormat::SsAndroidJson;
        }
    }
    ContentFormat::Unknown
}

fn looks_like_clash_yaml(s: &str) -> bool {
    s.lines()
        .any(|l| l.trim_start() == "proxies:" || l.trim_start().starts_with("proxies:"))
}

fn looks_like_surge_ini(s: &str) -> bool {
    s.lines().any(|l| {
        let l = l.trim();
        l.eq_ignore_ascii_case("[Proxy]") || l.eq_ignore_ascii_case("[proxy]")
    })
}

fn looks_like_quantumultx(s: &str) -> bool {
    s.lines().any(|l| {
        let l = l.trim_start();
        l.starts_with("vmess=") || l.starts_with("shadowsocks=") || l.starts_with("trojan=") || l.starts_with("socks5=")
    })
}

fn looks_like_link_list(s: &str) -> bool {
    s.lines().filter(|l| !l.trim().is_empty()).any(|l| {
        let l = l.trim();
        l.contains("://")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_clash_yaml_by_proxies_key() {
        let content = "proxies:\n  - {name: A, type: ss}\n";
        assert_eq!(detect_format(content), ContentFormat::ClashYaml);
    }

    #[test]
    fn detects_surge_ini_by_proxy_section() {
        let content = "[General]\nloglevel = notify\n[Proxy]\nDIRECT = direct\n";
        assert_eq!(detect_format(content), ContentFormat::SurgeIni);
    }

    #[test]
    fn detects_link_list_as_fallback() {
        let content = "ss://aaaa\ntrojan://bbbb\n";
        assert_eq!(detect_format(content), ContentFormat::LinkList);
    }

    #[test]
    fn detects_ssd_link() {
        assert_eq!(detect_format("ssd://eyJhIjoxfQ"), ContentFormat::SsdLink);
    }

    #[test]
    fn detects_wireguard_conf() {
        let content = "[Interface]\nPrivateKey = a\n";
        assert_eq!(detect_format(content), ContentFormat::WireGuardConf);
    }
}
