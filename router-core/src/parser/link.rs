//! Link parsers (C3, §4.3): one function per URI scheme, dispatched by
//! [`explode`]. Every parser is total — malformed input yields a Node with
//! `node_type == Unknown` rather than an error.

use crate::model::{Node, ProxyType, TransferProtocol};
use base64::Engine as _;
use std::collections::HashMap;

fn unknown() -> Node {
    Node::default()
}

/// Decodes base64 leniently: tries standard, then URL-safe, with and
/// without padding, since links in the wild mix all four variants.
pub fn decode_base64_lenient(input: &str) -> Option<Vec<u8>> {
    let trimmed = input.trim();
    let engines: [&base64::engine::GeneralPurpose; 2] = [
        &base64::engine::general_purpose::STANDARD,
        &base64::engine::general_purpose::URL_SAFE,
    ];
    for engine in engines {
        if let Ok(bytes) = engine.decode(trimmed) {
            return Some(bytes);
        }
        // retry with manual padding in case the source stripped it
        let mut padded = trimmed.to_string();
        while padded.len() % 4 != 0 {
            padded.push('=');
        }
        if let Ok(bytes) = engine.decode(&padded) {
            return Some(bytes);
        }
    }
    None
}

pub fn decode_base64_string_lenient(input: &str) -> Option<String> {
    decode_base64_lenient(input).map(|b| String::from_utf8_lossy(&b).into_owned())
}

/// Splits a `query` string into a map, URL-decoding both sides.
fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let k = urlencoding::decode(k).ok()?.into_owned();
            let v = urlencoding::decode(v).ok()?.into_owned();
            Some((k, v))
        })
        .collect()
}

/// `Explode(link) -> Node` (§4.3 dispatcher).
pub fn explode(link: &str) -> Node {
    let link = link.trim();
    if let Some(rest) = link.strip_prefix("ssr://") {
        return explode_ssr(rest);
    }
    if let Some(rest) = link.strip_prefix("ss://") {
        return explode_ss(rest);
    }
    if let Some(rest) = link.strip_prefix("vmess://") {
        return explode_vmess(rest);
    }
    if let Some(rest) = link.strip_prefix("vmess1://") {
        return explode_vmess(rest);
    }
    if let Some(rest) = link.strip_prefix("trojan://") {
        return explode_trojan(rest);
    }
    if let Some(rest) = link.strip_prefix("socks://") {
        return explode_socks(rest);
    }
    if link.starts_with("https://t.me/socks") || link.starts_with("tg://socks") {
        return explode_telegram_socks(link);
    }
    if link.starts_with("https://t.me/http") || link.starts_with("tg://http") {
        return explode_telegram_http(link);
    }
    if let Some(rest) = link.strip_prefix("netch://") {
        return explode_netch(rest);
    }
    if link.starts_with("surge:///install-config") {
        return explode_surge_install_config(link);
    }
    if link.starts_with("http://") || link.starts_with("https://") {
        return explode_bare_http(link);
    }
    unknown()
}

/// `method:pw@host:port` plus optional `#remark` and `?plugin=...` — the
/// unwrapped inner form shared by all three `ss://` dialects.
fn parse_ss_inner(inner: &str, remark_hint: Option<&str>, plugin_qs: Option<&str>) -> Node {
    let (main, remark) = match inner.split_once('#') {
        Some((m, r)) => (m, Some(r.to_string())),
        None => (inner, remark_hint.map(|s| s.to_string())),
    };
    let (userinfo, hostport) = match main.rsplit_once('@') {
        Some((u, h)) => (u, h),
        None => return unknown(),
    };
    let (host, port) = match hostport.rsplit_once(':') {
        Some((h, p)) => (h, p),
        None => return unknown(),
    };
    let (method, password) = match userinfo.split_once(':') {
        Some((m, p)) => (m, p),
        None => return unknown(),
    };
    let Ok(port) = port.trim_matches('/').parse::<u16>() else {
        return unknown();
    };
    let mut node = Node::new(ProxyType::Shadowsocks, host, port);
    node.encrypt_method = method.to_string();
    node.password = password.to_string();
    if let Some(r) = remark {
        node.remark = urlencoding::decode(&r).map(|s| s.into_owned()).unwrap_or(r);
    }
    if let Some(pq) = plugin_qs {
        let (name, opts) = pq.split_once(';').unwrap_or((pq, ""));
        node.plugin = name.to_string();
        node.plugin_option = opts.to_string();
    }
    if !node.has_valid_port() {
        return unknown();
    }
    node
}

fn explode_ss(rest: &str) -> Node {
    let (body, frag) = rest.split_once('#').unwrap_or((rest, ""));
    let (main, query) = body.split_once('?').unwrap_or((body, ""));
    let plugin_qs = parse_query(query).remove("plugin");

    // form (a): method:pw@host:port (possibly with query/fragment)
    if main.contains('@') {
        let joined = if frag.is_empty() {
            main.to_string()
        } else {
            format!("{}#{}", main, frag)
        };
        return parse_ss_inner(&joined, None, plugin_qs.as_deref());
    }

    // form (b): base64 of the whole "method:pw@host:port"
    if let Some(decoded) = decode_base64_string_lenient(main) {
        if decoded.contains('@') {
            let joined = if frag.is_empty() {
                decoded
            } else {
                format!("{}#{}", decoded, frag)
            };
            return parse_ss_inner(&joined, None, plugin_qs.as_deref());
        }
        // form (c): base64(method:pw) @ host:port in clear text after '@'
    }

    // form (c): <base64(method:pw)>@host:port
    if let Some((enc, hostport)) = main.rsplit_once('@') {
        if let Some(decoded) = decode_base64_string_lenient(enc) {
            let joined = format!("{}@{}{}", decoded, hostport, if frag.is_empty() { String::new() } else { format!("#{}", frag) });
            return parse_ss_inner(&joined, None, plugin_qs.as_deref());
        }
    }

    unknown()
}

fn explode_ssr(rest: &str) -> Node {
    let Some(decoded) = decode_base64_string_lenient(rest) else {
        return unknown();
    };
    let (main, tail) = decoded.split_once('/').map(|(a, b)| (a, Some(b))).unwrap_or((decoded.as_str(), None));
    let parts: Vec<&str> = main.splitn(6, ':').collect();
    if parts.len() < 6 {
        return unknown();
    }
    let host = parts[0];
    let Ok(port) = parts[1].parse::<u16>() else {
        return unknown();
    };
    let protocol = parts[2];
    let method = parts[3];
    let obfs = parts[4];
    let password_enc = parts[5];
    let password = decode_base64_string_lenient(password_enc).unwrap_or_default();

    let mut qs = HashMap::new();
    if let Some(tail) = tail {
        if let Some((_, query)) = tail.split_once('?') {
            for (k, v) in parse_query(query) {
                qs.insert(k, decode_base64_string_lenient(&v).unwrap_or(v));
            }
        }
    }

    let mut node = Node::new(ProxyType::ShadowsocksR, host, port);
    node.encrypt_method = method.to_string();
    node.password = password;
    node.protocol = protocol.to_string();
    node.obfs = obfs.to_string();
    node.obfs_param = qs.get("obfsparam").cloned().unwrap_or_default();
    node.protocol_param = qs.get("protoparam").cloned().unwrap_or_default();
    node.group = qs.get("group").cloned().unwrap_or_default();
    node.remark = qs.get("remarks").cloned().unwrap_or_default();
    if !node.has_valid_port() {
        return unknown();
    }

    // Downgrade to plain SS when the SSR-specific fields carry no meaning
    // (§8 open question: "downgrade when feasible, always").
    if protocol == "origin" && obfs == "plain" && is_ss_native_cipher(method) {
        node.node_type = ProxyType::Shadowsocks;
        node.protocol.clear();
        node.obfs.clear();
    }
    node
}

fn is_ss_native_cipher(method: &str) -> bool {
    matches!(
        method,
        "rc4-md5"
            | "aes-128-gcm"
            | "aes-192-gcm"
            | "aes-256-gcm"
            | "aes-128-cfb"
            | "aes-192-cfb"
            | "aes-256-cfb"
            | "aes-128-ctr"
            | "aes-192-ctr"
            | "aes-256-ctr"
            | "chacha20"
            | "chacha20-ietf"
            | "chacha20-ietf-poly1305"
            | "xchacha20-ietf-poly1305"
            | "none"
    )
}

/// VMess: handles the v2rayN JSON-in-base64 dialect and the standard
/// `uuid@host:port?...` dialect; falls back to Shadowrocket's
/// `base64(method:uuid@host:port)` form when neither parses as JSON/URL.
fn explode_vmess(rest: &str) -> Node {
    if let Some(json_text) = decode_base64_string_lenient(rest) {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(&json_text) {
            return vmess_from_v2rayn_json(&v);
        }
    }
    if rest.contains('@') {
        return vmess_from_standard(rest);
    }
    if let Some(decoded) = decode_base64_string_lenient(rest) {
        if decoded.contains('@') {
            return vmess_from_shadowrocket(&decoded);
        }
    }
    unknown()
}

fn get_str(v: &serde_json::Value, key: &str) -> String {
    v.get(key)
        .map(|x| match x {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string().trim_matches('"').to_string(),
        })
        .unwrap_or_default()
}

fn vmess_from_v2rayn_json(v: &serde_json::Value) -> Node {
    let add = get_str(v, "add");
    let port_str = get_str(v, "port");
    let Ok(port) = port_str.parse::<u16>() else {
        return unknown();
    };
    let mut node = Node::new(ProxyType::VMess, add, port);
    node.remark = get_str(v, "ps");
    node.user_id = get_str(v, "id");
    node.transfer_protocol = TransferProtocol::parse(&get_str(v, "net"));
    node.fake_type = get_str(v, "type");
    node.path = get_str(v, "path");
    node.host = get_str(v, "host");
    node.edge = String::new();
    node.server_name = get_str(v, "sni");
    let tls = get_str(v, "tls");
    node.tls_secure = tls == "tls" || tls == "1" || tls.eq_ignore_ascii_case("true");
    node.encrypt_method = {
        let scy = get_str(v, "scy");
        if scy.is_empty() {
            "auto".to_string()
        } else {
            scy
        }
    };
    node.ensure_vmess_defaults();
    if !node.has_valid_port() {
        return unknown();
    }
    node
}

fn vmess_from_standard(rest: &str) -> Node {
    let (body, frag) = rest.split_once('#').unwrap_or((rest, ""));
    let (main, query) = body.split_once('?').unwrap_or((body, ""));
    let (uuid, hostport) = match main.rsplit_once('@') {
        Some(x) => x,
        None => return unknown(),
    };
    let (host, port) = match hostport.rsplit_once(':') {
        Some(x) => x,
        None => return unknown(),
    };
    let Ok(port) = port.parse::<u16>() else {
        return unknown();
    };
    let qs = parse_query(query);
    let mut node = Node::new(ProxyType::VMess, host, port);
    node.user_id = uuid.to_string();
    node.transfer_protocol = TransferProtocol::parse(qs.get("type").map(|s| s.as_str()).unwrap_or("tcp"));
    node.path = qs.get("path").cloned().unwrap_or_default();
    node.host = qs.get("host").cloned().unwrap_or_default();
    node.server_name = qs.get("sni").cloned().unwrap_or_default();
    node.tls_secure = qs.get("security").map(|s| s == "tls").unwrap_or(false);
    node.encrypt_method = qs.get("encryption").cloned().unwrap_or_else(|| "auto".to_string());
    if !frag.is_empty() {
        node.remark = urlencoding::decode(frag).map(|s| s.into_owned()).unwrap_or_default();
    }
    node.ensure_vmess_defaults();
    if !node.has_valid_port() {
        return unknown();
    }
    node
}

fn vmess_from_shadowrocket(decoded: &str) -> Node {
    let (body, frag) = decoded.split_once('#').unwrap_or((decoded, ""));
    let (userinfo, hostport_and_query) = match body.rsplit_once('@') {
        Some(x) => x,
        None => return unknown(),
    };
    let (hostport, query) = hostport_and_query.split_once('?').unwrap_or((hostport_and_query, ""));
    let (host, port) = match hostport.rsplit_once(':') {
        Some(x) => x,
        None => return unknown(),
    };
    let Ok(port) = port.parse::<u16>() else {
        return unknown();
    };
    let (method, uuid) = userinfo.split_once(':').unwrap_or(("auto", userinfo));
    let qs = parse_query(query);
    let mut node = Node::new(ProxyType::VMess, host, port);
    node.user_id = uuid.to_string();
    node.encrypt_method = method.to_string();
    node.transfer_protocol = TransferProtocol::parse(qs.get("obfs").map(|s| s.as_str()).unwrap_or("tcp"));
    node.tls_secure = qs.get("tls").map(|s| s == "1" || s == "true").unwrap_or(false);
    if !frag.is_empty() {
        node.remark = urlencoding::decode(frag).map(|s| s.into_owned()).unwrap_or_default();
    }
    node.ensure_vmess_defaults();
    if !node.has_valid_port() {
        return unknown();
    }
    node
}

fn explode_trojan(rest: &str) -> Node {
    let (body, frag) = rest.split_once('#').unwrap_or((rest, ""));
    let (main, query) = body.split_once('?').unwrap_or((body, ""));
    let (password, hostport) = match main.rsplit_once('@') {
        Some(x) => x,
        None => return unknown(),
    };
    let (host, port) = match hostport.rsplit_once(':') {
        Some(x) => x,
        None => return unknown(),
    };
    let Ok(port) = port.parse::<u16>() else {
        return unknown();
    };
    let qs = parse_query(query);
    let mut node = Node::new(ProxyType::Trojan, host, port);
    node.password = urlencoding::decode(password).map(|s| s.into_owned()).unwrap_or(password.to_string());
    node.server_name = qs
        .get("sni")
        .or_else(|| qs.get("peer"))
        .cloned()
        .unwrap_or_default();
    let uses_ws = qs.get("ws").map(|s| s == "1").unwrap_or(false) || qs.get("type").map(|s| s == "ws").unwrap_or(false);
    node.transfer_protocol = if uses_ws { TransferProtocol::Ws } else { TransferProtocol::Tcp };
    node.path = qs.get("wspath").or_else(|| qs.get("path")).cloned().unwrap_or_default();
    node.allow_insecure = qs
        .get("allowInsecure")
        .map(|s| crate::tribool::TriBool::from_str_loose(s))
        .unwrap_or_default();
    node.tcp_fast_open = qs
        .get("tfo")
        .map(|s| crate::tribool::TriBool::from_str_loose(s))
        .unwrap_or_default();
    if !frag.is_empty() {
        node.remark = urlencoding::decode(frag).map(|s| s.into_owned()).unwrap_or_default();
    }
    if !node.has_valid_port() {
        return unknown();
    }
    node
}

fn explode_socks(rest: &str) -> Node {
    let (body, frag) = rest.split_once('#').unwrap_or((rest, ""));
    let (userinfo, hostport) = match body.rsplit_once('@') {
        Some(x) => (Some(x.0), x.1),
        None => (None, body),
    };
    let (host, port) = match hostport.rsplit_once(':') {
        Some(x) => x,
        None => return unknown(),
    };
    let Ok(port) = port.parse::<u16>() else {
        return unknown();
    };
    let mut node = Node::new(ProxyType::Socks5, host, port);
    if let Some(ui) = userinfo {
        if let Some(decoded) = decode_base64_string_lenient(ui) {
            if let Some((u, p)) = decoded.split_once(':') {
                node.username = u.to_string();
                node.password = p.to_string();
            }
        } else if let Some((u, p)) = ui.split_once(':') {
            node.username = u.to_string();
            node.password = p.to_string();
        }
    }
    if !frag.is_empty() {
        node.remark = urlencoding::decode(frag).map(|s| s.into_owned()).unwrap_or_default();
    }
    if !node.has_valid_port() {
        return unknown();
    }
    node
}

fn explode_telegram_socks(link: &str) -> Node {
    let qs = link.split_once('?').map(|(_, q)| parse_query(q)).unwrap_or_default();
    let host = qs.get("server").cloned().unwrap_or_default();
    let Some(port) = qs.get("port").and_then(|p| p.parse::<u16>().ok()) else {
        return unknown();
    };
    let mut node = Node::new(ProxyType::Socks5, host, port);
    node.username = qs.get("user").cloned().unwrap_or_default();
    node.password = qs.get("pass").cloned().unwrap_or_default();
    node.group = qs.get("group").cloned().unwrap_or_default();
    node.remark = qs.get("remarks").cloned().unwrap_or_default();
    if !node.has_valid_port() {
        return unknown();
    }
    node
}

fn explode_telegram_http(link: &str) -> Node {
    let qs = link.split_once('?').map(|(_, q)| parse_query(q)).unwrap_or_default();
    let host = qs.get("server").cloned().unwrap_or_default();
    let Some(port) = qs.get("port").and_then(|p| p.parse::<u16>().ok()) else {
        return unknown();
    };
    let https = qs.get("secure").map(|s| s == "1" || s == "true").unwrap_or(false);
    let mut node = Node::new(if https { ProxyType::Https } else { ProxyType::Http }, host, port);
    node.username = qs.get("user").cloned().unwrap_or_default();
    node.password = qs.get("pass").cloned().unwrap_or_default();
    node.group = qs.get("group").cloned().unwrap_or_default();
    node.remark = qs.get("remarks").cloned().unwrap_or_default();
    if !node.has_valid_port() {
        return unknown();
    }
    node
}

/// Bare `http(s)://user:pw@host:port` treated as userinfo-base64 per §4.3.
fn explode_bare_http(link: &str) -> Node {
    let https = link.starts_with("https://");
    let rest = link.splitn(2, "://").nth(1).unwrap_or_default();
    let Some(decoded) = decode_base64_string_lenient(rest) else {
        return unknown();
    };
    let (userinfo, hostport) = match decoded.rsplit_once('@') {
        Some(x) => x,
        None => return unknown(),
    };
    let (host, port) = match hostport.rsplit_once(':') {
        Some(x) => x,
        None => return unknown(),
    };
    let Ok(port) = port.parse::<u16>() else {
        return unknown();
    };
    let (user, pass) = userinfo.split_once(':').unwrap_or((userinfo, ""));
    let mut node = Node::new(if https { ProxyType::Https } else { ProxyType::Http }, host, port);
    node.username = user.to_string();
    node.password = pass.to_string();
    if !node.has_valid_port() {
        return unknown();
    }
    node
}

fn explode_netch(rest: &str) -> Node {
    let Some(json_text) = decode_base64_string_lenient(rest) else {
        return unknown();
    };
    let Ok(v) = serde_json::from_str::<serde_json::Value>(&json_text) else {
        return unknown();
    };
    let node_type = get_str(&v, "Type").to_lowercase();
    let host = get_str(&v, "Hostname");
    let Ok(port) = get_str(&v, "Port").parse::<u16>() else {
        return unknown();
    };
    let mut node = match node_type.as_str() {
        "shadowsocks" | "ss" => {
            let mut n = Node::new(ProxyType::Shadowsocks, host, port);
            n.encrypt_method = get_str(&v, "EncryptMethod");
            n.password = get_str(&v, "Password");
            n
        }
        "vmess" => {
            let mut n = Node::new(ProxyType::VMess, host, port);
            n.user_id = get_str(&v, "UserID");
            n.transfer_protocol = TransferProtocol::parse(&get_str(&v, "TransferProtocol"));
            n.path = get_str(&v, "Path");
            n.host = get_str(&v, "Host");
            n.ensure_vmess_defaults();
            n
        }
        "socks5" | "socks" => {
            let mut n = Node::new(ProxyType::Socks5, host, port);
            n.username = get_str(&v, "Username");
            n.password = get_str(&v, "Password");
            n
        }
        "trojan" => {
            let mut n = Node::new(ProxyType::Trojan, host, port);
            n.password = get_str(&v, "Password");
            n
        }
        _ => return unknown(),
    };
    node.remark = get_str(&v, "Remark");
    node.group = get_str(&v, "Group");
    if !node.has_valid_port() {
        return unknown();
    }
    node
}

/// `surge:///install-config?url=...` re-parses the URL-decoded target.
fn explode_surge_install_config(link: &str) -> Node {
    let Some((_, query)) = link.split_once('?') else {
        return unknown();
    };
    let qs = parse_query(query);
    match qs.get("url") {
        Some(inner) => explode(inner),
        None => unknown(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ss_plain_form_parses() {
        let n = explode("ss://aes-256-gcm:pw@1.2.3.4:443#Hong-Kong");
        assert_eq!(n.node_type, ProxyType::Shadowsocks);
        assert_eq!(n.hostname, "1.2.3.4");
        assert_eq!(n.port, 443);
        assert_eq!(n.encrypt_method, "aes-256-gcm");
        assert_eq!(n.password, "pw");
        assert_eq!(n.remark, "Hong-Kong");
    }

    #[test]
    fn ss_base64_whole_form_parses() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("aes-256-gcm:pw@1.2.3.4:443");
        let link = format!("ss://{}#Remark", encoded);
        let n = explode(&link);
        assert_eq!(n.node_type, ProxyType::Shadowsocks);
        assert_eq!(n.port, 443);
    }

    #[test]
    fn ssr_downgrades_to_ss_when_plain_origin_native_cipher() {
        let inner = "1.2.3.4:8080:origin:aes-256-cfb:plain:cGFzcw/?remarks=dGVzdA&group=Z3JvdXA";
        let encoded = base64::engine::general_purpose::URL_SAFE.encode(inner);
        let n = explode(&format!("ssr://{}", encoded));
        assert_eq!(n.node_type, ProxyType::Shadowsocks);
        assert_eq!(n.hostname, "1.2.3.4");
        assert_eq!(n.port, 8080);
    }

    #[test]
    fn vmess_standard_form_parses() {
        let n = explode("vmess://uuid-here@v.example:443?type=ws&path=%2Fray&host=cdn.example&security=tls&sni=cdn.example#Node");
        assert_eq!(n.node_type, ProxyType::VMess);
        assert_eq!(n.hostname, "v.example");
        assert_eq!(n.port, 443);
        assert_eq!(n.transfer_protocol, TransferProtocol::Ws);
        assert_eq!(n.path, "/ray");
        assert!(n.tls_secure);
    }

    #[test]
    fn vmess_v2rayn_json_form_parses() {
        let json = r#"{"add":"v.example","port":"443","id":"uuid","aid":"0","net":"ws","path":"/ray","host":"cdn.example","tls":"tls"}"#;
        let encoded = base64::engine::general_purpose::STANDARD.encode(json);
        let n = explode(&format!("vmess://{}", encoded));
        assert_eq!(n.node_type, ProxyType::VMess);
        assert_eq!(n.hostname, "v.example");
        assert_eq!(n.port, 443);
        assert_eq!(n.user_id, "uuid");
        assert!(n.tls_secure);
    }

    #[test]
    fn port_zero_is_dropped() {
        let n = explode("ss://aes-256-gcm:pw@1.2.3.4:0#X");
        assert_eq!(n.node_type, ProxyType::Unknown);
    }

    #[test]
    fn garbage_link_is_unknown_not_panic() {
        let n = explode("totally-not-a-link");
        assert_eq!(n.node_type, ProxyType::Unknown);
    }

    #[test]
    fn trojan_link_parses_ws_and_sni() {
        let n = explode("trojan://pw@host:443?sni=example.com&ws=1&wspath=%2Fpath#R");
        assert_eq!(n.node_type, ProxyType::Trojan);
        assert_eq!(n.server_name, "example.com");
        assert_eq!(n.transfer_protocol, TransferProtocol::Ws);
        assert_eq!(n.path, "/path");
    }
}
