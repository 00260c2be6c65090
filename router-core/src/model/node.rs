//! The `Node` record (called `Proxy` in the wire formats it was parsed
//! from). One struct carries every tag's attributes for ergonomics; the
//! `ProxyType` tag says which of them are actually meaningful — see §3.1.

use crate::tribool::TriBool;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProxyType {
    Unknown,
    Shadowsocks,
    ShadowsocksR,
    VMess,
    Trojan,
    Snell,
    Http,
    Https,
    Socks5,
    WireGuard,
    Hysteria,
    Hysteria2,
}

impl Default for ProxyType {
    fn default() -> Self {
        ProxyType::Unknown
    }
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProxyType::Unknown => "unknown",
            ProxyType::Shadowsocks => "ss",
            ProxyType::ShadowsocksR => "ssr",
            ProxyType::VMess => "vmess",
            ProxyType::Trojan => "trojan",
            ProxyType::Snell => "snell",
            ProxyType::Http => "http",
            ProxyType::Https => "https",
            ProxyType::Socks5 => "socks5",
            ProxyType::WireGuard => "wireguard",
            ProxyType::Hysteria => "hysteria",
            ProxyType::Hysteria2 => "hysteria2",
        };
        f.write_str(s)
    }
}

/// Transport mux used to carry the proxy's payload. Canonical form is
/// lower-case; an empty/absent value means `Tcp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferProtocol {
    Tcp,
    Ws,
    Http,
    H2,
    Grpc,
    Quic,
    Kcp,
}

impl Default for TransferProtocol {
    fn default() -> Self {
        TransferProtocol::Tcp
    }
}

impl TransferProtocol {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "tcp" => TransferProtocol::Tcp,
            "ws" | "websocket" => TransferProtocol::Ws,
            "http" => TransferProtocol::Http,
            "h2" => TransferProtocol::H2,
            "grpc" => TransferProtocol::Grpc,
            "quic" => TransferProtocol::Quic,
            "kcp" => TransferProtocol::Kcp,
            _ => TransferProtocol::Tcp,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferProtocol::Tcp => "tcp",
            TransferProtocol::Ws => "ws",
            TransferProtocol::Http => "http",
            TransferProtocol::H2 => "h2",
            TransferProtocol::Grpc => "grpc",
            TransferProtocol::Quic => "quic",
            TransferProtocol::Kcp => "kcp",
        }
    }
}

/// The all-zero UUID used as the default VMess user id when a link omits one.
pub const NIL_UUID: &str = "00000000-0000-0000-0000-000000000000";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    // Identity, assigned by the preprocessor.
    pub id: usize,
    pub group_id: i32,
    pub group: String,
    pub remark: String,

    pub node_type: ProxyType,
    pub hostname: String,
    pub port: u16,

    pub udp: TriBool,
    pub tcp_fast_open: TriBool,
    pub allow_insecure: TriBool,
    pub tls13: TriBool,

    // Credentials
    pub username: String,
    pub password: String,
    pub user_id: String,

    // Cipher / SS
    pub encrypt_method: String,
    pub plugin: String,
    pub plugin_option: String,

    // SSR
    pub protocol: String,
    pub protocol_param: String,
    pub obfs: String,
    pub obfs_param: String,

    // Transport / mux
    pub transfer_protocol: TransferProtocol,
    pub host: String,
    pub path: String,
    pub edge: String,
    pub server_name: String,
    pub fake_type: String,
    pub tls_secure: bool,

    // QUIC
    pub quic_secure: String,
    pub quic_secret: String,

    // WireGuard
    pub self_ip: String,
    pub self_ipv6: String,
    pub private_key: String,
    pub public_key: String,
    pub pre_shared_key: String,
    pub dns_servers: Vec<String>,
    pub mtu: u32,
    pub keep_alive: u32,
    pub allowed_ips: String,
    pub client_id: String,

    // Hysteria
    pub ports: String,
    pub up: String,
    pub down: String,
    pub auth_str: String,
    pub sni: String,
    pub fingerprint: String,
    pub alpn: Vec<String>,
    pub hop_interval: u32,
    pub recv_window_conn: u64,
    pub recv_window: u64,
    pub disable_mtu_discovery: bool,
}

impl Default for Node {
    fn default() -> Self {
        Node {
            id: 0,
            group_id: 0,
            group: String::new(),
            remark: String::new(),
            node_type: ProxyType::Unknown,
            hostname: String::new(),
            port: 0,
            udp: TriBool::Undef,
            tcp_fast_open: TriBool::Undef,
            allow_insecure: TriBool::Undef,
            tls13: TriBool::Undef,
            username: String::new(),
            password: String::new(),
            user_id: String::new(),
            encrypt_method: String::new(),
            plugin: String::new(),
            plugin_option: String::new(),
            protocol: String::new(),
            protocol_param: String::new(),
            obfs: String::new(),
            obfs_param: String::new(),
            transfer_protocol: TransferProtocol::Tcp,
            host: String::new(),
            path: String::new(),
            edge: String::new(),
            server_name: String::new(),
            fake_type: String::new(),
            tls_secure: false,
            quic_secure: String::new(),
            quic_secret: String::new(),
            self_ip: String::new(),
            self_ipv6: String::new(),
            private_key: String::new(),
            public_key: String::new(),
            pre_shared_key: String::new(),
            dns_servers: Vec::new(),
            mtu: 0,
            keep_alive: 0,
            allowed_ips: String::new(),
            client_id: String::new(),
            ports: String::new(),
            up: String::new(),
            down: String::new(),
            auth_str: String::new(),
            sni: String::new(),
            fingerprint: String::new(),
            alpn: Vec::new(),
            hop_interval: 0,
            recv_window_conn: 0,
            recv_window: 0,
            disable_mtu_discovery: false,
        }
    }
}

impl Node {
    pub fn new(node_type: ProxyType, hostname: impl Into<String>, port: u16) -> Self {
        Node {
            node_type,
            hostname: hostname.into(),
            port,
            ..Default::default()
        }
    }

    /// §3.1 invariant: `1 <= port <= 65535`; `port == 0` marks the node for
    /// drop during parsing.
    pub fn has_valid_port(&self) -> bool {
        self.port != 0
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.node_type, ProxyType::Unknown)
    }

    /// Falls back to `Hostname:Port` when the remark is empty, per §3.1.
    pub fn display_remark(&self) -> String {
        if self.remark.is_empty() {
            format!("{}:{}", self.hostname, self.port)
        } else {
            self.remark.clone()
        }
    }

    pub fn finalize_remark(&mut self) {
        if self.remark.is_empty() {
            self.remark = format!("{}:{}", self.hostname, self.port);
        }
    }

    /// VMess defaults `user_id` to the all-zero UUID when missing.
    pub fn ensure_vmess_defaults(&mut self) {
        if self.node_type == ProxyType::VMess && self.user_id.is_empty() {
            self.user_id = NIL_UUID.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_port_is_invalid() {
        let n = Node::new(ProxyType::Shadowsocks, "1.2.3.4", 0);
        assert!(!n.has_valid_port());
    }

    #[test]
    fn remark_falls_back_to_host_port() {
        let mut n = Node::new(ProxyType::Shadowsocks, "1.2.3.4", 443);
        n.finalize_remark();
        assert_eq!(n.remark, "1.2.3.4:443");
    }

    #[test]
    fn vmess_defaults_user_id_to_nil_uuid() {
        let mut n = Node::new(ProxyType::VMess, "v.example", 443);
        n.ensure_vmess_defaults();
        assert_eq!(n.user_id, NIL_UUID);
    }
}
