//! Bulk-format parsers (C4, §4.4): each takes the whole body of one
//! subscription document and returns every node it contains. Dispatch is
//! driven by [`crate::parser::detect::detect_format`].

mod clash;
mod json_configs;
mod quantumultx;
mod ssd;
mod surge;

use crate::model::Node;
use crate::parser::detect::{detect_format, ContentFormat};

pub use clash::parse_clash_yaml;
pub use json_configs::{parse_netch_json, parse_ss_android_json, parse_ss_native_json, parse_sstap_json, parse_ssr_native_json};
pub use quantumultx::parse_quantumultx_lines;
pub use ssd::parse_ssd_link;
pub use surge::parse_surge_ini;

/// Parses every node out of `content`, whatever bulk format it turns out to
/// be, falling back to one-link-per-line when nothing more specific matches.
pub fn parse_bulk_content(content: &str) -> Vec<Node> {
    match detect_format(content) {
        ContentFormat::SsdLink => parse_ssd_link(content).into_iter().collect(),
        ContentFormat::ClashYaml => parse_clash_yaml(content),
        ContentFormat::SurgeIni => parse_surge_ini(content),
        ContentFormat::QuantumultX => parse_quantumultx_lines(content),
        ContentFormat::SsNativeJson => parse_ss_native_json(content),
        ContentFormat::SsrNativeJson => parse_ssr_native_json(content),
        ContentFormat::SsAndroidJson => parse_ss_android_json(content),
        ContentFormat::SsTapJson => parse_sstap_json(content),
        ContentFormat::NetchJson => parse_netch_json(content),
        ContentFormat::WireGuardConf => {
            vec![crate::parser::wireguard::parse_wireguard_conf(content, "")]
        }
        ContentFormat::LinkList | ContentFormat::Unknown => parse_link_list(content),
    }
}

/// One link per non-empty line, and also the base64-of-the-whole-document
/// dialect some subscription hosts serve (§4.4, "SUB" in the original
/// format taxonomy).
fn parse_link_list(content: &str) -> Vec<Node> {
    let text = if content.lines().filter(|l| !l.trim().is_empty()).any(|l| l.contains("://")) {
        content.to_string()
    } else if let Some(decoded) = crate::parser::link::decode_base64_string_lenient(content) {
        decoded
    } else {
        content.to_string()
    };

    text.lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(crate::parser::link::explode)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProxyType;

    #[test]
    fn bulk_content_falls_back_to_link_list() {
        let content = "ss://aes-256-gcm:pw@1.2.3.4:443#A\nss://aes-256-gcm:pw@5.6.7.8:443#B\n";
        let nodes = parse_bulk_content(content);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].node_type, ProxyType::Shadowsocks);
    }

    #[test]
    fn base64_whole_document_link_list_decodes() {
        use base64::Engine as _;
        let inner = "ss://aes-256-gcm:pw@1.2.3.4:443#A\nss://aes-256-gcm:pw@5.6.7.8:443#B";
        let encoded = base64::engine::general_purpose::STANDARD.encode(inner);
        let nodes = parse_bulk_content(&encoded);
        assert_eq!(nodes.len(), 2);
    }
}
