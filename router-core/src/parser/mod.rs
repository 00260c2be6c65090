//! The parsing layer: link parsers (C3), bulk-format parsers (C4), and the
//! format detector (C5), unified behind [`parse_subscription`].

pub mod bulk;
pub mod detect;
pub mod link;
pub mod wireguard;

use crate::model::Node;

pub use link::explode;

/// Parses one fetched subscription document into its node list, whatever
/// format it turns out to be (§4.3-§4.5 combined entry point).
pub fn parse_subscription(content: &str) -> Vec<Node> {
    bulk::parse_bulk_content(content)
        .into_iter()
        .filter(|n| !n.is_unknown())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_link_list_dropping_unknowns() {
        let content = "ss://aes-256-gcm:pw@1.2.3.4:443#A\ngarbage\ntrojan://pw@host:443?sni=s.com#B\n";
        let nodes = parse_subscription(content);
        assert_eq!(nodes.len(), 2);
    }
}
