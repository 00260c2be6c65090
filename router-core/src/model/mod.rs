//! The in-memory node model (§3.1) and the small DTOs layered on top of it:
//! group templates, ruleset templates, regex transforms, and the
//! request/response facade types.

mod node;

pub use node::{Node, ProxyType, TransferProtocol};
