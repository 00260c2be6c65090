//! # Router Core
//!
//! The conversion pipeline at the heart of the subscription converter: link
//! and bulk parsers that normalize a dozen proxy descriptor encodings into
//! one [`model::Node`] model, a preprocessor that filters/renames/sorts the
//! resulting node list, a ruleset engine that fetches and rewrites routing
//! rules, a group builder that expands proxy-group templates, and a set of
//! per-target emitters that re-serialize everything into the config dialect
//! a given client application understands.
//!
//! This crate is deliberately ignorant of how it is invoked: [`facade`]
//! exposes a single [`facade::Request`] → [`facade::Response`] entry point
//! consumed by both the HTTP service (`router-api`) and the one-shot
//! generator (`router-cli`).

pub mod error;
pub mod tribool;
pub mod model;
pub mod regex_match;
pub mod group;
pub mod ruleset;
pub mod fetch;
pub mod script;
pub mod parser;
pub mod preprocess;
pub mod group_builder;
pub mod emit;
pub mod template;
pub mod useragent;
pub mod settings;
pub mod facade;

pub use error::CoreError;
pub use model::{Node, ProxyType};
pub use settings::{ExtraSettings, Settings};
