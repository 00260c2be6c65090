//! The script VM shim (C2, §4.2): a narrow interface over an embedded JS
//! engine so the rest of the pipeline never depends on QuickJS directly.
//! Behind the `script` feature this is backed by `rquickjs`; without it,
//! every entry point reports "unauthorized" and the caller skips the
//! transform, matching the error-taxonomy policy for `ScriptError`.

use crate::model::Node;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    Parse,
    Filter,
    Rename,
    GetEmoji,
    Compare,
}

impl EntryPoint {
    fn name(self) -> &'static str {
        match self {
            EntryPoint::Parse => "parse",
            EntryPoint::Filter => "filter",
            EntryPoint::Rename => "rename",
            EntryPoint::GetEmoji => "getEmoji",
            EntryPoint::Compare => "compare",
        }
    }
}

/// Per-invocation options: timeout and whether to use a fresh runtime.
#[derive(Debug, Clone, Copy)]
pub struct ScriptOptions {
    pub timeout: Duration,
    pub clean_context: bool,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        ScriptOptions {
            timeout: Duration::from_secs(3),
            clean_context: false,
        }
    }
}

/// A node's fields exposed read/write to script, mirrored back into a
/// `Node` after the call returns.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ScriptNode {
    pub remark: String,
    pub hostname: String,
    pub port: u16,
    pub group: String,
    #[serde(rename = "type")]
    pub node_type: String,
}

impl From<&Node> for ScriptNode {
    fn from(n: &Node) -> Self {
        ScriptNode {
            remark: n.remark.clone(),
            hostname: n.hostname.clone(),
            port: n.port,
            group: n.group.clone(),
            node_type: n.node_type.to_string(),
        }
    }
}

pub trait ScriptEngine: Send + Sync {
    /// Evaluates `code`, then calls the named entry point (if present) with
    /// `node` bound into scope, returning its string result. Returns `Err`
    /// on a script exception, a timeout, or (when unauthorized) always.
    fn call(
        &self,
        code: &str,
        entry: EntryPoint,
        node: Option<&Node>,
        args: &[&str],
        opts: ScriptOptions,
    ) -> Result<String, String>;

    fn authorized(&self) -> bool;
}

/// Used when the `script` feature is disabled, or when the caller has not
/// opted into script execution (`enable_script` in `Settings`). Scripts
/// silently do not run, per §4.2.
pub struct DisabledEngine;

impl ScriptEngine for DisabledEngine {
    fn call(
        &self,
        _code: &str,
        _entry: EntryPoint,
        _node: Option<&Node>,
        _args: &[&str],
        _opts: ScriptOptions,
    ) -> Result<String, String> {
        Err("script execution is not authorized".to_string())
    }

    fn authorized(&self) -> bool {
        false
    }
}

#[cfg(feature = "script")]
pub use quickjs_engine::QuickJsEngine;

#[cfg(feature = "script")]
mod quickjs_engine {
    use super::*;
    use rquickjs::{Context, Runtime};
    use std::sync::Mutex;

    /// A QuickJS-backed engine. When `clean_context` is requested the call
    /// builds a fresh `Runtime`/`Context` pair; otherwise a shared context
    /// is reused (cheaper, risks state bleed between requests per §4.2).
    pub struct QuickJsEngine {
        shared: Mutex<(Runtime, Context)>,
    }

    impl QuickJsEngine {
        pub fn new() -> Self {
            let rt = Runtime::new().expect("quickjs runtime");
            let ctx = Context::full(&rt).expect("quickjs context");
            QuickJsEngine {
                shared: Mutex::new((rt, ctx)),
            }
        }

        fn run_in(ctx: &Context, code: &str, entry: EntryPoint, node: Option<&Node>, args: &[&str]) -> Result<String, String> {
            ctx.with(|ctx| {
                ctx.eval::<(), _>(code).map_err(|e| e.to_string())?;
                let globals = ctx.globals();
                let func: rquickjs::Function = globals
                    .get(entry.name())
                    .map_err(|_| format!("entry point `{}` not defined", entry.name()))?;

                let result: rquickjs::Value = if let Some(n) = node {
                    let script_node = ScriptNode::from(n);
                    let obj = rquickjs::Object::new(ctx.clone()).map_err(|e| e.to_string())?;
                    obj.set("remark", script_node.remark.clone()).ok();
                    obj.set("hostname", script_node.hostname.clone()).ok();
                    obj.set("port", script_node.port).ok();
                    obj.set("group", script_node.group.clone()).ok();
                    obj.set("type", script_node.node_type.clone()).ok();
                    func.call((obj,)).map_err(|e| e.to_string())?
                } else {
                    let arg_strings: Vec<String> = args.iter().map(|s| s.to_string()).collect();
                    func.call((arg_strings,)).map_err(|e| e.to_string())?
                };

                result
                    .as_string()
                    .map(|s| s.to_string().unwrap_or_default())
                    .or_else(|| result.as_int().map(|i| i.to_string()))
                    .ok_or_else(|| "script did not return a string".to_string())
            })
        }
    }

    impl ScriptEngine for QuickJsEngine {
        fn call(
            &self,
            code: &str,
            entry: EntryPoint,
            node: Option<&Node>,
            args: &[&str],
            opts: ScriptOptions,
        ) -> Result<String, String> {
            // The interrupt handler in the original design inspects wall-clock
            // time from within QuickJS's interrupt callback; `rquickjs`
            // exposes the same hook via `Runtime::set_interrupt_handler`.
            let deadline = std::time::Instant::now() + opts.timeout;

            if opts.clean_context {
                let rt = Runtime::new().map_err(|e| e.to_string())?;
                rt.set_interrupt_handler(Some(Box::new(move || std::time::Instant::now() > deadline)));
                let ctx = Context::full(&rt).map_err(|e| e.to_string())?;
                return Self::run_in(&ctx, code, entry, node, args);
            }

            let guard = self.shared.lock().map_err(|_| "script engine poisoned".to_string())?;
            guard.0.set_interrupt_handler(Some(Box::new(move || std::time::Instant::now() > deadline)));
            Self::run_in(&guard.1, code, entry, node, args)
        }

        fn authorized(&self) -> bool {
            true
        }
    }
}

#[cfg(all(test, not(feature = "script")))]
mod tests {
    use super::*;

    #[test]
    fn disabled_engine_never_runs() {
        let engine = DisabledEngine;
        assert!(!engine.authorized());
        assert!(engine
            .call("function rename(n){return n.remark}", EntryPoint::Rename, None, &[], ScriptOptions::default())
            .is_err());
    }
}

#[cfg(all(test, feature = "script"))]
mod quickjs_tests {
    use super::*;

    #[test]
    fn rename_entry_point_runs_against_bound_node() {
        let engine = QuickJsEngine::new();
        let mut node = Node::new(crate::model::ProxyType::Shadowsocks, "h", 443);
        node.remark = "old".to_string();
        let out = engine
            .call(
                "function rename(n) { return n.remark + '-renamed'; }",
                EntryPoint::Rename,
                Some(&node),
                &[],
                ScriptOptions::default(),
            )
            .unwrap();
        assert_eq!(out, "old-renamed");
    }
}
