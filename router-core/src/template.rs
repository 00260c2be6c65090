//! Template renderer (C10, §4.10): a `tinytemplate` wrapper exposing
//! namespaced variable lookup (`global.*`, `request.*`, `local.*`) and the
//! callable surface as pipe-style formatters, `tinytemplate`'s native
//! mechanism for invoking a function on a value.

use crate::error::{CoreError, CoreResult};
use crate::fetch::Fetcher;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tinytemplate::TinyTemplate;

/// The three namespaces a template can read (§4.10), merged into one
/// object so dotted paths like `request.target` resolve directly.
pub struct TemplateVars {
    pub global: Map<String, Value>,
    pub request: Map<String, Value>,
    pub local: Map<String, Value>,
}

impl TemplateVars {
    pub fn new() -> Self {
        TemplateVars {
            global: Map::new(),
            request: Map::new(),
            local: Map::new(),
        }
    }

    fn into_context(self) -> Value {
        let mut root = Map::new();
        root.insert("global".to_string(), Value::Object(self.global));
        root.insert("request".to_string(), Value::Object(self.request));
        root.insert("local".to_string(), Value::Object(self.local));
        Value::Object(root)
    }
}

impl Default for TemplateVars {
    fn default() -> Self {
        Self::new()
    }
}

fn value_as_str(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string().trim_matches('"').to_string(),
    }
}

fn fmt_url_encode(value: &Value, out: &mut String) -> tinytemplate::error::Result<()> {
    out.push_str(&urlencoding::encode(&value_as_str(value)));
    Ok(())
}

fn fmt_url_decode(value: &Value, out: &mut String) -> tinytemplate::error::Result<()> {
    out.push_str(&urlencoding::decode(&value_as_str(value)).map(|s| s.into_owned()).unwrap_or_default());
    Ok(())
}

fn fmt_trim(value: &Value, out: &mut String) -> tinytemplate::error::Result<()> {
    out.push_str(value_as_str(value).trim());
    Ok(())
}

fn fmt_bool(value: &Value, out: &mut String) -> tinytemplate::error::Result<()> {
    let truthy = match value {
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty() && s != "0" && s.to_lowercase() != "false",
        Value::Null => false,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        _ => true,
    };
    out.push_str(if truthy { "true" } else { "false" });
    Ok(())
}

fn fmt_string(value: &Value, out: &mut String) -> tinytemplate::error::Result<()> {
    out.push_str(&value_as_str(value));
    Ok(())
}

/// Renders a template against the three namespaces, resolving a leading
/// fetch-prefetch pass so the synchronous `tinytemplate` render never
/// blocks on network I/O.
pub struct TemplateRenderer<'a> {
    fetcher: &'a Fetcher,
    template_root: PathBuf,
}

impl<'a> TemplateRenderer<'a> {
    pub fn new(fetcher: &'a Fetcher, template_root: impl Into<PathBuf>) -> Self {
        TemplateRenderer {
            fetcher,
            template_root: template_root.into(),
        }
    }

    /// Resolves an `{% include "path" %}` reference against the configured
    /// template root, rejecting escapes the same way the fetcher's local
    /// file path does (§4.1 scope rule, reused per §4.10).
    pub fn resolve_include(&self, rel_path: &str) -> CoreResult<PathBuf> {
        let candidate = self.template_root.join(rel_path);
        if candidate.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(CoreError::TemplateError(format!("include path escapes template root: {}", rel_path)));
        }
        let canonical_root = self
            .template_root
            .canonicalize()
            .map_err(|e| CoreError::TemplateError(e.to_string()))?;
        let canonical = candidate
            .canonicalize()
            .map_err(|e| CoreError::TemplateError(format!("include not found: {}", rel_path)))?;
        if !canonical.starts_with(&canonical_root) {
            return Err(CoreError::TemplateError(format!("include path escapes template root: {}", rel_path)));
        }
        Ok(canonical)
    }

    /// Inlines every `{% include "path" %}` directive (recursively, up to a
    /// fixed depth to guard against cycles) before the `fetch`/formatter
    /// pass runs.
    fn expand_includes(&self, text: &str, depth: u8) -> CoreResult<String> {
        static INCLUDE_RE: once_cell::sync::Lazy<Regex> =
            once_cell::sync::Lazy::new(|| Regex::new(r#"\{%\s*include\s+"([^"]+)"\s*%\}"#).unwrap());
        if depth > 8 {
            return Err(CoreError::TemplateError("include depth exceeded".to_string()));
        }
        let mut out = String::new();
        let mut last = 0;
        for cap in INCLUDE_RE.captures_iter(text) {
            let m = cap.get(0).unwrap();
            out.push_str(&text[last..m.start()]);
            let path = &cap[1];
            let full_path = self.resolve_include(path)?;
            let body = std::fs::read_to_string(&full_path).map_err(|e| CoreError::TemplateError(e.to_string()))?;
            out.push_str(&self.expand_includes(&body, depth + 1)?);
            last = m.end();
        }
        out.push_str(&text[last..]);
        Ok(out)
    }

    /// Finds every `{fetch_url | fetch}`-style literal URL token of the
    /// form `{"<url>" | fetch}` and resolves it eagerly, substituting the
    /// fetched text directly so the synchronous render never touches the
    /// network.
    async fn expand_fetches(&self, text: &str) -> String {
        static FETCH_RE: once_cell::sync::Lazy<Regex> =
            once_cell::sync::Lazy::new(|| Regex::new(r#"\{\s*"([^"]+)"\s*\|\s*fetch\s*\}"#).unwrap());

        let mut cache: HashMap<String, String> = HashMap::new();
        let urls: Vec<String> = FETCH_RE.captures_iter(text).map(|c| c[1].to_string()).collect();
        for url in urls {
            if cache.contains_key(&url) {
                continue;
            }
            let body = self
                .fetcher
                .fetch(&url)
                .await
                .map(|b| String::from_utf8_lossy(&b).into_owned())
                .unwrap_or_default();
            cache.insert(url, body);
        }

        FETCH_RE
            .replace_all(text, |caps: &regex::Captures| cache.get(&caps[1]).cloned().unwrap_or_default())
            .into_owned()
    }

    pub async fn render(&self, raw_template: &str, vars: TemplateVars) -> CoreResult<String> {
        let expanded = self.expand_includes(raw_template, 0)?;
        let expanded = self.expand_fetches(&expanded).await;

        let mut tt = TinyTemplate::new();
        tt.add_formatter("UrlEncode", fmt_url_encode);
        tt.add_formatter("UrlDecode", fmt_url_decode);
        tt.add_formatter("trim", fmt_trim);
        tt.add_formatter("bool", fmt_bool);
        tt.add_formatter("string", fmt_string);
        tt.add_template("main", &expanded)
            .map_err(|e| CoreError::TemplateError(e.to_string()))?;

        let context = vars.into_context();
        tt.render("main", &context).map_err(|e| CoreError::TemplateError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn renders_namespaced_variable() {
        let fetcher = Fetcher::new_default();
        let renderer = TemplateRenderer::new(&fetcher, ".");
        let mut vars = TemplateVars::new();
        vars.request.insert("target".to_string(), Value::String("clash".to_string()));
        let out = renderer.render("Target: {request.target}", vars).await.unwrap();
        assert_eq!(out, "Target: clash");
    }

    #[tokio::test]
    async fn url_encode_formatter_applies() {
        let fetcher = Fetcher::new_default();
        let renderer = TemplateRenderer::new(&fetcher, ".");
        let mut vars = TemplateVars::new();
        vars.local.insert("raw".to_string(), Value::String("a b".to_string()));
        let out = renderer.render("{local.raw | UrlEncode}", vars).await.unwrap();
        assert_eq!(out, "a%20b");
    }

    #[tokio::test]
    async fn include_path_escape_is_rejected() {
        let fetcher = Fetcher::new_default();
        let renderer = TemplateRenderer::new(&fetcher, ".");
        let vars = TemplateVars::new();
        let result = renderer.render("{% include \"../../etc/passwd\" %}", vars).await;
        assert!(result.is_err());
    }
}
