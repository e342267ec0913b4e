//! Compiled templates
//!
//! [`compile`] parses source text once into a [`Template`]. A template is immutable apart from
//! partial registration and its field cache, and can be rendered from many threads at once:
//! share it behind an `Arc` after registering its partials.
//!
//! ```text
//! let mut page = compile("<h1>{{ title | upper }}</h1>{{ include \"footer\" }}")?;
//! page.register_partial("footer", compile("<footer>{{ site }}</footer>")?);
//! let html = page.render_to_string(&data)?;
//! ```

use crate::stencil::accessor::FieldCache;
use crate::stencil::ast::Node;
use crate::stencil::config::StencilConfig;
use crate::stencil::context::Context;
use crate::stencil::error::{CompileResult, RenderResult};
use crate::stencil::filters::Filters;
use crate::stencil::parsing::{parse, Delimiters};
use crate::stencil::pool::BUFFERS;
use crate::stencil::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, trace};

const DEFAULT_MAX_INCLUDE_DEPTH: usize = 32;

/// Settings applied when compiling a template
#[derive(Debug, Clone)]
pub struct CompileOptions {
    delimiters: Delimiters,
    filters: Arc<Filters>,
    max_include_depth: usize,
    escape_html: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            delimiters: Delimiters::default(),
            filters: Filters::defaults(),
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            escape_html: true,
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &StencilConfig) -> Self {
        Self::default()
            .delimiters(&*config.delimiters.left, &*config.delimiters.right)
            .max_include_depth(config.render.max_include_depth)
            .escape_html(config.render.escape_html)
    }

    pub fn delimiters(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.delimiters = Delimiters::new(left, right);
        self
    }

    /// Use `filters` instead of the default registry
    pub fn filters(mut self, filters: impl Into<Arc<Filters>>) -> Self {
        self.filters = filters.into();
        self
    }

    pub fn max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    /// When off, output tags write their text unescaped
    pub fn escape_html(mut self, escape: bool) -> Self {
        self.escape_html = escape;
        self
    }
}

/// Compile with the default delimiters and filters
pub fn compile(source: &str) -> CompileResult<Template> {
    compile_with(source, CompileOptions::default())
}

pub fn compile_with(source: &str, options: CompileOptions) -> CompileResult<Template> {
    let root = match parse(source, &options.delimiters) {
        Ok(root) => root,
        Err(err) => {
            debug!(error = %err, "template failed to compile");
            return Err(err);
        }
    };
    debug!(
        nodes = root.count(),
        left = %options.delimiters.left,
        right = %options.delimiters.right,
        "compiled template"
    );

    Ok(Template {
        root,
        partials: HashMap::new(),
        filters: options.filters,
        fields: FieldCache::new(),
        max_include_depth: options.max_include_depth,
        escape_html: options.escape_html,
    })
}

/// A compiled template, ready to render
pub struct Template {
    root: Node,
    partials: HashMap<Box<str>, Arc<Template>>,
    filters: Arc<Filters>,
    fields: FieldCache,
    max_include_depth: usize,
    escape_html: bool,
}

impl Template {
    /// Make `partial` available to `include "<name>"`, replacing any partial of the same name.
    ///
    /// Includes are resolved against the partials of the template being rendered, also from
    /// inside a partial, so register every partial the include chain needs here.
    pub fn register_partial(
        &mut self,
        name: impl Into<Box<str>>,
        partial: impl Into<Arc<Template>>,
    ) -> &mut Self {
        let name = name.into();
        trace!(partial = %name, "registering partial");
        self.partials.insert(name, partial.into());
        self
    }

    pub fn partial(&self, name: &str) -> Option<&Arc<Template>> {
        self.partials.get(name)
    }

    /// Registered partial names in sorted order
    pub fn partial_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.partials.keys().map(|name| &**name).collect();
        names.sort_unstable();
        names
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn fields(&self) -> &FieldCache {
        &self.fields
    }

    pub fn max_include_depth(&self) -> usize {
        self.max_include_depth
    }

    pub fn escape_html(&self) -> bool {
        self.escape_html
    }

    /// Render against `data` into `out`.
    ///
    /// Output is written as rendering proceeds. When an error is returned, whatever was written
    /// before the failing tag is already in `out`.
    pub fn render(&self, data: &Value, mut out: impl Write) -> RenderResult<()> {
        let mut ctx = Context::new(self, data.clone());
        self.root.render(&mut ctx, &mut out).map_err(|err| {
            debug!(error = %err, "render failed");
            err
        })
    }

    pub fn render_to_string(&self, data: &Value) -> RenderResult<String> {
        let mut buffer = BUFFERS.acquire();
        self.render(data, &mut *buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn render_to_bytes(&self, data: &Value) -> RenderResult<Vec<u8>> {
        let mut buffer = BUFFERS.acquire();
        self.render(data, &mut *buffer)?;
        Ok(buffer.to_vec())
    }

    /// Resolve every path in this template and its partials against `sample`, filling the field
    /// cache for the record shapes it contains. Paths rooted at a local binding are skipped.
    pub fn warm_fields(&self, sample: &Value) {
        let ctx = Context::new(self, sample.clone());
        let roots = std::iter::once(&self.root).chain(self.partials.values().map(|p| p.root()));
        for accessor in roots.flat_map(Node::accessors) {
            ctx.resolve(accessor);
        }
        trace!(entries = self.fields.len(), "warmed field cache");
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("nodes", &self.root.count())
            .field("partials", &self.partial_names())
            .field("filters", &self.filters)
            .field("max_include_depth", &self.max_include_depth)
            .field("escape_html", &self.escape_html)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stencil::config::Loader;
    use crate::stencil::error::RenderError;
    use serde_json::json;

    fn assert_send_sync<T: Send + Sync>() {}

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    #[test]
    fn test_template_is_shareable() {
        assert_send_sync::<Template>();
    }

    #[test]
    fn test_render_to_string_and_bytes() {
        let template = compile("Hello, {{ name }}!").unwrap();
        let data = Value::from(json!({"name": "Ada"}));
        assert_eq!(template.render_to_string(&data).unwrap(), "Hello, Ada!");
        assert_eq!(template.render_to_bytes(&data).unwrap(), b"Hello, Ada!");
    }

    #[test]
    fn test_render_into_writer() {
        let template = compile("{{ n }}").unwrap();
        let mut out: Vec<u8> = Vec::new();
        template
            .render(&Value::from(json!({"n": 7})), &mut out)
            .unwrap();
        assert_eq!(out, b"7");
    }

    #[test]
    fn test_options_from_config() {
        let config = Loader::new()
            .set_override("delimiters.left", "<%")
            .unwrap()
            .set_override("delimiters.right", "%>")
            .unwrap()
            .set_override("render.escape_html", false)
            .unwrap()
            .build()
            .unwrap();
        let template = compile_with("<% v %>", CompileOptions::from_config(&config)).unwrap();
        assert!(!template.escape_html());
        let data = Value::from(json!({"v": "<b>"}));
        assert_eq!(template.render_to_string(&data).unwrap(), "<b>");
    }

    #[test]
    fn test_register_partial_replaces() {
        init_tracing();
        let mut page = compile("[{{ include \"p\" }}]").unwrap();
        page.register_partial("p", compile("one").unwrap());
        page.register_partial("p", compile("two").unwrap());
        assert_eq!(page.partial_names(), vec!["p"]);
        assert_eq!(page.render_to_string(&Value::Null).unwrap(), "[two]");
    }

    #[test]
    fn test_include_depth_limit() {
        init_tracing();
        let mut page = compile_with(
            "{{ include \"self\" }}",
            CompileOptions::default().max_include_depth(3),
        )
        .unwrap();
        page.register_partial("self", compile("x{{ include \"self\" }}").unwrap());
        let err = page.render_to_string(&Value::Null).unwrap_err();
        assert!(matches!(
            err,
            RenderError::IncludeDepthExceeded { ref name, limit: 3 } if name == "self"
        ));
    }

    #[test]
    fn test_warm_fields_fills_cache() {
        struct Row {
            id: i64,
        }
        crate::impl_record!(Row { id });

        let template = compile("{{ row.id }}{{ row.missing }}{{ $local.id }}").unwrap();
        let sample = Value::map([("row", Value::from(Row { id: 1 }))]);
        assert!(template.fields().is_empty());
        template.warm_fields(&sample);
        assert_eq!(template.fields().len(), 2);
    }
}
