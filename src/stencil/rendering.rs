//! Tree-walking renderer
//!
//! Every node renders against a [`Context`] and writes straight into the caller's sink. A render
//! error stops the walk at the failing node and propagates unchanged; output written before the
//! failure stays in the sink; no buffering or rollback happens here.
//!
//! Scoped state is always put back, including when a child fails: `range` restores the loop
//! name to its pre-loop binding, `with` restores the data scope and `include` restores the
//! include depth. A `let` inside a `range` or `with` body lasts until that body ends.

use crate::stencil::ast::{Node, Print};
use crate::stencil::context::Context;
use crate::stencil::error::{RenderError, RenderResult};
use crate::stencil::pool::TEXT;
use crate::stencil::value::Value;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::trace;

impl Node {
    pub fn render(&self, ctx: &mut Context<'_>, out: &mut dyn Write) -> RenderResult<()> {
        match self {
            Node::Text(text) => out.write_all(text.as_bytes()).map_err(RenderError::from),
            Node::Print(print) => print.render(ctx, out),
            Node::If {
                condition,
                then,
                otherwise,
            } => {
                let truthy = ctx
                    .resolve(condition)
                    .map_or(false, |value| value.is_truthy());
                match (truthy, otherwise) {
                    (true, _) => then.render(ctx, out),
                    (false, Some(otherwise)) => otherwise.render(ctx, out),
                    (false, None) => Ok(()),
                }
            }
            Node::Range {
                binding,
                iterable,
                body,
            } => match ctx.resolve(iterable) {
                Some(Value::Seq(items)) => render_each(ctx, out, binding, body, items.iter()),
                Some(Value::Map(entries)) => {
                    render_each(ctx, out, binding, body, entries.values())
                }
                _ => Ok(()),
            },
            Node::Let { binding, accessor } => {
                let value = ctx.resolve(accessor).unwrap_or_default();
                ctx.bind_scoped(binding, value);
                Ok(())
            }
            Node::With { accessor, body } => {
                let Some(scope) = ctx.resolve(accessor) else {
                    return Ok(());
                };
                let previous = ctx.replace_data(scope);
                let mark = ctx.scope_mark();
                let result = body.render(ctx, out);
                ctx.unwind(mark);
                ctx.replace_data(previous);
                result
            }
            Node::Include { name } => {
                let template = ctx.template();
                let partial = template
                    .partial(name)
                    .ok_or_else(|| RenderError::PartialNotFound {
                        name: name.to_string(),
                    })?;
                ctx.enter_include(name)?;
                trace!(partial = %name, depth = ctx.depth(), "rendering include");
                let result = partial.root().render(ctx, out);
                ctx.leave_include();
                result
            }
            Node::Sequence(nodes) => nodes.iter().try_for_each(|node| node.render(ctx, out)),
        }
    }
}

impl Print {
    fn render(&self, ctx: &mut Context<'_>, out: &mut dyn Write) -> RenderResult<()> {
        let Some(value) = ctx.resolve(&self.accessor) else {
            return Ok(());
        };
        let escape = !self.raw && ctx.template().escape_html();

        if self.pipes.is_empty() {
            if let Value::Str(text) = &value {
                return write_output(out, text, escape);
            }
            let mut text = TEXT.acquire();
            value.write_text(&mut text);
            return write_output(out, &text, escape);
        }

        let filters = ctx.filters();
        let mut text = value.to_text().into_owned();
        for pipe in self.pipes.iter() {
            text = filters.apply(pipe, &text)?;
        }
        write_output(out, &text, escape)
    }
}

/// Render `body` once per item with `binding` bound to it, then restore the prior binding.
/// Lets made in the body are undone after each pass.
fn render_each<'v>(
    ctx: &mut Context<'_>,
    out: &mut dyn Write,
    binding: &Arc<str>,
    body: &Node,
    items: impl Iterator<Item = &'v Value>,
) -> RenderResult<()> {
    let previous = ctx.bindings().get(binding).cloned();
    let mut result = Ok(());
    for item in items {
        ctx.bind(binding, item.clone());
        let mark = ctx.scope_mark();
        result = body.render(ctx, out);
        ctx.unwind(mark);
        if result.is_err() {
            break;
        }
    }
    ctx.restore(binding, previous);
    result
}

fn write_output(out: &mut dyn Write, text: &str, escape: bool) -> RenderResult<()> {
    if escape {
        write_escaped(out, text)?;
    } else {
        out.write_all(text.as_bytes())?;
    }
    Ok(())
}

/// Write `text` with `& < > " '` replaced by their HTML entities
pub fn write_escaped(out: &mut dyn Write, text: &str) -> io::Result<()> {
    let bytes = text.as_bytes();
    if !bytes.iter().any(|b| matches!(b, b'&' | b'<' | b'>' | b'"' | b'\'')) {
        return out.write_all(bytes);
    }

    let mut start = 0;
    for (i, byte) in bytes.iter().enumerate() {
        let entity: &[u8] = match byte {
            b'&' => b"&amp;",
            b'<' => b"&lt;",
            b'>' => b"&gt;",
            b'"' => b"&quot;",
            b'\'' => b"&#39;",
            _ => continue,
        };
        out.write_all(&bytes[start..i])?;
        out.write_all(entity)?;
        start = i + 1;
    }
    out.write_all(&bytes[start..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stencil::template::compile;
    use serde_json::json;

    fn escaped(text: &str) -> String {
        let mut out: Vec<u8> = Vec::new();
        write_escaped(&mut out, text).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_escape_entities() {
        assert_eq!(
            escaped(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
        assert_eq!(escaped("plain"), "plain");
        assert_eq!(escaped(""), "");
    }

    #[test]
    fn test_range_restores_binding_after_error() {
        let template = compile("{{ range x in items }}{{ $x | nope }}{{ end }}").unwrap();
        let data = Value::from(json!({"items": [1, 2]}));
        let mut ctx = Context::new(&template, data);
        let name: Arc<str> = Arc::from("x");
        ctx.bind(&name, Value::from("outer"));

        let mut out: Vec<u8> = Vec::new();
        let err = template.root().render(&mut ctx, &mut out).unwrap_err();
        assert!(matches!(err, RenderError::FilterNotFound { .. }));
        assert_eq!(ctx.bindings().get("x"), Some(&Value::from("outer")));
    }

    #[test]
    fn test_with_discards_lets_after_error() {
        let template = compile("{{ with u }}{{ let w = name }}{{ $w | nope }}{{ end }}").unwrap();
        let data = Value::from(json!({"u": {"name": "N"}}));
        let mut ctx = Context::new(&template, data.clone());

        let mut out: Vec<u8> = Vec::new();
        let err = template.root().render(&mut ctx, &mut out).unwrap_err();
        assert!(matches!(err, RenderError::FilterNotFound { .. }));
        assert!(ctx.bindings().get("w").is_none());
        assert_eq!(ctx.data(), &data);
    }

    #[test]
    fn test_range_removes_fresh_binding() {
        let template = compile("{{ range x in items }}{{ $x }}{{ end }}").unwrap();
        let mut ctx = Context::new(&template, Value::from(json!({"items": ["a", "b"]})));
        let mut out: Vec<u8> = Vec::new();
        template.root().render(&mut ctx, &mut out).unwrap();
        assert_eq!(out, b"ab");
        assert!(ctx.bindings().is_empty());
    }

    #[test]
    fn test_with_restores_scope_after_error() {
        let template = compile("{{ with inner }}{{ include \"ghost\" }}{{ end }}").unwrap();
        let data = Value::from(json!({"inner": {"a": 1}}));
        let mut ctx = Context::new(&template, data.clone());
        let mut out: Vec<u8> = Vec::new();
        let err = template.root().render(&mut ctx, &mut out).unwrap_err();
        assert!(matches!(err, RenderError::PartialNotFound { .. }));
        assert_eq!(ctx.data(), &data);
    }

    #[test]
    fn test_let_binds_absent_as_null() {
        let template = compile("{{ let v = missing }}").unwrap();
        let mut ctx = Context::new(&template, Value::from(json!({})));
        template.root().render(&mut ctx, &mut Vec::<u8>::new()).unwrap();
        assert_eq!(ctx.bindings().get("v"), Some(&Value::Null));
    }
}
