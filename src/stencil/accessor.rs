//! Path/accessor compiler
//!
//! An expression such as `$item.tags[0] | trim | truncate:10` compiles into two parts:
//!
//! - an [`Accessor`]: an ordered list of [`Step`]s resolved one hop at a time at render time
//! - a list of [`Pipe`]s: filter names and their literal arguments
//!
//! ## Resolution
//!
//! Steps walk the value model left to right. The first step that cannot be satisfied (missing
//! field, index out of range, field access on a number, ...) ends the walk with `None`, the
//! "absent" value. Absent is not an error: it prints as nothing and is falsy.
//!
//! Field lookups try the exact name first, then an ASCII case-insensitive match. For records the
//! outcome is memoized per shape in the template's [`FieldCache`].

pub mod field_cache;
pub mod tokens;

pub use field_cache::FieldCache;

use crate::stencil::pool::{Bindings, ARGS, PIPES, STEPS};
use crate::stencil::value::Value;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use tokens::{tokenize, unquote, PathToken};

/// Names usable for filters and local bindings
pub(crate) static NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L}_][\p{L}\p{N}_]*$").unwrap());

/// One hop of path resolution
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Switch to the local bindings; only valid as the first step
    Local(Arc<str>),
    /// A constant; only valid as the only step
    Literal(Value),
    /// Attribute or map-key lookup
    Field(Box<str>),
    /// Position in a sequence
    Index(usize),
    /// Map lookup by literal key
    Key(Box<str>),
}

impl Step {
    fn apply(&self, current: &Value, fields: &FieldCache) -> Option<Value> {
        match self {
            Step::Field(name) => match current {
                Value::Map(_) => current.key_folded(name),
                Value::Record(record) => fields.get(&**record, name),
                _ => None,
            },
            Step::Index(index) => current.index(*index),
            Step::Key(key) => current.key(key),
            Step::Local(_) | Step::Literal(_) => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Local(name) => write!(f, "${}", name),
            Step::Literal(value) => write!(f, "{:?}", value.to_text()),
            Step::Field(name) => write!(f, ".{}", name),
            Step::Index(index) => write!(f, "[{}]", index),
            Step::Key(key) => write!(f, "[{:?}]", key),
        }
    }
}

/// A compiled path; zero steps means "the whole current data scope"
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Accessor {
    steps: Box<[Step]>,
}

impl Accessor {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_scope(&self) -> bool {
        self.steps.is_empty()
    }

    /// Resolve against the current data scope and local bindings
    pub fn resolve(&self, scope: &Value, bindings: &Bindings, fields: &FieldCache) -> Option<Value> {
        let (mut current, rest) = match self.steps.split_first() {
            None => return Some(scope.clone()),
            Some((Step::Local(name), rest)) => (bindings.get(name)?.clone(), rest),
            Some((Step::Literal(value), rest)) => (value.clone(), rest),
            Some(_) => (scope.clone(), &self.steps[..]),
        };
        for step in rest {
            current = step.apply(&current, fields)?;
        }
        Some(current)
    }
}

impl fmt::Display for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str(".");
        }
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                Step::Field(name) if i == 0 => f.write_str(name)?,
                other => write!(f, "{}", other)?,
            }
        }
        Ok(())
    }
}

/// A filter invocation with its literal arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipe {
    pub name: Box<str>,
    pub args: Box<[Box<str>]>,
}

impl fmt::Display for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for arg in self.args.iter() {
            write!(f, ":{}", arg)?;
        }
        Ok(())
    }
}

/// Compile `path | filter:arg | ...` into an accessor and its pipeline
pub fn compile_expression(expr: &str) -> Result<(Accessor, Box<[Pipe]>), String> {
    let expr = expr.trim();
    match find_unquoted(expr, '|') {
        None => Ok((compile_path(expr)?, Box::default())),
        Some(bar) => {
            let accessor = compile_path(&expr[..bar])?;
            let pipes = compile_pipes(&expr[bar + 1..])?;
            Ok((accessor, pipes))
        }
    }
}

/// Compile a path without a filter tail
pub fn compile_path(path: &str) -> Result<Accessor, String> {
    let path = path.trim();
    if path.is_empty() || path == "." {
        return Ok(Accessor::default());
    }

    let tokens = tokenize(path)?;
    let mut steps = STEPS.acquire();
    let mut cursor = tokens.iter().copied().peekable();

    match cursor.next() {
        Some((PathToken::Dollar, _)) => match cursor.next() {
            Some((PathToken::Ident, name)) => steps.push(Step::Local(Arc::from(name))),
            _ => return Err("`$` must be followed by a binding name".to_string()),
        },
        Some((PathToken::Ident, name)) => steps.push(Step::Field(name.into())),
        Some((PathToken::Quoted, literal)) => {
            if cursor.peek().is_some() {
                return Err("a string literal cannot be followed by accessors".to_string());
            }
            steps.push(Step::Literal(Value::from(unquote(literal))));
        }
        Some((PathToken::Integer, digits)) => {
            if cursor.peek().is_some() {
                return Err("a number literal cannot be followed by accessors".to_string());
            }
            let number = digits
                .parse::<i64>()
                .map_err(|_| format!("number `{}` is out of range", digits))?;
            steps.push(Step::Literal(Value::Int(number)));
        }
        // `.name` and `["key"]` start from the current scope
        Some((PathToken::Dot, _)) => steps.push(after_dot(cursor.next())?),
        Some((PathToken::OpenBracket, _)) => steps.push(bracket(&mut cursor)?),
        Some((token, text)) => {
            return Err(format!("unexpected {} `{}`", token.describe(), text));
        }
        None => {}
    }

    while let Some((token, text)) = cursor.next() {
        let step = match token {
            PathToken::Dot => after_dot(cursor.next())?,
            PathToken::OpenBracket => bracket(&mut cursor)?,
            _ => return Err(format!("unexpected {} `{}`", token.describe(), text)),
        };
        steps.push(step);
    }

    Ok(Accessor {
        steps: steps.drain(..).collect(),
    })
}

fn after_dot(next: Option<(PathToken, &str)>) -> Result<Step, String> {
    match next {
        Some((PathToken::Ident, name)) => Ok(Step::Field(name.into())),
        Some((PathToken::Integer, digits)) => parse_index(digits),
        Some((token, text)) => Err(format!(
            "expected a field name after `.`, found {} `{}`",
            token.describe(),
            text
        )),
        None => Err("expected a field name after `.`".to_string()),
    }
}

fn bracket<'a, I>(cursor: &mut I) -> Result<Step, String>
where
    I: Iterator<Item = (PathToken, &'a str)>,
{
    let step = match cursor.next() {
        Some((PathToken::Integer, digits)) => parse_index(digits)?,
        Some((PathToken::Quoted, literal)) => Step::Key(unquote(literal).into()),
        _ => return Err("expected an integer or a quoted key inside `[...]`".to_string()),
    };
    match cursor.next() {
        Some((PathToken::CloseBracket, _)) => Ok(step),
        _ => Err("missing `]`".to_string()),
    }
}

fn parse_index(digits: &str) -> Result<Step, String> {
    digits
        .parse::<usize>()
        .map(Step::Index)
        .map_err(|_| format!("index `{}` is out of range", digits))
}

/// Parse `name:arg:arg | name | ...`; empty segments are skipped
fn compile_pipes(tail: &str) -> Result<Box<[Pipe]>, String> {
    let mut pipes = PIPES.acquire();

    for segment in split_unquoted(tail, '|') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        let mut parts = split_unquoted(segment, ':');
        let name = parts.next().unwrap_or_default().trim();
        if !NAME_REGEX.is_match(name) {
            return Err(format!("invalid filter name `{}`", name));
        }

        let mut args = ARGS.acquire();
        args.extend(parts.map(|arg| unquote(arg.trim()).into_boxed_str()));
        pipes.push(Pipe {
            name: name.into(),
            args: args.drain(..).collect(),
        });
    }

    Ok(pipes.drain(..).collect())
}

/// Byte position of the first `needle` outside single or double quotes.
///
/// A quote only opens a quoted run at the start of the text or right after `|`, `:` or `[`
/// (whitespace aside), so apostrophes inside bare words such as `it's` are plain characters.
fn find_unquoted(text: &str, needle: char) -> Option<usize> {
    let mut quote = None;
    let mut escaped = false;
    let mut at_boundary = true;
    for (i, c) in text.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => continue,
            None if c == needle => return Some(i),
            None if at_boundary && (c == '"' || c == '\'') => {
                quote = Some(c);
                continue;
            }
            None => {}
        }
        if quote.is_none() && !c.is_whitespace() {
            at_boundary = matches!(c, '|' | ':' | '[');
        }
    }
    None
}

/// Split on every `separator` outside quotes
fn split_unquoted(text: &str, separator: char) -> impl Iterator<Item = &str> {
    let mut rest = Some(text);
    std::iter::from_fn(move || {
        let current = rest?;
        match find_unquoted(current, separator) {
            Some(at) => {
                rest = Some(&current[at + separator.len_utf8()..]);
                Some(&current[..at])
            }
            None => {
                rest = None;
                Some(current)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn steps(path: &str) -> Vec<Step> {
        compile_path(path).unwrap().steps().to_vec()
    }

    fn args(pipe: &Pipe) -> Vec<&str> {
        pipe.args.iter().map(|arg| &**arg).collect()
    }

    fn resolve(path: &str, data: &Value) -> Option<Value> {
        let accessor = compile_path(path).unwrap();
        accessor.resolve(data, &Bindings::new(), &FieldCache::new())
    }

    #[test]
    fn test_empty_path_is_scope() {
        assert!(compile_path("").unwrap().is_scope());
        assert!(compile_path(" . ").unwrap().is_scope());
    }

    #[test]
    fn test_dotted_and_bracketed_steps() {
        assert_eq!(
            steps(r#"user.tags[2]["x y"].name"#),
            vec![
                Step::Field("user".into()),
                Step::Field("tags".into()),
                Step::Index(2),
                Step::Key("x y".into()),
                Step::Field("name".into()),
            ]
        );
    }

    #[test]
    fn test_local_root() {
        assert_eq!(
            steps("$item.name"),
            vec![Step::Local(Arc::from("item")), Step::Field("name".into())]
        );
    }

    #[test]
    fn test_dotted_integer_is_index() {
        assert_eq!(
            steps("items.0"),
            vec![Step::Field("items".into()), Step::Index(0)]
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(steps(r#""x""#), vec![Step::Literal(Value::from("x"))]);
        assert_eq!(steps("42"), vec![Step::Literal(Value::Int(42))]);
    }

    #[test]
    fn test_path_errors() {
        assert!(compile_path("$").is_err());
        assert!(compile_path("a.").is_err());
        assert!(compile_path("a[0").is_err());
        assert!(compile_path("a[b]").is_err());
        assert!(compile_path("a b").is_err());
        assert!(compile_path(r#""x".y"#).is_err());
    }

    #[test]
    fn test_pipes() {
        let (accessor, pipes) = compile_expression("title | trim | truncate: 10 |").unwrap();
        assert_eq!(accessor.to_string(), "title");
        assert_eq!(pipes.len(), 2);
        assert_eq!(pipes[0].to_string(), "trim");
        assert_eq!(&*pipes[1].name, "truncate");
        assert_eq!(args(&pipes[1]), vec!["10"]);
    }

    #[test]
    fn test_pipe_arguments_may_be_quoted() {
        let (_, pipes) = compile_expression(r#"x | replace:"a|b":'c:d'"#).unwrap();
        assert_eq!(pipes.len(), 1);
        assert_eq!(args(&pipes[0]), vec!["a|b", "c:d"]);
    }

    #[test]
    fn test_apostrophe_inside_bare_argument() {
        let (_, pipes) = compile_expression("s | replace:it's:it is").unwrap();
        assert_eq!(pipes.len(), 1);
        assert_eq!(args(&pipes[0]), vec!["it's", "it is"]);

        let (_, pipes) = compile_expression("s | replace:don't:do not | upper").unwrap();
        assert_eq!(pipes.len(), 2);
        assert_eq!(args(&pipes[0]), vec!["don't", "do not"]);
        assert_eq!(&*pipes[1].name, "upper");
    }

    #[test]
    fn test_bar_inside_key_is_not_a_pipe() {
        let (accessor, pipes) = compile_expression(r#"m["a|b"]"#).unwrap();
        assert!(pipes.is_empty());
        assert_eq!(accessor.steps()[1], Step::Key("a|b".into()));
    }

    #[test]
    fn test_invalid_filter_name() {
        assert!(compile_expression("x | :10").is_err());
        assert!(compile_expression("x | two words").is_err());
    }

    #[test]
    fn test_resolution_walks_values() {
        let data = Value::from(json!({
            "user": {"Name": "Ada", "tags": ["a", "b"]},
            "m": {"k": 1}
        }));
        assert_eq!(resolve("user.name", &data), Some(Value::from("Ada")));
        assert_eq!(resolve("user.tags[1]", &data), Some(Value::from("b")));
        assert_eq!(resolve(r#"m["k"]"#, &data), Some(Value::Int(1)));
        assert_eq!(resolve("", &data), Some(data.clone()));
    }

    #[test]
    fn test_unsatisfied_steps_are_absent() {
        let data = Value::from(json!({"user": {"tags": ["a"]}, "n": 3}));
        assert_eq!(resolve("missing", &data), None);
        assert_eq!(resolve("user.tags[5]", &data), None);
        assert_eq!(resolve("n.field", &data), None);
        assert_eq!(resolve("user[0]", &data), None);
        assert_eq!(resolve(r#"user.tags["x"]"#, &data), None);
    }

    #[test]
    fn test_local_resolution() {
        let accessor = compile_path("$row.id").unwrap();
        let mut bindings = Bindings::new();
        assert_eq!(
            accessor.resolve(&Value::Null, &bindings, &FieldCache::new()),
            None
        );

        bindings.insert(Arc::from("row"), Value::from(json!({"id": 9})));
        assert_eq!(
            accessor.resolve(&Value::Null, &bindings, &FieldCache::new()),
            Some(Value::Int(9))
        );
    }

    #[test]
    fn test_display_round_trips_shape() {
        let accessor = compile_path(r#"$a.b[0]["c"]"#).unwrap();
        assert_eq!(accessor.to_string(), r#"$a.b[0]["c"]"#);
    }
}
