//! Template parser
//!
//! Turns source text into a [`Node`] tree. The [`Scanner`] splits the source into text runs and
//! tag bodies; the parser dispatches each tag on its first word and recursively descends into
//! block tags until their matching `end`.
//!
//! ## Tags
//!
//! | tag                          | node                                      |
//! |------------------------------|-------------------------------------------|
//! | `path \| filter:arg`         | Print, HTML-escaped                       |
//! | `raw path \| filter`         | Print without escaping                    |
//! | `if path` ... `else` ... `end` | If, else branch optional                |
//! | `range name in path` ... `end` | Range, binds `$name` per element        |
//! | `let name = path`            | Let, visible until its block ends         |
//! | `with path` ... `end`        | With, rebinds the data scope              |
//! | `include "name"`             | Include of a registered partial           |
//!
//! Any other first word makes the whole tag an output expression. Errors are fatal: the parser
//! never returns a partial tree.

pub mod scanner;

pub use scanner::{Scanner, Segment};

use crate::stencil::accessor::tokens::{self, PathToken};
use crate::stencil::accessor::{compile_expression, Accessor, NAME_REGEX};
use crate::stencil::ast::{Node, Print};
use crate::stencil::error::{CompileError, CompileResult, Position};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// `range <name> in <path>`
static RANGE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\$?(?P<name>\S+)\s+in\s+(?P<path>.+)$").unwrap());

/// `let <name> = <path>`
static LET_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\$?(?P<name>[^\s=]+)\s*=\s*(?P<path>.*)$").unwrap());

/// Opening and closing tag delimiters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub left: String,
    pub right: String,
}

impl Delimiters {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn validate(&self) -> CompileResult<()> {
        if self.left.is_empty() || self.right.is_empty() {
            return Err(CompileError::InvalidDelimiters {
                left: self.left.clone(),
                right: self.right.clone(),
            });
        }
        Ok(())
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::new("{{", "}}")
    }
}

/// Parse a whole template into its root node
pub fn parse(source: &str, delimiters: &Delimiters) -> CompileResult<Node> {
    delimiters.validate()?;
    let mut parser = Parser {
        source,
        scanner: Scanner::new(source, &delimiters.left, &delimiters.right),
    };
    let (nodes, _) = parser.parse_sequence(None)?;
    Ok(Node::sequence(nodes))
}

/// The block a sequence is being parsed inside
#[derive(Debug, Clone, Copy)]
struct Block {
    keyword: &'static str,
    offset: usize,
    accepts_else: bool,
}

/// How a sequence ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closing {
    Eof,
    Else,
    End,
}

struct Parser<'s> {
    source: &'s str,
    scanner: Scanner<'s>,
}

impl<'s> Parser<'s> {
    fn position(&self, offset: usize) -> Position {
        Position::from_offset(self.source, offset)
    }

    fn parse_sequence(&mut self, block: Option<Block>) -> CompileResult<(Vec<Node>, Closing)> {
        let mut nodes = Vec::new();

        while let Some(segment) = self.scanner.next() {
            let (body, offset) = match segment? {
                Segment::Text(text) => {
                    nodes.push(Node::Text(text.into()));
                    continue;
                }
                Segment::Tag { body, offset } => (body, offset),
            };

            let (keyword, rest) = split_keyword(body);
            match keyword {
                "end" | "else" if !rest.is_empty() => {
                    return Err(CompileError::UnexpectedTag {
                        tag: body.to_string(),
                        position: self.position(offset),
                    });
                }
                "end" if block.is_some() => return Ok((nodes, Closing::End)),
                "else" if block.is_some_and(|b| b.accepts_else) => {
                    return Ok((nodes, Closing::Else))
                }
                "end" | "else" => {
                    return Err(CompileError::UnexpectedTag {
                        tag: keyword.to_string(),
                        position: self.position(offset),
                    });
                }
                _ => {}
            }

            if let Some(node) = self.parse_tag(keyword, rest, body, offset)? {
                nodes.push(node);
            }
        }

        match block {
            None => Ok((nodes, Closing::Eof)),
            Some(block) => Err(CompileError::UnterminatedBlock {
                keyword: block.keyword,
                position: self.position(block.offset),
            }),
        }
    }

    fn parse_body(&mut self, keyword: &'static str, offset: usize) -> CompileResult<Node> {
        let block = Block {
            keyword,
            offset,
            accepts_else: false,
        };
        let (nodes, _) = self.parse_sequence(Some(block))?;
        Ok(Node::sequence(nodes))
    }

    fn parse_tag(
        &mut self,
        keyword: &str,
        rest: &'s str,
        body: &'s str,
        offset: usize,
    ) -> CompileResult<Option<Node>> {
        let node = match keyword {
            "" => return Ok(None),
            "raw" => Node::Print(self.print(rest, true, offset)?),
            "if" => {
                let condition = self.condition(rest, offset)?;
                let block = Block {
                    keyword: "if",
                    offset,
                    accepts_else: true,
                };
                let (then, closing) = self.parse_sequence(Some(block))?;
                let otherwise = match closing {
                    Closing::Else => Some(Box::new(self.parse_body("if", offset)?)),
                    Closing::End | Closing::Eof => None,
                };
                Node::If {
                    condition,
                    then: Box::new(Node::sequence(then)),
                    otherwise,
                }
            }
            "range" => {
                let (binding, iterable) = self.range_header(rest, offset)?;
                let body = self.parse_body("range", offset)?;
                Node::Range {
                    binding,
                    iterable,
                    body: Box::new(body),
                }
            }
            "let" => {
                let (binding, accessor) = self.let_header(rest, offset)?;
                Node::Let { binding, accessor }
            }
            "with" => {
                let accessor = self.condition(rest, offset)?;
                let body = self.parse_body("with", offset)?;
                Node::With {
                    accessor,
                    body: Box::new(body),
                }
            }
            "include" => Node::Include {
                name: self.include_name(rest, offset)?,
            },
            _ => Node::Print(self.print(body, false, offset)?),
        };
        Ok(Some(node))
    }

    fn print(&self, expr: &str, raw: bool, offset: usize) -> CompileResult<Print> {
        let (accessor, pipes) = compile_expression(expr)
            .map_err(|reason| self.invalid_expression(expr, reason, offset))?;
        Ok(Print {
            accessor,
            pipes,
            raw,
        })
    }

    /// A path used by a control tag; filters are only allowed in output tags
    fn condition(&self, expr: &str, offset: usize) -> CompileResult<Accessor> {
        let (accessor, pipes) = compile_expression(expr)
            .map_err(|reason| self.invalid_expression(expr, reason, offset))?;
        if !pipes.is_empty() {
            return Err(self.invalid_expression(
                expr,
                "filters are only allowed in output tags".to_string(),
                offset,
            ));
        }
        Ok(accessor)
    }

    fn range_header(&self, rest: &str, offset: usize) -> CompileResult<(Arc<str>, Accessor)> {
        let malformed = |reason: &str| CompileError::MalformedRange {
            reason: reason.to_string(),
            position: self.position(offset),
        };
        let captures = RANGE_REGEX
            .captures(rest)
            .ok_or_else(|| malformed("missing `in`"))?;
        let name = &captures["name"];
        if !NAME_REGEX.is_match(name) {
            return Err(malformed(&format!("`{}` is not a valid binding name", name)));
        }
        let iterable = self.condition(&captures["path"], offset)?;
        Ok((Arc::from(name), iterable))
    }

    fn let_header(&self, rest: &str, offset: usize) -> CompileResult<(Arc<str>, Accessor)> {
        let malformed = |reason: &str| CompileError::MalformedLet {
            reason: reason.to_string(),
            position: self.position(offset),
        };
        let captures = LET_REGEX
            .captures(rest)
            .ok_or_else(|| malformed("missing `=`"))?;
        let name = &captures["name"];
        if !NAME_REGEX.is_match(name) {
            return Err(malformed(&format!("`{}` is not a valid binding name", name)));
        }
        let path = captures["path"].trim();
        if path.is_empty() {
            return Err(malformed("missing path after `=`"));
        }
        let accessor = self.condition(path, offset)?;
        Ok((Arc::from(name), accessor))
    }

    fn include_name(&self, rest: &str, offset: usize) -> CompileResult<Box<str>> {
        let malformed = |reason: &str| CompileError::MalformedInclude {
            reason: reason.to_string(),
            position: self.position(offset),
        };
        let literal = match tokens::tokenize(rest).as_deref() {
            Ok([(PathToken::Quoted, literal)]) => *literal,
            _ => return Err(malformed("the partial name must be a single quoted string")),
        };
        let name = tokens::unquote(literal);
        if name.is_empty() {
            return Err(malformed("the partial name is empty"));
        }
        Ok(name.into_boxed_str())
    }

    fn invalid_expression(&self, expr: &str, reason: String, offset: usize) -> CompileError {
        CompileError::InvalidExpression {
            expr: expr.to_string(),
            reason,
            position: self.position(offset),
        }
    }
}

/// Split a tag body into its first word and the trimmed remainder
fn split_keyword(body: &str) -> (&str, &str) {
    match body.find(char::is_whitespace) {
        Some(at) => (&body[..at], body[at..].trim()),
        None => (body, ""),
    }
}
