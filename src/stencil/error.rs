//! Error types for compiling and rendering templates
//!
//! Compile errors are always fatal to the `compile` call and never come with a partial tree.
//! Render errors abort the render in progress; output already written to the sink stays written.
//! Failing to resolve a path is never an error: it yields an absent value instead.

use std::fmt;
use thiserror::Error;

/// A 1-based line:column position in template source
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Convert a byte offset into a line:column position.
    ///
    /// Columns count characters, not bytes, so multi-byte text before the offset
    /// does not skew the reported column.
    pub fn from_offset(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = before[line_start..].chars().count() + 1;
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// Errors raised while turning template source into a syntax tree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// An opening delimiter without a matching closing delimiter
    #[error("{position}: unterminated tag (missing closing delimiter)")]
    UnterminatedTag { position: Position },

    /// End of input reached inside an `if`, `range` or `with` block
    #[error("{position}: unterminated `{keyword}` block (missing `end`)")]
    UnterminatedBlock {
        keyword: &'static str,
        position: Position,
    },

    /// An `else` or `end` tag with no block to close
    #[error("{position}: unexpected `{tag}` outside of a block")]
    UnexpectedTag { tag: String, position: Position },

    #[error("{position}: malformed range, expected `range <name> in <path>`: {reason}")]
    MalformedRange { reason: String, position: Position },

    #[error("{position}: malformed let, expected `let <name> = <path>`: {reason}")]
    MalformedLet { reason: String, position: Position },

    #[error("{position}: malformed include, expected `include \"<name>\"`: {reason}")]
    MalformedInclude { reason: String, position: Position },

    /// A path or filter expression that does not follow the path grammar
    #[error("{position}: invalid expression `{expr}`: {reason}")]
    InvalidExpression {
        expr: String,
        reason: String,
        position: Position,
    },

    #[error("delimiters must be non-empty (got left {left:?}, right {right:?})")]
    InvalidDelimiters { left: String, right: String },
}

impl CompileError {
    /// Position of the offending tag, when the error is tied to one
    pub fn position(&self) -> Option<Position> {
        match self {
            CompileError::UnterminatedTag { position }
            | CompileError::UnterminatedBlock { position, .. }
            | CompileError::UnexpectedTag { position, .. }
            | CompileError::MalformedRange { position, .. }
            | CompileError::MalformedLet { position, .. }
            | CompileError::MalformedInclude { position, .. }
            | CompileError::InvalidExpression { position, .. } => Some(*position),
            CompileError::InvalidDelimiters { .. } => None,
        }
    }
}

/// Errors raised while rendering a compiled template
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("filter not found: {name:?}")]
    FilterNotFound { name: String },

    #[error("filter {name:?} expects {expected} argument(s), got {found}")]
    FilterArity {
        name: String,
        expected: String,
        found: usize,
    },

    /// A filter ran and reported a failure
    #[error("filter {name:?} failed: {message}")]
    Filter { name: String, message: String },

    #[error("partial not found: {name:?}")]
    PartialNotFound { name: String },

    #[error("include of {name:?} exceeds the maximum include depth of {limit}")]
    IncludeDepthExceeded { name: String, limit: usize },

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by a filter function
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct FilterError(pub String);

impl From<&str> for FilterError {
    fn from(message: &str) -> Self {
        FilterError(message.to_string())
    }
}

impl From<String> for FilterError {
    fn from(message: String) -> Self {
        FilterError(message)
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
pub type RenderResult<T> = Result<T, RenderError>;
