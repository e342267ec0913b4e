//! Filter registry and the default filters
//!
//! A filter is a pure text-to-text function with literal string arguments. Filters run after the
//! value has been turned into text and never see the value itself. Each registered filter
//! declares how many arguments it accepts; calls with the wrong count fail the render.
//!
//! A template uses exactly one registry. Passing a custom registry replaces the defaults rather
//! than extending them; start from [`Filters::standard`] to extend.
//!
//! Default filters:
//!
//! | name       | arguments    | effect                                               |
//! |------------|--------------|------------------------------------------------------|
//! | `upper`    | none         | uppercase                                            |
//! | `lower`    | none         | lowercase                                            |
//! | `trim`     | none         | strip leading and trailing whitespace                |
//! | `truncate` | `n`          | keep the first `n` characters; bad `n` is a no-op    |
//! | `replace`  | `from`, `to` | replace every occurrence of `from` with `to`         |

use crate::stencil::accessor::Pipe;
use crate::stencil::error::{FilterError, RenderError};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Signature shared by all filters
pub type FilterFn = dyn Fn(&str, &[Box<str>]) -> Result<String, FilterError> + Send + Sync;

/// Accepted argument count of a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    min: usize,
    max: usize,
}

impl Arity {
    pub const NONE: Arity = Arity::exactly(0);

    pub const fn exactly(count: usize) -> Self {
        Self {
            min: count,
            max: count,
        }
    }

    pub const fn between(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn accepts(&self, count: usize) -> bool {
        (self.min..=self.max).contains(&count)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{} to {}", self.min, self.max)
        }
    }
}

#[derive(Clone)]
struct Filter {
    arity: Arity,
    apply: Arc<FilterFn>,
}

/// Named filters available to a template
#[derive(Clone, Default)]
pub struct Filters {
    entries: HashMap<Box<str>, Filter>,
}

static DEFAULTS: Lazy<Arc<Filters>> = Lazy::new(|| Arc::new(Filters::standard()));

impl Filters {
    /// A registry with no filters at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// The shared default registry
    pub fn defaults() -> Arc<Filters> {
        Arc::clone(&DEFAULTS)
    }

    /// A fresh copy of the default filters, for extending
    pub fn standard() -> Self {
        let mut filters = Self::empty();
        filters
            .register("upper", Arity::NONE, |input, _| Ok(input.to_uppercase()))
            .register("lower", Arity::NONE, |input, _| Ok(input.to_lowercase()))
            .register("trim", Arity::NONE, |input, _| Ok(input.trim().to_string()))
            .register("truncate", Arity::exactly(1), truncate)
            .register("replace", Arity::exactly(2), replace);
        filters
    }

    /// Add or replace a filter
    pub fn register<F>(&mut self, name: impl Into<Box<str>>, arity: Arity, filter: F) -> &mut Self
    where
        F: Fn(&str, &[Box<str>]) -> Result<String, FilterError> + Send + Sync + 'static,
    {
        self.entries.insert(
            name.into(),
            Filter {
                arity,
                apply: Arc::new(filter),
            },
        );
        self
    }

    /// Builder form of [`Filters::register`]
    pub fn with<F>(mut self, name: impl Into<Box<str>>, arity: Arity, filter: F) -> Self
    where
        F: Fn(&str, &[Box<str>]) -> Result<String, FilterError> + Send + Sync + 'static,
    {
        self.register(name, arity, filter);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(|name| &**name).collect();
        names.sort_unstable();
        names
    }

    /// Run one pipe over `input`
    pub fn apply(&self, pipe: &Pipe, input: &str) -> Result<String, RenderError> {
        let filter = self
            .entries
            .get(&pipe.name)
            .ok_or_else(|| RenderError::FilterNotFound {
                name: pipe.name.to_string(),
            })?;

        if !filter.arity.accepts(pipe.args.len()) {
            return Err(RenderError::FilterArity {
                name: pipe.name.to_string(),
                expected: filter.arity.to_string(),
                found: pipe.args.len(),
            });
        }

        (filter.apply)(input, &pipe.args).map_err(|err| RenderError::Filter {
            name: pipe.name.to_string(),
            message: err.0,
        })
    }
}

impl fmt::Debug for Filters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filters")
            .field("names", &self.names())
            .finish()
    }
}

fn truncate(input: &str, args: &[Box<str>]) -> Result<String, FilterError> {
    let limit = match args.first().map(|arg| arg.trim().parse::<i64>()) {
        Some(Ok(limit)) if limit >= 0 => limit as usize,
        _ => return Ok(input.to_string()),
    };
    match input.char_indices().nth(limit) {
        Some((cut, _)) => Ok(input[..cut].to_string()),
        None => Ok(input.to_string()),
    }
}

fn replace(input: &str, args: &[Box<str>]) -> Result<String, FilterError> {
    match args {
        [from, to] if !from.is_empty() => Ok(input.replace(&**from, to)),
        _ => Ok(input.to_string()),
    }
}
