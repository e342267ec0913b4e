//! Per-render execution state
//!
//! One [`Context`] exists per top-level render call. Partials and nested blocks rendered by that
//! call share it. The bindings map comes from the process-wide pool and goes back, cleared, when
//! the context drops, whether the render succeeded or not.

use crate::stencil::accessor::{Accessor, FieldCache};
use crate::stencil::error::{RenderError, RenderResult};
use crate::stencil::filters::Filters;
use crate::stencil::pool::{Bindings, Pooled, BINDINGS};
use crate::stencil::template::Template;
use crate::stencil::value::Value;
use std::sync::Arc;

pub struct Context<'t> {
    data: Value,
    locals: Pooled<'static, Bindings>,
    shadowed: Vec<(Arc<str>, Option<Value>)>,
    template: &'t Template,
    depth: usize,
}

impl<'t> Context<'t> {
    pub fn new(template: &'t Template, data: Value) -> Self {
        Self {
            data,
            locals: BINDINGS.acquire(),
            shadowed: Vec::new(),
            template,
            depth: 0,
        }
    }

    /// The template whose render created this context
    pub fn template(&self) -> &'t Template {
        self.template
    }

    pub fn filters(&self) -> &'t Filters {
        self.template.filters()
    }

    pub fn fields(&self) -> &'t FieldCache {
        self.template.fields()
    }

    /// Current data scope
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Swap in a new data scope, returning the previous one
    pub fn replace_data(&mut self, data: Value) -> Value {
        std::mem::replace(&mut self.data, data)
    }

    pub fn bindings(&self) -> &Bindings {
        &self.locals
    }

    /// Bind a local, returning whatever the name was bound to before
    pub fn bind(&mut self, name: &Arc<str>, value: Value) -> Option<Value> {
        self.locals.insert(Arc::clone(name), value)
    }

    /// Undo a [`Context::bind`]: restore the prior value or remove the name
    pub fn restore(&mut self, name: &Arc<str>, previous: Option<Value>) {
        match previous {
            Some(value) => {
                self.locals.insert(Arc::clone(name), value);
            }
            None => {
                self.locals.remove(name);
            }
        }
    }

    /// Bind a `let` local, remembering the prior value so the enclosing block can undo it
    pub fn bind_scoped(&mut self, name: &Arc<str>, value: Value) {
        let previous = self.bind(name, value);
        self.shadowed.push((Arc::clone(name), previous));
    }

    /// Marks the current block so [`Context::unwind`] can drop the lets made after it
    pub fn scope_mark(&self) -> usize {
        self.shadowed.len()
    }

    /// Undo every [`Context::bind_scoped`] made since `mark`, newest first
    pub fn unwind(&mut self, mark: usize) {
        while self.shadowed.len() > mark {
            if let Some((name, previous)) = self.shadowed.pop() {
                self.restore(&name, previous);
            }
        }
    }

    pub fn resolve(&self, accessor: &Accessor) -> Option<Value> {
        accessor.resolve(&self.data, &self.locals, self.fields())
    }

    /// Current include nesting depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Enter an include, failing when the chain is already as deep as allowed
    pub fn enter_include(&mut self, name: &str) -> RenderResult<()> {
        let limit = self.template.max_include_depth();
        if self.depth >= limit {
            return Err(RenderError::IncludeDepthExceeded {
                name: name.to_string(),
                limit,
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub fn leave_include(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}
