//! Syntax tree of a compiled template
//!
//! The node set is closed. A tree is built once by the parser and never changes afterwards:
//! nodes own their children outright and hold no references back to their parents, so a tree
//! can be shared between threads and rendered concurrently. Rendering lives in
//! [`rendering`](crate::stencil::rendering).

use crate::stencil::accessor::{Accessor, Pipe};
use std::fmt;
use std::sync::Arc;

/// An output tag: `{{ path | filters }}` or `{{ raw path | filters }}`
#[derive(Debug, Clone, PartialEq)]
pub struct Print {
    pub accessor: Accessor,
    pub pipes: Box<[Pipe]>,
    /// Skip HTML escaping
    pub raw: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(Box<str>),
    Print(Print),
    If {
        condition: Accessor,
        then: Box<Node>,
        otherwise: Option<Box<Node>>,
    },
    Range {
        binding: Arc<str>,
        iterable: Accessor,
        body: Box<Node>,
    },
    Let {
        binding: Arc<str>,
        accessor: Accessor,
    },
    With {
        accessor: Accessor,
        body: Box<Node>,
    },
    Include {
        name: Box<str>,
    },
    Sequence(Box<[Node]>),
}

impl Node {
    /// Wrap parsed nodes, collapsing a single node into itself
    pub fn sequence(mut nodes: Vec<Node>) -> Node {
        if nodes.len() == 1 {
            if let Some(node) = nodes.pop() {
                return node;
            }
        }
        Node::Sequence(nodes.into_boxed_slice())
    }

    /// Total number of nodes in this tree, including this one
    pub fn count(&self) -> usize {
        1 + self.children().map(Node::count).sum::<usize>()
    }

    /// Direct children, in render order
    pub fn children(&self) -> Box<dyn Iterator<Item = &Node> + '_> {
        match self {
            Node::If {
                then, otherwise, ..
            } => Box::new(std::iter::once(&**then).chain(otherwise.as_deref())),
            Node::Range { body, .. } | Node::With { body, .. } => Box::new(std::iter::once(&**body)),
            Node::Sequence(nodes) => Box::new(nodes.iter()),
            _ => Box::new(std::iter::empty()),
        }
    }

    /// Every accessor the tree evaluates, in render order
    pub fn accessors(&self) -> Vec<&Accessor> {
        let mut found = Vec::new();
        self.collect_accessors(&mut found);
        found
    }

    fn collect_accessors<'a>(&'a self, found: &mut Vec<&'a Accessor>) {
        match self {
            Node::Print(print) => found.push(&print.accessor),
            Node::If { condition, .. } => found.push(condition),
            Node::Range { iterable, .. } => found.push(iterable),
            Node::Let { accessor, .. } | Node::With { accessor, .. } => found.push(accessor),
            Node::Text(_) | Node::Include { .. } | Node::Sequence(_) => {}
        }
        for child in self.children() {
            child.collect_accessors(found);
        }
    }

    fn write_outline(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        match self {
            Node::Sequence(nodes) => {
                for node in nodes.iter() {
                    node.write_outline(f, depth)?;
                }
                Ok(())
            }
            Node::Text(text) => writeln!(f, "{}Text {:?}", indent, text),
            Node::Print(print) => {
                let label = if print.raw { "Raw" } else { "Print" };
                write!(f, "{}{} {}", indent, label, print.accessor)?;
                for pipe in print.pipes.iter() {
                    write!(f, " | {}", pipe)?;
                }
                writeln!(f)
            }
            Node::If {
                condition,
                then,
                otherwise,
            } => {
                writeln!(f, "{}If {}", indent, condition)?;
                then.write_outline(f, depth + 1)?;
                if let Some(otherwise) = otherwise {
                    writeln!(f, "{}Else", indent)?;
                    otherwise.write_outline(f, depth + 1)?;
                }
                Ok(())
            }
            Node::Range {
                binding,
                iterable,
                body,
            } => {
                writeln!(f, "{}Range {} in {}", indent, binding, iterable)?;
                body.write_outline(f, depth + 1)
            }
            Node::Let { binding, accessor } => {
                writeln!(f, "{}Let {} = {}", indent, binding, accessor)
            }
            Node::With { accessor, body } => {
                writeln!(f, "{}With {}", indent, accessor)?;
                body.write_outline(f, depth + 1)
            }
            Node::Include { name } => writeln!(f, "{}Include {:?}", indent, name),
        }
    }
}

/// Indented outline, one node per line; sequences are flattened into their parent.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_outline(f, 0)
    }
}
