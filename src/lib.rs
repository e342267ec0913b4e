//! # stencil
//!
//! A compiled template language. Source text is parsed once into a syntax tree, which is then
//! rendered any number of times, from any number of threads, against dynamically typed data.
//!
//! ```text
//! Hello, {{ user.name | trim }}!
//! {{ if user.admin }}<b>admin</b>{{ else }}member{{ end }}
//! {{ range tag in user.tags }}#{{ $tag }} {{ end }}
//! ```
//!
//! Output tags are HTML-escaped unless written as `{{ raw path }}`. Paths that cannot be resolved
//! are not errors: they render as nothing and count as false.
//!
//! Start with [`compile`] and [`Template::render`]; data comes in as a [`Value`], built from
//! `serde_json`/`serde_yaml` data, any `Serialize` type, or types implementing [`Record`].

pub mod stencil;

pub use stencil::config::{load_defaults, Loader, StencilConfig};
pub use stencil::error::{
    CompileError, CompileResult, FilterError, Position, RenderError, RenderResult,
};
pub use stencil::filters::{Arity, FilterFn, Filters};
pub use stencil::parsing::Delimiters;
pub use stencil::template::{compile, compile_with, CompileOptions, Template};
pub use stencil::value::{Record, Shape, ShapeId, Value};
