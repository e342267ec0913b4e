//! Main module for the stencil template engine

pub mod accessor;
pub mod ast;
pub mod config;
pub mod context;
pub mod error;
pub mod filters;
pub mod parsing;
pub mod pool;
pub mod rendering;
pub mod template;
pub mod value;
