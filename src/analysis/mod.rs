//! Analyses over a parsed chunk
//!
//! - [`visitor`]: traversal with scope and ancestor stacks
//! - [`symbols`]: hierarchical document outline
//! - [`definitions`]: definitions, usages and name-resolution warnings
//! - [`builtins`]: globals provided by the PICO-8 runtime

pub mod builtins;
pub mod definitions;
pub mod symbols;
pub mod visitor;
