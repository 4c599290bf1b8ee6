//! # Introduction
//!
//! p8lua is an error-recovering front end for PICO-8 Lua. It turns cartridge
//! source into an AST and derives the information an editor needs: syntax
//! errors, a document outline, definitions and usages of every name, and
//! warnings for undefined globals and unused locals.
//!
//! ## Pipeline
//!
//! ```text
//! Source → Lexer → Parser → AST → {SymbolFinder, DefinitionsUsagesResolver} → Chunk
//! ```
//!
//! 1. [`parser`]: tokenises the source, follows `#include` directives and
//!    builds the tree, recovering from errors statement by statement.
//! 2. [`analysis`]: visitor-based passes over the tree producing
//!    [`analysis::symbols::Symbol`]s and the
//!    [`analysis::definitions::DefinitionsUsagesLookup`].
//!
//! ```
//! let chunk = p8lua::parse("function _update() x += 1 end\nx = 0");
//! assert!(chunk.errors.is_empty());
//! assert_eq!(chunk.symbols[0].name, "_update");
//! let x = chunk.definitions_usages.lookup(2, 1).unwrap();
//! assert_eq!(x.usages.len(), 2);
//! ```

pub mod analysis;
pub mod parser;

pub use analysis::definitions::{DefinitionsUsages, DefinitionsUsagesLookup};
pub use analysis::symbols::{Symbol, SymbolKind};
pub use parser::ast::{Bounds, Chunk, FileId, Position};
pub use parser::encoding::EncodingMode;
pub use parser::{parse, parse_with_options, ParseError, ParseOptions, Warning};
