//! PICO-8 Lua parser
//!
//! This module transforms cartridge source text into an Abstract Syntax Tree (AST):
//! - [`lexer`]: Tokenization (source text → tokens), with [`encoding`] modes
//! - [`parse`]: The parse session, error recovery and `#include` handling
//! - [`ast`]: AST node definitions
//! - [`readable`]: JSON projection of a parsed chunk
//!
//! # Supported dialect
//!
//! Lua 5.2 syntax plus the PICO-8 extensions:
//! - compound assignment (`+=`, `..=`, `>>>=`, ...) and `!=`
//! - `\` integer division, `^^` xor, `<<>`/`>><` rotates, `@`/`%`/`$` peeks
//! - the one-line `if (cond) stmt` form and the `?` print shorthand
//! - `//` comments, binary literals and `#include` directives
//!
//! # Parser Implementation
//!
//! Hand-written recursive descent parser with precedence climbing for binary operators.
//! Statement and expression parsing live in `statements` and `expressions` as
//! `impl Parser` blocks.

pub mod ast;
pub mod encoding;
mod expressions;
pub mod flow;
pub mod include;
pub mod lexer;
pub mod marker;
pub mod messages;
pub mod parse;
pub mod readable;
mod statements;

pub use parse::{parse, parse_with_options, ParseError, ParseOptions, Parser, Warning};
