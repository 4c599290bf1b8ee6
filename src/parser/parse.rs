//! Main parser coordinator
//!
//! This module provides the [`Parser`] session and core parsing infrastructure,
//! including error types, options, token helpers, error recovery and the
//! `#include` lexer stack.
//!
//! # Parser Architecture
//!
//! The Parser uses a recursive descent approach with the following organization:
//! - This module: Parser struct, helper methods, recovery and coordination
//! - `statements`: Parsing statements (if, while, for, function, ...)
//! - `expressions`: Parsing expressions with precedence climbing
//!
//! # Implementation
//!
//! Parser methods are split across multiple files using `impl Parser` blocks,
//! allowing each module to extend the Parser with related functionality while
//! maintaining access to the shared session state. A `Parser` lives for one
//! parse; nothing is shared between parses.
//!
//! Errors inside a statement propagate with `?` up to the enclosing block,
//! which records them, rewinds the session stacks to where the statement
//! began and skips ahead to the next line (panic-mode recovery).

use crate::analysis::definitions::DefinitionsUsagesResolver;
use crate::analysis::symbols::SymbolFinder;
use crate::parser::ast::*;
use crate::parser::encoding::EncodingMode;
use crate::parser::flow::FlowContext;
use crate::parser::include::{
    load_include, normalize, resolve_path, FileResolver, FsResolver, IncludeError,
};
use crate::parser::lexer::{LexError, Lexer, Token};
use crate::parser::marker::MarkerStack;
use crate::parser::messages::{self, format_message};
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Default ceiling for nested statements and expressions
pub const DEFAULT_MAX_DEPTH: usize = 200;

/// File name used when the caller does not supply one
pub const DEFAULT_FILE_NAME: &str = "main.lua";

/// Parser error type
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub bounds: Bounds,
    /// Including files, outermost first, for failures inside nested includes
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include_chain: Vec<String>,
}

impl ParseError {
    pub fn new(message: String, bounds: Bounds) -> Self {
        ParseError {
            message,
            bounds,
            include_chain: Vec::new(),
        }
    }
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError::new(err.message, err.bounds)
    }
}

/// Semantic observation that does not affect the tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    pub message: String,
    pub bounds: Bounds,
}

impl Warning {
    pub fn new(message: String, bounds: Bounds) -> Self {
        Warning { message, bounds }
    }
}

/// Per-parse configuration
#[derive(Clone)]
pub struct ParseOptions {
    pub encoding: EncodingMode,
    pub max_depth: usize,
    pub resolver: Arc<dyn FileResolver>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            encoding: EncodingMode::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            resolver: Arc::new(FsResolver),
        }
    }
}

impl fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseOptions")
            .field("encoding", &self.encoding)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

/// Parse `source` with default options.
pub fn parse(source: &str) -> Chunk {
    Parser::new(source, DEFAULT_FILE_NAME, ParseOptions::default()).parse_chunk()
}

/// Parse `source` as the file `file_name`.
pub fn parse_with_options(source: &str, file_name: &str, options: ParseOptions) -> Chunk {
    Parser::new(source, file_name, options).parse_chunk()
}

/// Lexer of a file that is waiting for an `#include` inside it to finish
struct IncludeFrame {
    lexer: Lexer,
    /// The `#include` statement in the suspended file
    include_loc: Bounds,
}

/// Session stack depths captured at the start of a statement
#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
    /// First token of the statement
    start: Position,
    markers: usize,
    scopes: usize,
    outer_flows: usize,
    flow_depth: usize,
    depth: usize,
    newline_mode: bool,
}

/// Recursive descent parser for PICO-8 Lua
pub struct Parser {
    pub(crate) lexer: Lexer,
    suspended: Vec<IncludeFrame>,
    files: Vec<String>,
    options: ParseOptions,
    pub(crate) markers: MarkerStack,
    /// Control flow of the function being parsed
    pub(crate) flow: FlowContext,
    outer_flows: Vec<FlowContext>,
    /// Parse-time scopes; each starts as a copy of its parent
    scopes: Vec<Vec<String>>,
    globals: Vec<String>,
    global_names: FxHashSet<String>,
    pub(crate) errors: Vec<ParseError>,
    depth: usize,
}

impl Parser {
    pub fn new(source: &str, file_name: &str, options: ParseOptions) -> Self {
        let mut lexer = Lexer::new(source, FileId::ROOT, options.encoding);
        let started = lexer.start();
        let mut parser = Self {
            lexer,
            suspended: Vec::new(),
            files: vec![normalize(Path::new(file_name))],
            options,
            markers: MarkerStack::new(),
            flow: FlowContext::new(true),
            outer_flows: Vec::new(),
            scopes: Vec::new(),
            globals: Vec::new(),
            global_names: FxHashSet::default(),
            errors: Vec::new(),
            depth: 0,
        };
        if let Err(err) = started {
            parser.errors.push(err.into());
        }
        parser
    }

    /// Parse the whole document. Never fails: problems end up in
    /// [`Chunk::errors`] and [`Chunk::warnings`].
    pub fn parse_chunk(mut self) -> Chunk {
        tracing::debug!(file = %self.files[0], "parsing chunk");
        let start = self.token().bounds.start;

        self.flow.push_scope(false);
        self.create_scope();

        let mut body = Vec::new();
        loop {
            body.extend(self.parse_block());
            if self.token().is_eof() {
                break;
            }
            // stray `end`/`else`/`until` at top level
            let err = self.unexpected(self.token());
            self.errors.push(err);
            self.skip_token();
        }

        self.destroy_scope();
        let flow_errors = self.flow.pop_scope();
        self.errors.extend(flow_errors);

        let loc = Bounds::new(start, self.token().bounds.end);
        let symbols = SymbolFinder::find(&body);
        let (definitions_usages, warnings) = DefinitionsUsagesResolver::resolve(&body);
        tracing::debug!(
            statements = body.len(),
            errors = self.errors.len(),
            warnings = warnings.len(),
            "chunk parsed"
        );

        Chunk {
            body,
            errors: self.errors,
            warnings,
            symbols,
            definitions_usages,
            globals: self.globals,
            files: self.files,
            loc,
        }
    }

    /// Parse statements until a block terminator, recovering from errors
    /// statement by statement.
    pub(crate) fn parse_block(&mut self) -> Block {
        let mut block = Vec::new();

        loop {
            let token = self.token();
            if token.is_block_follow() || token.is_newline() {
                break;
            }

            let checkpoint = self.checkpoint();
            match self.parse_statement() {
                Ok(Some(statement)) => {
                    // `return` must be the last statement of a block
                    let is_return = matches!(statement, Statement::Return { .. });
                    block.push(statement);
                    if is_return {
                        break;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(error = %err, "recovering from syntax error");
                    self.errors.push(err);
                    self.restore(checkpoint);
                    if !self.recover(checkpoint) {
                        break;
                    }
                }
            }
        }

        block
    }

    // ===== Recovery =====

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            start: self.token().bounds.start,
            markers: self.markers.depth(),
            scopes: self.scopes.len(),
            outer_flows: self.outer_flows.len(),
            flow_depth: self.flow.depth(),
            depth: self.depth,
            newline_mode: self.lexer.newline_mode(),
        }
    }

    /// Rewind every session stack to `checkpoint`.
    pub(crate) fn restore(&mut self, checkpoint: Checkpoint) {
        self.markers.truncate(checkpoint.markers);
        self.scopes.truncate(checkpoint.scopes);
        while self.outer_flows.len() > checkpoint.outer_flows {
            if let Some(outer) = self.outer_flows.pop() {
                self.flow = outer;
            }
        }
        self.flow.truncate(checkpoint.flow_depth);
        self.depth = checkpoint.depth;
        self.set_newline_mode(checkpoint.newline_mode);
    }

    /// Skip the rest of a broken statement, up to the next line break.
    /// Returns `false` when the enclosing block should stop.
    fn recover(&mut self, checkpoint: Checkpoint) -> bool {
        let token = self.token();
        if token.is_block_follow() {
            return false;
        }
        // the statement already ran up to a line break
        let previous = self.previous().bounds.end;
        if token.bounds.start != checkpoint.start
            && (previous.line < token.bounds.start.line || previous.file != token.bounds.file())
        {
            return true;
        }

        let file = self.lexer.file();
        let was_newline_mode = self.lexer.newline_mode();
        self.set_newline_mode(true);

        let mut consumed = false;
        let resume = loop {
            let token = self.token();
            if token.is_newline() || token.bounds.file() != file {
                break true;
            }
            if token.is_eof() || (consumed && token.is_block_follow()) {
                break false;
            }
            self.skip_token();
            consumed = true;
        };

        if self.lexer.file() == file {
            self.set_newline_mode(was_newline_mode);
        }
        resume
    }

    /// Advance, recording rather than propagating lexical errors.
    pub(crate) fn skip_token(&mut self) {
        if let Err(err) = self.next() {
            self.errors.push(err);
        }
    }

    pub(crate) fn set_newline_mode(&mut self, enabled: bool) {
        if let Err(err) = self.lexer.set_newline_mode(enabled) {
            self.errors.push(err.into());
        }
        self.pop_finished_includes();
    }

    // ===== Depth guard =====

    pub(crate) fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.options.max_depth {
            return Err(ParseError::new(
                messages::TOO_MANY_SYNTAX_LEVELS.to_string(),
                self.token().bounds,
            ));
        }
        Ok(())
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    /// Leave every level entered since `depth` was read.
    pub(crate) fn leave_to(&mut self, depth: usize) {
        self.depth = depth;
    }

    // ===== Token helpers =====

    pub(crate) fn token(&self) -> &Token {
        &self.lexer.token
    }

    pub(crate) fn lookahead(&self) -> &Token {
        &self.lexer.lookahead
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.lexer.previous
    }

    /// Advance one token, leaving finished include files.
    pub(crate) fn next(&mut self) -> Result<(), ParseError> {
        let advanced = self.lexer.next();
        self.pop_finished_includes();
        advanced.map_err(ParseError::from)
    }

    /// Consume the current token if it is the keyword or punctuator `value`.
    pub(crate) fn consume(&mut self, value: &str) -> Result<bool, ParseError> {
        let token = self.token();
        if token.is_punctuator(value) || token.is_keyword(value) {
            self.next()?;
            return Ok(true);
        }
        Ok(false)
    }

    pub(crate) fn expect(&mut self, value: &str) -> Result<(), ParseError> {
        if self.consume(value)? {
            return Ok(());
        }
        Err(self.raise_at(
            self.token().bounds,
            messages::EXPECTED,
            &[value, &self.token().value],
        ))
    }

    /// Consume `open` and stop treating line breaks as significant until
    /// the matching [`Parser::close_bracket`]. Returns the outer mode.
    pub(crate) fn open_bracket(&mut self, open: &str) -> Result<bool, ParseError> {
        let outer = self.lexer.newline_mode();
        self.set_newline_mode(false);
        self.expect(open)?;
        Ok(outer)
    }

    /// Consume `close` with the outer newline mode back in force, so a line
    /// break right after it is seen.
    pub(crate) fn close_bracket(&mut self, close: &str, outer: bool) -> Result<(), ParseError> {
        self.set_newline_mode(outer);
        self.expect(close)
    }

    pub(crate) fn raise_at(&self, bounds: Bounds, template: &str, args: &[&str]) -> ParseError {
        ParseError::new(format_message(template, args), bounds)
    }

    /// `unexpected <kind> '<value>' near '<lookahead>'`
    pub(crate) fn unexpected(&self, token: &Token) -> ParseError {
        if token.is_eof() {
            return ParseError::new(messages::UNEXPECTED_EOF.to_string(), token.bounds);
        }
        self.raise_at(
            token.bounds,
            messages::UNEXPECTED,
            &[token.kind.describe(), &token.value, &self.lookahead().value],
        )
    }

    /// `<what> expected near '<token>'`
    pub(crate) fn expected_token(&self, what: &str) -> ParseError {
        let token = self.token();
        self.raise_at(token.bounds, messages::EXPECTED_TOKEN, &[what, &token.value])
    }

    // ===== Markers =====

    /// Open a marker at the current token.
    pub(crate) fn mark_location(&mut self) {
        let start = self.token().bounds.start;
        self.markers.mark(start);
    }

    /// Close the innermost marker at the end of the previous token.
    pub(crate) fn finish_node(&mut self) -> Bounds {
        let end = self.previous().bounds.end;
        self.markers.finish(end)
    }

    // ===== Control flow =====

    /// Start the flow context of a nested function.
    pub(crate) fn push_flow(&mut self, allow_vararg: bool) {
        let outer = std::mem::replace(&mut self.flow, FlowContext::new(allow_vararg));
        self.outer_flows.push(outer);
    }

    pub(crate) fn pop_flow(&mut self) {
        if let Some(outer) = self.outer_flows.pop() {
            self.flow = outer;
        }
    }

    pub(crate) fn pop_flow_scope(&mut self) {
        let errors = self.flow.pop_scope();
        self.errors.extend(errors);
    }

    // ===== Parse-time scopes =====

    pub(crate) fn create_scope(&mut self) {
        let inherited = self.scopes.last().cloned().unwrap_or_default();
        self.scopes.push(inherited);
    }

    pub(crate) fn destroy_scope(&mut self) {
        self.scopes.pop();
    }

    pub(crate) fn scope_has_name(&self, name: &str) -> bool {
        self.scopes
            .last()
            .is_some_and(|scope| scope.iter().any(|n| n == name))
    }

    pub(crate) fn scope_identifier_name(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            if !scope.iter().any(|n| n == name) {
                scope.push(name.to_string());
            }
        }
    }

    /// Declare `ident` in the current scope.
    pub(crate) fn declare(&mut self, ident: Identifier) -> Identifier {
        self.scope_identifier_name(&ident.name);
        ident.local(true)
    }

    /// Annotate a reference as local or global, registering globals.
    pub(crate) fn reference(&mut self, ident: Identifier) -> Identifier {
        let is_local = self.scope_has_name(&ident.name);
        if !is_local && self.global_names.insert(ident.name.clone()) {
            self.globals.push(ident.name.clone());
        }
        ident.local(is_local)
    }

    // ===== Includes =====

    fn current_file_name(&self) -> &str {
        self.files
            .get(self.lexer.file().0 as usize)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Start lexing the `#include` target `target` in place of the current
    /// file. Failures are recoverable and attach to the root file's
    /// `#include` statement.
    pub(crate) fn open_include(&mut self, target: &str, loc: Bounds) -> Result<(), ParseError> {
        let path = resolve_path(self.current_file_name(), target);
        let resolver = Arc::clone(&self.options.resolver);

        let loaded = if self.is_open(&path) {
            Err(IncludeError::Circular)
        } else {
            load_include(resolver.as_ref(), &path, target)
        };
        let contents = match loaded {
            Ok(contents) => contents,
            Err(err) => return Err(self.include_error(err.to_string(), loc)),
        };

        let file = FileId(self.files.len() as u32);
        self.files.push(path);
        let mut lexer = Lexer::new(&contents, file, self.options.encoding);
        if let Err(err) = lexer.start() {
            self.errors.push(err.into());
        }
        if lexer.token.is_eof() {
            return Ok(());
        }

        tracing::debug!(
            file = %self.files[file.0 as usize],
            depth = self.suspended.len() + 1,
            "entering include"
        );
        let outer = std::mem::replace(&mut self.lexer, lexer);
        self.suspended.push(IncludeFrame {
            lexer: outer,
            include_loc: loc,
        });
        Ok(())
    }

    /// Whether `path` is the file being lexed or one suspended below it.
    fn is_open(&self, path: &str) -> bool {
        let open_files = std::iter::once(self.lexer.file())
            .chain(self.suspended.iter().map(|frame| frame.lexer.file()));
        open_files
            .filter_map(|file| self.files.get(file.0 as usize))
            .any(|name| name == path)
    }

    fn include_error(&self, message: String, loc: Bounds) -> ParseError {
        let Some(root) = self.suspended.first() else {
            return ParseError::new(message, loc);
        };
        let include_chain = self
            .suspended
            .iter()
            .skip(1)
            .map(|frame| frame.lexer.file())
            .chain(std::iter::once(self.lexer.file()))
            .filter_map(|file| self.files.get(file.0 as usize).cloned());
        ParseError {
            message,
            bounds: root.include_loc,
            include_chain: std::iter::once(self.files[0].clone())
                .chain(include_chain)
                .collect(),
        }
    }

    /// Resume the including file once an included one is exhausted. The
    /// last token consumed in the included file stays the previous token.
    pub(crate) fn pop_finished_includes(&mut self) {
        while self.lexer.token.is_eof() {
            let Some(frame) = self.suspended.pop() else {
                break;
            };
            tracing::debug!(file = %self.current_file_name(), "leaving include");
            let finished = std::mem::replace(&mut self.lexer, frame.lexer);
            self.lexer.previous = finished.previous;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::include::MemoryResolver;

    fn parse_memory(source: &str, resolver: MemoryResolver) -> Chunk {
        let options = ParseOptions {
            resolver: Arc::new(resolver),
            ..ParseOptions::default()
        };
        parse_with_options(source, "main.lua", options)
    }

    #[test]
    fn test_parse_simple_program() {
        let chunk = parse("local x = 1\nprint(x)");
        assert!(chunk.errors.is_empty(), "{:?}", chunk.errors);
        assert_eq!(chunk.body.len(), 2);
        assert!(matches!(chunk.body[0], Statement::Local { .. }));
        assert!(matches!(chunk.body[1], Statement::Call { .. }));
        assert_eq!(chunk.globals, vec!["print".to_string()]);
    }

    #[test]
    fn test_recovery_resumes_on_next_line() {
        let chunk = parse("x = = 1\ny = 2\nz = 3");
        assert_eq!(chunk.errors.len(), 1);
        assert_eq!(chunk.errors[0].message, "<expression> expected near '='");
        assert_eq!(chunk.body.len(), 2);
    }

    #[test]
    fn test_recovery_keeps_statement_on_next_line() {
        let chunk = parse("x\ny = 2");
        assert_eq!(chunk.errors.len(), 1);
        assert_eq!(chunk.body.len(), 1);
        assert!(matches!(chunk.body[0], Statement::Assignment { .. }));
    }

    #[test]
    fn test_recovery_inside_function() {
        let chunk = parse("function f()\n  x = )\n  y = 1\nend\nz = 2");
        assert_eq!(chunk.errors.len(), 1);
        assert_eq!(chunk.body.len(), 2);
        match &chunk.body[0] {
            Statement::Function(func) => assert_eq!(func.body.len(), 1),
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_stray_end_at_top_level() {
        let chunk = parse("x = 1\nend\ny = 2");
        assert_eq!(chunk.errors.len(), 1);
        assert_eq!(chunk.errors[0].message, "unexpected keyword 'end' near 'y'");
        assert_eq!(chunk.body.len(), 2);
    }

    #[test]
    fn test_missing_end() {
        let chunk = parse("while true do\n  x = 1\n");
        assert_eq!(chunk.errors.len(), 1);
        assert_eq!(chunk.errors[0].message, "'end' expected near '<eof>'");
    }

    #[test]
    fn test_depth_guard() {
        let source = format!("x = {}1{}", "(".repeat(300), ")".repeat(300));
        let chunk = parse(&source);
        assert!(chunk
            .errors
            .iter()
            .any(|e| e.message == "chunk has too many syntax levels"));
    }

    #[test]
    fn test_depth_guard_on_long_chains() {
        let sources = [
            format!("x = {}1\ny = 2", "1+".repeat(200_000)),
            format!("a{} = 1\ny = 2", ".b".repeat(100_000)),
            format!("f{}\ny = 2", "()".repeat(100_000)),
            format!("x = t{}\ny = 2", "[1]".repeat(100_000)),
        ];
        for source in &sources {
            let chunk = parse(source);
            let messages: Vec<&str> = chunk.errors.iter().map(|e| e.message.as_str()).collect();
            assert_eq!(messages, vec!["chunk has too many syntax levels"]);
            assert_eq!(chunk.body.len(), 1);
            assert_eq!(chunk.body[0].loc().start.line, 2);
        }
    }

    #[test]
    fn test_custom_depth() {
        let options = ParseOptions {
            max_depth: 4,
            ..ParseOptions::default()
        };
        let chunk = parse_with_options("x = ((((((1))))))", "main.lua", options);
        assert_eq!(chunk.errors[0].message, "chunk has too many syntax levels");
    }

    #[test]
    fn test_include_inlines_statements() {
        let resolver = MemoryResolver::new().with_file("lib.lua", "function helper() end");
        let chunk = parse_memory("#include lib.lua\nhelper()", resolver);
        assert!(chunk.errors.is_empty(), "{:?}", chunk.errors);
        assert_eq!(chunk.body.len(), 3);
        assert!(matches!(chunk.body[0], Statement::Include { .. }));
        assert_eq!(chunk.body[1].loc().file(), FileId(1));
        assert_eq!(chunk.files, vec!["main.lua".to_string(), "lib.lua".to_string()]);
        assert!(chunk.warnings.is_empty(), "{:?}", chunk.warnings);
    }

    #[test]
    fn test_missing_include() {
        let chunk = parse_memory("#include nope.lua\nx = 1", MemoryResolver::new());
        assert_eq!(chunk.errors.len(), 1);
        assert_eq!(chunk.errors[0].message, "#include target 'nope.lua' does not exist");
        assert_eq!(chunk.body.len(), 2);
    }

    #[test]
    fn test_include_directory() {
        let resolver = MemoryResolver::new().with_file("lib/a.lua", "x = 1");
        let chunk = parse_memory("#include lib", resolver);
        assert_eq!(chunk.errors[0].message, "#include target 'lib' is not a file");
    }

    #[test]
    fn test_nested_include_failure_attaches_to_root() {
        let resolver = MemoryResolver::new()
            .with_file("a.lua", "#include b.lua")
            .with_file("b.lua", "#include missing.lua");
        let chunk = parse_memory("x = 1\n#include a.lua", resolver);
        assert_eq!(chunk.errors.len(), 1);
        let err = &chunk.errors[0];
        assert_eq!(err.bounds.start.line, 2);
        assert_eq!(err.bounds.file(), FileId::ROOT);
        assert_eq!(err.include_chain, vec!["main.lua", "a.lua", "b.lua"]);
    }

    #[test]
    fn test_circular_include() {
        let resolver = MemoryResolver::new()
            .with_file("main.lua", "#include a.lua\nx = 1")
            .with_file("a.lua", "y = 1\n#include main.lua");
        let chunk = parse_memory("#include a.lua\nx = 1", resolver);
        let circular: Vec<_> = chunk
            .errors
            .iter()
            .filter(|e| e.message == "circular #includes")
            .collect();
        assert_eq!(circular.len(), 1);
        assert_eq!(chunk.errors.len(), 1);
        assert_eq!(circular[0].include_chain, vec!["main.lua", "a.lua"]);
        // include, `y = 1`, the rejected include, `x = 1`
        assert_eq!(chunk.body.len(), 4);
    }
}
