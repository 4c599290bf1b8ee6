//! Lexer (tokenizer) for PICO-8 Lua source
//!
//! Converts raw source text into [`Token`]s on demand. The parser reads three
//! tokens at a time: [`Lexer::previous`], [`Lexer::token`] and
//! [`Lexer::lookahead`], and moves the window with [`Lexer::next`].
//!
//! Beyond standard Lua the lexer understands:
//! - `.p8` cartridge framing (everything outside `__lua__` is skipped)
//! - `//` line comments and the extended PICO-8 operator set
//! - binary (`0b`) and fractional hex literals
//! - `#include` lines, surfaced as a single [`TokenKind::RawLine`]
//! - a significant-newline mode used by the one-line `if` form

use super::ast::{Bounds, FileId, Position};
use super::encoding::EncodingMode;
use super::messages::{self, format_message};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

const CARTRIDGE_HEADER: &str = "pico-8 cartridge";
const LUA_SECTION: &str = "__lua__";
const DATA_SECTIONS: [&str; 7] = [
    "__gfx__", "__gff__", "__label__", "__map__", "__sfx__", "__music__", "__meta:",
];

/// Multi-character punctuators, longest first so the first hit is the
/// longest match.
const PUNCTUATORS: &[&str] = &[
    ">>>=", "<<>=", ">><=", "...", "..=", ">>>", "<<>", ">><", "<<=", ">>=", "^^=", "..", "::",
    "==", "~=", "!=", "<=", ">=", "<<", ">>", "^^", "+=", "-=", "*=", "/=", "\\=", "%=", "^=",
    "|=", "&=",
];

const SINGLE_PUNCTUATORS: &str = "+-*/\\%^#&~|<>=(){}[];:,.@$?";

const KEYWORDS: [&str; 19] = [
    "and", "break", "do", "else", "elseif", "end", "for", "function", "goto", "if", "in",
    "local", "not", "or", "repeat", "return", "then", "until", "while",
];

/// Token categories. Literal kinds carry their decoded value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TokenKind {
    Eof,
    /// Decoded contents; `None` when the encoding mode discards strings
    StringLiteral(Option<String>),
    Keyword,
    Identifier,
    NumericLiteral(f64),
    Punctuator,
    BooleanLiteral(bool),
    NilLiteral,
    VarargLiteral,
    Newline,
    /// Directive line such as `#include`; the token value is its argument
    RawLine,
}

impl TokenKind {
    /// Category name used in "unexpected ..." messages.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Eof => "<eof>",
            TokenKind::StringLiteral(_) => "string",
            TokenKind::Keyword => "keyword",
            TokenKind::Identifier => "identifier",
            TokenKind::NumericLiteral(_) => "number",
            TokenKind::Punctuator => "symbol",
            TokenKind::BooleanLiteral(_) => "boolean",
            TokenKind::NilLiteral => "nil",
            TokenKind::VarargLiteral => "vararg",
            TokenKind::Newline => "newline",
            TokenKind::RawLine => "directive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Keyword, identifier or punctuator text; raw source of literals;
    /// `<eof>` at the end of input
    pub value: String,
    pub bounds: Bounds,
}

impl Token {
    pub fn eof(at: Position) -> Self {
        Token {
            kind: TokenKind::Eof,
            value: "<eof>".to_string(),
            bounds: Bounds::new(at, at),
        }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    pub fn is_newline(&self) -> bool {
        matches!(self.kind, TokenKind::Newline)
    }

    pub fn is_punctuator(&self, text: &str) -> bool {
        matches!(self.kind, TokenKind::Punctuator) && self.value == text
    }

    pub fn is_keyword(&self, text: &str) -> bool {
        matches!(self.kind, TokenKind::Keyword) && self.value == text
    }

    pub fn is_identifier(&self) -> bool {
        matches!(self.kind, TokenKind::Identifier)
    }

    /// Whether this token closes a block (`end`, `else`, `elseif`, `until`)
    /// or ends the input.
    pub fn is_block_follow(&self) -> bool {
        match self.kind {
            TokenKind::Eof => true,
            TokenKind::Keyword => {
                matches!(self.value.as_str(), "else" | "elseif" | "end" | "until")
            }
            _ => false,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind.describe(), self.value)
    }
}

/// Lexer error type
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{message}")]
pub struct LexError {
    pub message: String,
    pub bounds: Bounds,
}

/// Lexer for PICO-8 Lua source
pub struct Lexer {
    input: Vec<char>,
    index: usize,
    line: usize,
    line_start: usize,
    /// One past the last lexable character (start of cartridge data sections)
    end: usize,
    file: FileId,
    encoding: EncodingMode,
    newline_mode: bool,
    pub previous: Token,
    pub token: Token,
    pub lookahead: Token,
}

impl Lexer {
    /// Create a new lexer. Call [`Lexer::start`] before reading tokens.
    pub fn new(source: &str, file: FileId, encoding: EncodingMode) -> Self {
        let input: Vec<char> = source.chars().collect();
        let end = input.len();
        let origin = Position::new(1, 1, 0, file);
        let mut lexer = Self {
            input,
            index: 0,
            line: 1,
            line_start: 0,
            end,
            file,
            encoding,
            newline_mode: false,
            previous: Token::eof(origin),
            token: Token::eof(origin),
            lookahead: Token::eof(origin),
        };
        lexer.skip_cartridge_framing();
        lexer
    }

    pub fn file(&self) -> FileId {
        self.file
    }

    /// Lex the first two tokens.
    pub fn start(&mut self) -> Result<(), LexError> {
        let primed = self.advance_lookahead();
        let advanced = self.next();
        primed.and(advanced)
    }

    /// Shift the token window by one.
    ///
    /// A lexical error in the new lookahead is returned after the window has
    /// moved; the lookahead is then re-lexed from past the offending text so
    /// the same error is never reported twice.
    pub fn next(&mut self) -> Result<(), LexError> {
        let crossed_line = self.newline_mode
            && !self.token.is_newline()
            && !self.token.is_eof()
            && self.token.bounds.end.line < self.lookahead.bounds.start.line;

        if crossed_line {
            let at = self.token.bounds.end;
            let newline = Token {
                kind: TokenKind::Newline,
                value: "<newline>".to_string(),
                bounds: Bounds::new(at, at),
            };
            self.previous = std::mem::replace(&mut self.token, newline);
            return Ok(());
        }

        let at = self.position();
        let upcoming = std::mem::replace(&mut self.lookahead, Token::eof(at));
        self.previous = std::mem::replace(&mut self.token, upcoming);
        self.advance_lookahead()
    }

    pub fn newline_mode(&self) -> bool {
        self.newline_mode
    }

    /// Toggle significant-newline mode. Turning it off drops a pending
    /// newline token without disturbing [`Lexer::previous`].
    pub fn set_newline_mode(&mut self, enabled: bool) -> Result<(), LexError> {
        self.newline_mode = enabled;
        if !enabled && self.token.is_newline() {
            let at = self.position();
            let upcoming = std::mem::replace(&mut self.lookahead, Token::eof(at));
            self.token = upcoming;
            return self.advance_lookahead();
        }
        Ok(())
    }

    /// Tokenize the entire input (newline mode is not applied)
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.lex()?;
            let done = token.is_eof();
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn advance_lookahead(&mut self) -> Result<(), LexError> {
        match self.lex() {
            Ok(token) => {
                self.lookahead = token;
                Ok(())
            }
            Err(err) => {
                tracing::trace!(error = %err, "re-lexing after lexical error");
                // every failed lex consumes input, and Eof never fails
                self.lookahead = loop {
                    if let Ok(token) = self.lex() {
                        break token;
                    }
                };
                Err(err)
            }
        }
    }

    /// Skip `.p8` framing: the header up to the `__lua__` line, and every
    /// section after the code.
    fn skip_cartridge_framing(&mut self) {
        if !self.starts_with_at(0, CARTRIDGE_HEADER) {
            return;
        }
        let mut line_start = 0;
        let mut line = 1;
        let mut code_start = None;
        while line_start < self.input.len() {
            let line_end = self.line_end_from(line_start);
            if code_start.is_none() {
                if self.starts_with_at(line_start, LUA_SECTION) {
                    code_start = Some((line_end + 1, line + 1));
                }
            } else if DATA_SECTIONS
                .iter()
                .any(|marker| self.starts_with_at(line_start, marker))
            {
                self.end = line_start;
                break;
            }
            line_start = line_end + 1;
            line += 1;
        }

        match code_start {
            Some((index, line)) => {
                self.index = index.min(self.end);
                self.line_start = self.index;
                self.line = line;
            }
            None => {
                // header without a code section: nothing to lex
                self.index = self.input.len();
                self.line_start = self.index;
                self.line = line;
            }
        }
    }

    /// Produce the next token from the input
    fn lex(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace_and_comments()?;
        let start = self.position();

        let Some(ch) = self.peek() else {
            return Ok(Token::eof(start));
        };

        match ch {
            '"' | '\'' => self.string_literal(ch),
            '0'..='9' => self.numeric_literal(),
            '.' if self.peek_ahead(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.numeric_literal()
            }
            '[' if self.long_bracket_level().is_some() => self.long_string_literal(),
            '#' if self.at_line_start() && self.starts_with_at(self.index + 1, "include") => {
                Ok(self.raw_line())
            }
            c if is_identifier_start(c) => Ok(self.identifier_or_keyword()),
            _ => self.punctuator(),
        }
    }

    fn punctuator(&mut self) -> Result<Token, LexError> {
        let start = self.position();

        let text = match PUNCTUATORS.iter().find(|p| self.starts_with_at(self.index, p)) {
            Some(text) => {
                self.index += text.len();
                text.to_string()
            }
            None => {
                let Some(ch) = self.advance() else {
                    return Ok(Token::eof(start));
                };
                let text = ch.to_string();
                if !SINGLE_PUNCTUATORS.contains(ch) {
                    return Err(LexError {
                        message: format_message(messages::UNEXPECTED, &["symbol", &text, &text]),
                        bounds: Bounds::new(start, self.position()),
                    });
                }
                text
            }
        };

        let kind = if text == "..." {
            TokenKind::VarargLiteral
        } else {
            TokenKind::Punctuator
        };
        Ok(Token {
            kind,
            value: text,
            bounds: Bounds::new(start, self.position()),
        })
    }

    fn identifier_or_keyword(&mut self) -> Token {
        let start = self.position();
        let from = self.index;
        while self.peek().is_some_and(is_identifier_part) {
            self.advance();
        }
        let text = self.slice(from, self.index);

        let kind = match text.as_str() {
            "true" => TokenKind::BooleanLiteral(true),
            "false" => TokenKind::BooleanLiteral(false),
            "nil" => TokenKind::NilLiteral,
            word if KEYWORDS.contains(&word) => TokenKind::Keyword,
            _ => TokenKind::Identifier,
        };

        Token {
            kind,
            value: text,
            bounds: Bounds::new(start, self.position()),
        }
    }

    /// `#include target` occupying the rest of the line
    fn raw_line(&mut self) -> Token {
        let start = self.position();
        self.index += "#include".chars().count();
        let from = self.index;
        let to = self.line_end_from(self.index).min(self.end);
        self.index = to;
        let target = self.slice(from, to).trim().to_string();

        Token {
            kind: TokenKind::RawLine,
            value: target,
            bounds: Bounds::new(start, self.position()),
        }
    }

    /// Parse a numeric literal: decimal, hex (`0x`) or binary (`0b`)
    fn numeric_literal(&mut self) -> Result<Token, LexError> {
        let start = self.position();
        let from = self.index;

        let value = if self.peek() == Some('0')
            && matches!(self.peek_ahead(1), Some('x' | 'X'))
        {
            self.index += 2;
            self.radix_literal(16, true)
        } else if self.peek() == Some('0') && matches!(self.peek_ahead(1), Some('b' | 'B')) {
            self.index += 2;
            self.radix_literal(2, false)
        } else {
            self.decimal_literal()
        };

        let raw = self.slice(from, self.index);
        let bounds = Bounds::new(start, self.position());
        match value {
            Some(value) => Ok(Token {
                kind: TokenKind::NumericLiteral(value),
                value: raw,
                bounds,
            }),
            None => Err(LexError {
                message: format_message(messages::MALFORMED_NUMBER, &[&raw]),
                bounds,
            }),
        }
    }

    fn decimal_literal(&mut self) -> Option<f64> {
        let from = self.index;
        self.skip_digits(10);
        if self.peek() == Some('.') {
            self.advance();
            self.skip_digits(10);
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.advance();
            if matches!(self.peek(), Some('+' | '-')) {
                self.advance();
            }
            if self.skip_digits(10) == 0 {
                return None;
            }
        }
        self.slice(from, self.index).parse::<f64>().ok()
    }

    /// Digits in `radix` with an optional fraction and, for hex, an optional
    /// binary exponent: `(int + fraction) * 2^exp`.
    fn radix_literal(&mut self, radix: u32, allow_exponent: bool) -> Option<f64> {
        let mut digits = 0;
        let mut value = 0.0_f64;
        while let Some(d) = self.peek().and_then(|c| c.to_digit(radix)) {
            value = value * f64::from(radix) + f64::from(d);
            digits += 1;
            self.advance();
        }

        if self.peek() == Some('.') {
            self.advance();
            let mut scale = 1.0 / f64::from(radix);
            while let Some(d) = self.peek().and_then(|c| c.to_digit(radix)) {
                value += f64::from(d) * scale;
                scale /= f64::from(radix);
                digits += 1;
                self.advance();
            }
        }

        if digits == 0 {
            return None;
        }

        if allow_exponent && matches!(self.peek(), Some('p' | 'P')) {
            self.advance();
            let negative = match self.peek() {
                Some('-') => {
                    self.advance();
                    true
                }
                Some('+') => {
                    self.advance();
                    false
                }
                _ => false,
            };
            let mut exponent: i32 = 0;
            let mut exponent_digits = 0;
            while let Some(d) = self.peek().and_then(|c| c.to_digit(10)) {
                exponent = exponent.saturating_mul(10).saturating_add(d as i32);
                exponent_digits += 1;
                self.advance();
            }
            if exponent_digits == 0 {
                return None;
            }
            let exponent = if negative { -exponent } else { exponent };
            value *= 2f64.powi(exponent);
        }

        Some(value)
    }

    fn skip_digits(&mut self, radix: u32) -> usize {
        let mut count = 0;
        while self.peek().is_some_and(|c| c.is_digit(radix)) {
            self.advance();
            count += 1;
        }
        count
    }

    /// Parse a quoted string literal.
    ///
    /// Escape errors are remembered and reported once the closing quote has
    /// been consumed, so lexing resumes after the whole literal.
    fn string_literal(&mut self, delimiter: char) -> Result<Token, LexError> {
        let start = self.position();
        let from = self.index;
        self.advance();

        let discard = self.encoding.discards_strings();
        let mut value = String::new();
        let mut segment_start = self.index;
        let mut first_error: Option<LexError> = None;

        loop {
            match self.peek() {
                None | Some('\n') | Some('\r') => {
                    let raw = self.slice(from, self.index);
                    let bounds = Bounds::new(start, self.position());
                    // nothing sensible follows an unterminated string
                    while self.advance().is_some() {}
                    return Err(LexError {
                        message: format_message(messages::UNFINISHED_STRING, &[&raw]),
                        bounds,
                    });
                }
                Some(ch) if ch == delimiter => {
                    self.flush_segment(&mut value, segment_start, start, &mut first_error);
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.flush_segment(&mut value, segment_start, start, &mut first_error);
                    if let Err(err) = self.read_escape(&mut value) {
                        first_error.get_or_insert(err);
                    }
                    segment_start = self.index;
                }
                Some(_) => {
                    self.advance();
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }

        Ok(Token {
            kind: TokenKind::StringLiteral((!discard).then_some(value)),
            value: self.slice(from, self.index),
            bounds: Bounds::new(start, self.position()),
        })
    }

    /// Append raw string content between `from` and the current index.
    fn flush_segment(
        &self,
        value: &mut String,
        from: usize,
        token_start: Position,
        first_error: &mut Option<LexError>,
    ) {
        if self.encoding.discards_strings() || from >= self.index {
            return;
        }
        let raw = self.slice(from, self.index);
        match self.encoding.validate(&raw) {
            Ok(()) => value.push_str(&raw),
            Err(bad) => {
                let code = format!("{:04X}", bad as u32);
                first_error.get_or_insert(LexError {
                    message: format_message(messages::INVALID_CODE_UNIT, &[&code]),
                    bounds: Bounds::new(token_start, self.position()),
                });
            }
        }
    }

    /// Read one escape sequence starting at the backslash.
    fn read_escape(&mut self, value: &mut String) -> Result<(), LexError> {
        let start = self.position();
        let from = self.index;
        self.advance();

        let Some(ch) = self.peek() else {
            return Ok(()); // reported as an unfinished string
        };

        let byte = match ch {
            'a' => Some(0x07),
            'b' => Some(0x08),
            'f' => Some(0x0C),
            'n' => Some(b'\n'),
            'r' => Some(b'\r'),
            't' => Some(b'\t'),
            'v' => Some(0x0B),
            '\\' => Some(b'\\'),
            '"' => Some(b'"'),
            '\'' => Some(b'\''),
            '\n' => Some(b'\n'),
            _ => None,
        };
        if let Some(byte) = byte {
            self.advance();
            self.push_byte(value, byte);
            return Ok(());
        }

        match ch {
            'z' => {
                self.advance();
                while self.peek().is_some_and(char::is_whitespace) {
                    self.advance();
                }
                Ok(())
            }
            'x' => {
                self.advance();
                let hi = self.peek().and_then(|c| c.to_digit(16));
                let lo = self.peek_ahead(1).and_then(|c| c.to_digit(16));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        self.index += 2;
                        self.push_byte(value, (hi * 16 + lo) as u8);
                        Ok(())
                    }
                    _ => {
                        let taken = if hi.is_some() { 1 } else { 0 };
                        self.index += taken;
                        Err(self.escape_error(messages::HEXADECIMAL_DIGIT_EXPECTED, start, from))
                    }
                }
            }
            '0'..='9' => {
                let mut number: u32 = 0;
                let mut count = 0;
                while count < 3 {
                    match self.peek().and_then(|c| c.to_digit(10)) {
                        Some(d) => {
                            number = number * 10 + d;
                            count += 1;
                            self.advance();
                        }
                        None => break,
                    }
                }
                match u8::try_from(number) {
                    Ok(byte) => {
                        self.push_byte(value, byte);
                        Ok(())
                    }
                    Err(_) => {
                        Err(self.escape_error(messages::DECIMAL_ESCAPE_TOO_LARGE, start, from))
                    }
                }
            }
            'u' => {
                self.advance();
                if self.peek() != Some('{') {
                    return Err(self.escape_error(
                        messages::HEXADECIMAL_DIGIT_EXPECTED,
                        start,
                        from,
                    ));
                }
                self.advance();
                let mut codepoint: u64 = 0;
                let mut digits = 0;
                while let Some(d) = self.peek().and_then(|c| c.to_digit(16)) {
                    codepoint = (codepoint * 16 + u64::from(d)).min(u64::from(u32::MAX) + 1);
                    digits += 1;
                    self.advance();
                }
                if digits == 0 || self.peek() != Some('}') {
                    return Err(self.escape_error(
                        messages::HEXADECIMAL_DIGIT_EXPECTED,
                        start,
                        from,
                    ));
                }
                self.advance();
                if codepoint > 0x7FFF_FFFF {
                    return Err(self.escape_error(messages::TOO_LARGE_CODEPOINT, start, from));
                }
                if !self.encoding.discards_strings() {
                    value.push_str(&self.encoding.encode_codepoint(codepoint as u32));
                }
                Ok(())
            }
            // PICO-8 control codes keep their backslash
            '*' | '#' | '-' | '|' | '+' | '^' => {
                self.advance();
                if !self.encoding.discards_strings() {
                    value.push('\\');
                    value.push(ch);
                }
                Ok(())
            }
            _ => {
                self.advance();
                Err(self.escape_error(messages::INVALID_ESCAPE, start, from))
            }
        }
    }

    fn push_byte(&self, value: &mut String, byte: u8) {
        if let Some(ch) = self.encoding.encode_byte(byte) {
            value.push(ch);
        }
    }

    fn escape_error(&self, template: &str, start: Position, from: usize) -> LexError {
        let near = self.slice(from, self.index);
        LexError {
            message: format_message(template, &[&near]),
            bounds: Bounds::new(start, self.position()),
        }
    }

    fn long_string_literal(&mut self) -> Result<Token, LexError> {
        let start = self.position();
        let from = self.index;
        let level = self.long_bracket_level().unwrap_or(0);

        let Some(content) = self.long_bracket_content(level) else {
            let line = start.line.to_string();
            return Err(LexError {
                message: format_message(messages::UNFINISHED_LONG_STRING, &[&line, "<eof>"]),
                bounds: Bounds::new(start, self.position()),
            });
        };

        let value = if self.encoding.discards_strings() {
            None
        } else {
            match self.encoding.validate(&content) {
                Ok(()) => Some(content),
                Err(bad) => {
                    let code = format!("{:04X}", bad as u32);
                    return Err(LexError {
                        message: format_message(messages::INVALID_CODE_UNIT, &[&code]),
                        bounds: Bounds::new(start, self.position()),
                    });
                }
            }
        };

        Ok(Token {
            kind: TokenKind::StringLiteral(value),
            value: self.slice(from, self.index),
            bounds: Bounds::new(start, self.position()),
        })
    }

    /// Level of a long bracket opening at the current index (`[[` is 0,
    /// `[==[` is 2), or `None` if this `[` does not open one.
    fn long_bracket_level(&self) -> Option<usize> {
        if self.peek() != Some('[') {
            return None;
        }
        let mut level = 0;
        while self.peek_ahead(1 + level) == Some('=') {
            level += 1;
        }
        (self.peek_ahead(1 + level) == Some('[')).then_some(level)
    }

    /// Consume a long bracket of `level` and return its contents, or `None`
    /// if input ends first. A newline right after the opening is skipped.
    fn long_bracket_content(&mut self, level: usize) -> Option<String> {
        self.index += level + 2;
        if self.peek() == Some('\r') {
            self.advance();
        }
        if self.peek() == Some('\n') {
            self.advance();
        }

        let from = self.index;
        loop {
            match self.peek()? {
                ']' if (1..=level).all(|i| self.peek_ahead(i) == Some('='))
                    && self.peek_ahead(level + 1) == Some(']') =>
                {
                    let content = self.slice(from, self.index);
                    self.index += level + 2;
                    return Some(content);
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Skip whitespace, `--` comments (line and long) and `//` comments
    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('-') if self.peek_ahead(1) == Some('-') => {
                    let start = self.position();
                    self.index += 2;
                    if let Some(level) = self.long_bracket_level() {
                        if self.long_bracket_content(level).is_none() {
                            let line = start.line.to_string();
                            return Err(LexError {
                                message: format_message(
                                    messages::UNFINISHED_LONG_COMMENT,
                                    &[&line, "<eof>"],
                                ),
                                bounds: Bounds::new(start, self.position()),
                            });
                        }
                    } else {
                        self.skip_line_comment();
                    }
                }
                Some('/') if self.peek_ahead(1) == Some('/') => {
                    self.skip_line_comment();
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    /// Whether only whitespace precedes the current index on its line
    fn at_line_start(&self) -> bool {
        self.input[self.line_start..self.index]
            .iter()
            .all(|c| c.is_whitespace())
    }

    fn line_end_from(&self, from: usize) -> usize {
        self.input[from..]
            .iter()
            .position(|&c| c == '\n')
            .map_or(self.input.len(), |offset| from + offset)
    }

    fn starts_with_at(&self, at: usize, text: &str) -> bool {
        let mut i = at;
        for expected in text.chars() {
            if i >= self.end || self.input[i] != expected {
                return false;
            }
            i += 1;
        }
        true
    }

    fn slice(&self, from: usize, to: usize) -> String {
        self.input[from..to].iter().collect()
    }

    /// Peek at current character without consuming
    fn peek(&self) -> Option<char> {
        self.peek_ahead(0)
    }

    /// Peek ahead n characters
    fn peek_ahead(&self, n: usize) -> Option<char> {
        let pos = self.index + n;
        if pos < self.end {
            Some(self.input[pos])
        } else {
            None
        }
    }

    /// Advance to next character, tracking line starts
    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.index += 1;
        if ch == '\n' {
            self.line += 1;
            self.line_start = self.index;
        }
        Some(ch)
    }

    /// Current position, derived from `index`, `line` and `line_start`
    fn position(&self) -> Position {
        Position::new(
            self.line,
            self.index - self.line_start + 1,
            self.index,
            self.file,
        )
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch as u32 >= 0x80
}

fn is_identifier_part(ch: char) -> bool {
    is_identifier_start(ch) || ch.is_ascii_digit()
}
