//! Statement parsing implementation
//!
//! This module handles parsing of all PICO-8 Lua statement types:
//!
//! - Declarations: `local a, b = 1, 2`, `local function f() end`
//! - Control flow: `if`, `while`, `repeat`, numeric and generic `for`, `do`
//! - Jumps: `return`, `break`, `goto`, `::label::`
//! - Assignments (including compound `+=`, `..=`, ...) and call statements
//! - PICO-8 extensions: `?expr` print shorthand, one-line `if (cond) stmt`,
//!   `#include`
//!
//! # Grammar
//!
//! ```text
//! statement ::= local_stmt | if_stmt | while_stmt | for_stmt | repeat_stmt
//!             | do_stmt | function_stmt | return_stmt | break_stmt
//!             | goto_stmt | label_stmt | include | print_shorthand
//!             | assignment | call_stmt | ';'
//! ```
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::messages;
use crate::parser::parse::{ParseError, Parser};

impl Parser {
    /// Parse a statement. `Ok(None)` is an empty statement (`;`).
    pub(crate) fn parse_statement(&mut self) -> Result<Option<Statement>, ParseError> {
        let depth = self.depth();
        let statement = self.enter().and_then(|()| self.parse_statement_kind());
        self.leave_to(depth);
        statement
    }

    fn parse_statement_kind(&mut self) -> Result<Option<Statement>, ParseError> {
        let token = self.token();
        if matches!(token.kind, TokenKind::RawLine) {
            return self.parse_include_statement().map(Some);
        }
        if token.is_punctuator("::") {
            return self.parse_label_statement().map(Some);
        }
        if token.is_punctuator(";") {
            self.next()?;
            return Ok(None);
        }

        // a statement after a label makes deferred jumps into local scope fatal
        let deferred = self.flow.raise_deferred_errors();
        self.errors.extend(deferred);

        let keyword = match self.token().kind {
            TokenKind::Keyword => Some(self.token().value.clone()),
            _ => None,
        };
        let statement = match keyword.as_deref() {
            Some("local") => self.parse_local_statement()?,
            Some("if") => self.parse_if_statement()?,
            Some("return") => self.parse_return_statement()?,
            Some("function") => self.parse_function_statement()?,
            Some("while") => self.parse_while_statement()?,
            Some("for") => self.parse_for_statement()?,
            Some("repeat") => self.parse_repeat_statement()?,
            Some("break") => self.parse_break_statement()?,
            Some("do") => self.parse_do_statement()?,
            Some("goto") => self.parse_goto_statement()?,
            _ if self.token().is_punctuator("?") => self.parse_print_shorthand()?,
            _ => self.parse_assignment_or_call_statement()?,
        };
        Ok(Some(statement))
    }

    /// Parse a block inside its own flow and parse-time scope.
    pub(crate) fn parse_scoped_block(&mut self, is_loop: bool) -> Block {
        self.flow.push_scope(is_loop);
        self.create_scope();
        let body = self.parse_block();
        self.destroy_scope();
        self.pop_flow_scope();
        body
    }

    /// `#include target`: the target's statements follow inline.
    fn parse_include_statement(&mut self) -> Result<Statement, ParseError> {
        let token = self.token().clone();
        // advance within this file before the included one takes over
        if let Err(err) = self.lexer.next() {
            self.errors.push(err.into());
        }
        if let Err(err) = self.open_include(&token.value, token.bounds) {
            tracing::debug!(error = %err, "include rejected");
            self.errors.push(err);
        }
        self.pop_finished_includes();

        Ok(Statement::Include {
            filename: token.value,
            loc: token.bounds,
        })
    }

    fn parse_label_statement(&mut self) -> Result<Statement, ParseError> {
        self.mark_location();
        self.next()?; // ::
        let label = self.parse_identifier()?;
        self.expect("::")?;
        if let Some(err) = self.flow.add_label(&label.name, label.loc) {
            self.errors.push(err);
        }
        Ok(Statement::Label {
            label,
            loc: self.finish_node(),
        })
    }

    fn parse_break_statement(&mut self) -> Result<Statement, ParseError> {
        self.mark_location();
        let keyword = self.token().bounds;
        self.next()?;
        if !self.flow.is_in_loop() {
            let err = self.raise_at(keyword, messages::NO_LOOP_TO_BREAK, &[&self.token().value]);
            self.errors.push(err);
        }
        Ok(Statement::Break {
            loc: self.finish_node(),
        })
    }

    fn parse_goto_statement(&mut self) -> Result<Statement, ParseError> {
        self.mark_location();
        self.next()?;
        let label = self.parse_identifier()?;
        self.flow.add_goto(&label.name, label.loc);
        Ok(Statement::Goto {
            label,
            loc: self.finish_node(),
        })
    }

    fn parse_do_statement(&mut self) -> Result<Statement, ParseError> {
        self.mark_location();
        self.next()?;
        let body = self.parse_scoped_block(false);
        self.expect("end")?;
        Ok(Statement::Do {
            body,
            loc: self.finish_node(),
        })
    }

    fn parse_while_statement(&mut self) -> Result<Statement, ParseError> {
        self.mark_location();
        self.next()?;
        let condition = self.parse_expected_expression()?;
        self.expect("do")?;
        let body = self.parse_scoped_block(true);
        self.expect("end")?;
        Ok(Statement::While {
            condition,
            body,
            loc: self.finish_node(),
        })
    }

    /// `repeat ... until cond`; the condition sees the body's locals.
    fn parse_repeat_statement(&mut self) -> Result<Statement, ParseError> {
        self.mark_location();
        self.next()?;
        self.flow.push_scope(true);
        self.create_scope();
        let body = self.parse_block();
        self.expect("until")?;
        let condition = self.parse_expected_expression()?;
        self.destroy_scope();
        self.pop_flow_scope();
        Ok(Statement::Repeat {
            body,
            condition,
            loc: self.finish_node(),
        })
    }

    fn parse_return_statement(&mut self) -> Result<Statement, ParseError> {
        self.mark_location();
        self.next()?;
        let mut arguments = Vec::new();
        if let Some(first) = self.parse_expression()? {
            arguments.push(first);
            while self.consume(",")? {
                arguments.push(self.parse_expected_expression()?);
            }
        }
        self.consume(";")?;
        Ok(Statement::Return {
            arguments,
            loc: self.finish_node(),
        })
    }

    fn parse_if_statement(&mut self) -> Result<Statement, ParseError> {
        self.mark_location();
        self.next()?;
        // the first clause starts where the statement starts
        self.markers.reuse();

        let parenthesized = self.token().is_punctuator("(");
        let condition = self.parse_expected_expression()?;
        if parenthesized && self.previous().is_punctuator(")") && !self.token().is_keyword("then") {
            return self.parse_one_line_if(condition);
        }

        self.expect("then")?;
        let body = self.parse_scoped_block(false);
        let mut clauses = vec![IfClause {
            kind: ClauseKind::If,
            condition: Some(condition),
            body,
            loc: self.finish_node(),
        }];

        while self.token().is_keyword("elseif") {
            self.mark_location();
            self.next()?;
            let condition = self.parse_expected_expression()?;
            self.expect("then")?;
            let body = self.parse_scoped_block(false);
            clauses.push(IfClause {
                kind: ClauseKind::ElseIf,
                condition: Some(condition),
                body,
                loc: self.finish_node(),
            });
        }

        if self.token().is_keyword("else") {
            self.mark_location();
            self.next()?;
            let body = self.parse_scoped_block(false);
            clauses.push(IfClause {
                kind: ClauseKind::Else,
                condition: None,
                body,
                loc: self.finish_node(),
            });
        }

        self.expect("end")?;
        Ok(Statement::If {
            clauses,
            one_line: false,
            loc: self.finish_node(),
        })
    }

    /// `if (cond) stmt... [else stmt...]` ending at the line break.
    ///
    /// An `else` that ends its line starts a regular block closed by `end`.
    fn parse_one_line_if(&mut self, condition: Expression) -> Result<Statement, ParseError> {
        let was_newline_mode = self.lexer.newline_mode();
        self.set_newline_mode(true);

        let body = self.parse_scoped_block(false);
        let mut clauses = vec![IfClause {
            kind: ClauseKind::If,
            condition: Some(condition),
            body,
            loc: self.finish_node(),
        }];

        if self.token().is_keyword("else") {
            self.mark_location();
            self.next()?;
            let body = if self.token().is_newline() {
                self.set_newline_mode(false);
                let body = self.parse_scoped_block(false);
                self.expect("end")?;
                body
            } else {
                self.parse_scoped_block(false)
            };
            clauses.push(IfClause {
                kind: ClauseKind::Else,
                condition: None,
                body,
                loc: self.finish_node(),
            });
        }

        self.set_newline_mode(was_newline_mode);
        Ok(Statement::If {
            clauses,
            one_line: true,
            loc: self.finish_node(),
        })
    }

    fn parse_for_statement(&mut self) -> Result<Statement, ParseError> {
        self.mark_location();
        self.next()?;
        let variable = self.parse_identifier()?;

        self.flow.push_scope(true);
        self.create_scope();

        if self.consume("=")? {
            let start = self.parse_expected_expression()?;
            self.expect(",")?;
            let end = self.parse_expected_expression()?;
            let step = if self.consume(",")? {
                Some(self.parse_expected_expression()?)
            } else {
                None
            };
            self.expect("do")?;

            // the control variable is only visible inside the body
            self.flow.add_local(&variable.name);
            let variable = self.declare(variable);
            let body = self.parse_block();
            self.expect("end")?;
            self.destroy_scope();
            self.pop_flow_scope();

            return Ok(Statement::ForNumeric {
                variable,
                start,
                end,
                step,
                body,
                loc: self.finish_node(),
            });
        }

        let mut variables = vec![variable];
        while self.consume(",")? {
            variables.push(self.parse_identifier()?);
        }
        self.expect("in")?;
        let mut iterators = vec![self.parse_expected_expression()?];
        while self.consume(",")? {
            iterators.push(self.parse_expected_expression()?);
        }
        self.expect("do")?;

        let variables: Vec<Identifier> = variables
            .into_iter()
            .map(|variable| {
                self.flow.add_local(&variable.name);
                self.declare(variable)
            })
            .collect();
        let body = self.parse_block();
        self.expect("end")?;
        self.destroy_scope();
        self.pop_flow_scope();

        Ok(Statement::ForGeneric {
            variables,
            iterators,
            body,
            loc: self.finish_node(),
        })
    }

    fn parse_local_statement(&mut self) -> Result<Statement, ParseError> {
        self.mark_location();
        self.next()?;

        if self.token().is_identifier() {
            let mut variables = Vec::new();
            loop {
                let name = self.parse_identifier()?;
                self.flow.add_local(&name.name);
                variables.push(name);
                if !self.consume(",")? {
                    break;
                }
            }

            let mut init = Vec::new();
            if self.consume("=")? {
                loop {
                    init.push(self.parse_expected_expression()?);
                    if !self.consume(",")? {
                        break;
                    }
                }
            }

            // names become visible after their initializers
            let variables = variables
                .into_iter()
                .map(|name| self.declare(name))
                .collect();
            return Ok(Statement::Local {
                variables,
                init,
                loc: self.finish_node(),
            });
        }

        if self.consume("function")? {
            let name = self.parse_identifier()?;
            self.flow.add_local(&name.name);
            let name = self.declare(name);
            let function = self.parse_function_body(Some(Expression::Identifier(name)), true)?;
            return Ok(Statement::Function(function));
        }

        Err(self.expected_token("<name>"))
    }

    fn parse_function_statement(&mut self) -> Result<Statement, ParseError> {
        self.mark_location();
        self.next()?;
        let name = self.parse_function_name()?;
        let function = self.parse_function_body(Some(name), false)?;
        Ok(Statement::Function(function))
    }

    /// `name {'.' name} [':' name]`
    fn parse_function_name(&mut self) -> Result<Expression, ParseError> {
        let base = self.parse_identifier()?;
        let mut name = Expression::Identifier(self.reference(base));

        while self.consume(".")? {
            let key = self.parse_identifier()?;
            let loc = Bounds::new(name.loc().start, key.loc.end);
            name = Expression::member(name, Indexer::Dot, key, loc);
        }
        if self.consume(":")? {
            let key = self.parse_identifier()?;
            let loc = Bounds::new(name.loc().start, key.loc.end);
            name = Expression::member(name, Indexer::Colon, key, loc);
        }
        Ok(name)
    }

    /// `?a, b` is shorthand for `print(a, b)`
    fn parse_print_shorthand(&mut self) -> Result<Statement, ParseError> {
        self.mark_location();
        let question = self.token().bounds;
        self.next()?;
        let callee = self.reference(Identifier::new("print", question));

        let mut arguments = Vec::new();
        if let Some(first) = self.parse_expression()? {
            arguments.push(first);
            while self.consume(",")? {
                arguments.push(self.parse_expected_expression()?);
            }
        }

        let loc = self.finish_node();
        Ok(Statement::Call {
            expression: Expression::Call {
                base: Box::new(Expression::Identifier(callee)),
                arguments,
                loc,
            },
            loc,
        })
    }

    /// Parse `targets = values`, `target op= value` or a call statement.
    fn parse_assignment_or_call_statement(&mut self) -> Result<Statement, ParseError> {
        self.mark_location();
        let mut targets = Vec::new();
        // Some(true): assignable, Some(false): parenthesized, None: call
        let mut lvalue;

        loop {
            let start = self.token().bounds.start;
            let mut base = if self.token().is_identifier() {
                let ident = self.parse_identifier()?;
                lvalue = Some(true);
                Expression::Identifier(self.reference(ident))
            } else if self.token().is_punctuator("(") {
                let outer = self.open_bracket("(")?;
                let inner = self.parse_expected_expression()?;
                self.close_bracket(")", outer)?;
                lvalue = Some(false);
                inner
            } else {
                return Err(self.unexpected(self.token()));
            };

            loop {
                let token = self.token();
                let part = match token.kind {
                    TokenKind::StringLiteral(_) => "\"",
                    TokenKind::Punctuator => token.value.as_str(),
                    _ => "",
                };
                match part {
                    "." | "[" => lvalue = Some(true),
                    ":" | "(" | "{" | "\"" => lvalue = None,
                    _ => break,
                }
                self.enter()?;
                base = self.parse_prefix_expression_part(base, start)?;
            }

            targets.push(base);
            if !self.token().is_punctuator(",") {
                break;
            }
            if lvalue != Some(true) {
                return Err(self.unexpected(self.token()));
            }
            self.next()?;
        }

        if lvalue.is_none() && targets.len() == 1 {
            if let Some(expression) = targets.pop() {
                return Ok(Statement::Call {
                    expression,
                    loc: self.finish_node(),
                });
            }
        }
        if lvalue != Some(true) {
            return Err(self.unexpected(self.token()));
        }

        let operator = match self.token().kind {
            TokenKind::Punctuator => AssignOp::from_punctuator(&self.token().value),
            _ => None,
        };
        let Some(operator) = operator else {
            return Err(self.raise_at(
                self.token().bounds,
                messages::EXPECTED,
                &["=", &self.token().value],
            ));
        };
        self.next()?;

        let mut init = vec![self.parse_expected_expression()?];
        if !operator.is_compound() {
            while self.consume(",")? {
                init.push(self.parse_expected_expression()?);
            }
        }

        Ok(Statement::Assignment {
            variables: targets,
            operator,
            init,
            loc: self.finish_node(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::parse::parse;

    fn parse_ok(source: &str) -> Chunk {
        let chunk = parse(source);
        assert!(chunk.errors.is_empty(), "unexpected errors: {:?}", chunk.errors);
        chunk
    }

    fn messages(source: &str) -> Vec<String> {
        parse(source).errors.into_iter().map(|e| e.message).collect()
    }

    #[test]
    fn test_local_statement() {
        let chunk = parse_ok("local a, b = 1, 2");
        match &chunk.body[0] {
            Statement::Local {
                variables, init, ..
            } => {
                assert_eq!(variables.len(), 2);
                assert!(variables.iter().all(|v| v.is_local));
                assert_eq!(init.len(), 2);
            }
            other => panic!("expected local, got {:?}", other),
        }
    }

    #[test]
    fn test_local_not_visible_in_own_initializer() {
        let chunk = parse_ok("local x = x");
        match &chunk.body[0] {
            Statement::Local { init, .. } => {
                assert!(matches!(&init[0], Expression::Identifier(id) if !id.is_local));
            }
            other => panic!("expected local, got {:?}", other),
        }
    }

    #[test]
    fn test_if_clauses() {
        let chunk = parse_ok("if a then x() elseif b then y() else z() end");
        match &chunk.body[0] {
            Statement::If {
                clauses, one_line, ..
            } => {
                assert!(!one_line);
                let kinds: Vec<ClauseKind> = clauses.iter().map(|c| c.kind).collect();
                assert_eq!(kinds, vec![ClauseKind::If, ClauseKind::ElseIf, ClauseKind::Else]);
                assert_eq!(clauses[0].loc.start, chunk.body[0].loc().start);
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_parenthesized_condition_with_then() {
        let chunk = parse_ok("if (a) then\n  b()\nend");
        assert!(matches!(&chunk.body[0], Statement::If { one_line: false, .. }));
    }

    #[test]
    fn test_one_line_if() {
        let chunk = parse_ok("if (x) y = 1 z = 2\nw = 3");
        assert_eq!(chunk.body.len(), 2);
        match &chunk.body[0] {
            Statement::If {
                clauses, one_line, ..
            } => {
                assert!(one_line);
                assert_eq!(clauses.len(), 1);
                assert_eq!(clauses[0].body.len(), 2);
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_one_line_if_else() {
        let chunk = parse_ok("if (x) a() else b()\nc()");
        assert_eq!(chunk.body.len(), 2);
        match &chunk.body[0] {
            Statement::If { clauses, .. } => {
                assert_eq!(clauses.len(), 2);
                assert_eq!(clauses[1].kind, ClauseKind::Else);
                assert_eq!(clauses[1].body.len(), 1);
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_one_line_if_with_block_else() {
        let chunk = parse_ok("if (x) a() else\n  b()\n  c()\nend\nd()");
        assert_eq!(chunk.body.len(), 2);
        match &chunk.body[0] {
            Statement::If { clauses, loc, .. } => {
                assert_eq!(clauses[1].body.len(), 2);
                assert_eq!(loc.end.line, 4);
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_one_line_if_spanning_brackets() {
        let chunk = parse_ok("if (a) f({1,\n2}, t[\ni])\nx = 1");
        assert_eq!(chunk.body.len(), 2);
        match &chunk.body[0] {
            Statement::If { clauses, loc, .. } => {
                assert_eq!(clauses[0].body.len(), 1);
                assert_eq!(loc.end.line, 3);
            }
            other => panic!("expected if, got {:?}", other),
        }

        let chunk = parse_ok("if (a) cb = function()\n  return 1\nend\nx = 1");
        assert_eq!(chunk.body.len(), 2);
        assert!(matches!(chunk.body[1], Statement::Assignment { .. }));
    }

    #[test]
    fn test_print_shorthand() {
        let chunk = parse_ok("?\"score: \"..s, 8");
        match &chunk.body[0] {
            Statement::Call {
                expression: Expression::Call { base, arguments, .. },
                ..
            } => {
                assert_eq!(base.dotted_name().as_deref(), Some("print"));
                assert_eq!(arguments.len(), 2);
            }
            other => panic!("expected print call, got {:?}", other),
        }
    }

    #[test]
    fn test_compound_assignment() {
        let chunk = parse_ok("x += 1\ns ..= 'a'\nn >>>= 2");
        let ops: Vec<AssignOp> = chunk
            .body
            .iter()
            .map(|s| match s {
                Statement::Assignment { operator, .. } => *operator,
                other => panic!("expected assignment, got {:?}", other),
            })
            .collect();
        assert_eq!(
            ops,
            vec![
                AssignOp::Compound(BinaryOp::Add),
                AssignOp::Compound(BinaryOp::Concat),
                AssignOp::Compound(BinaryOp::LogicalShr),
            ]
        );
    }

    #[test]
    fn test_multiple_assignment_targets() {
        let chunk = parse_ok("a, b.c, d[1] = 1, 2, 3");
        match &chunk.body[0] {
            Statement::Assignment {
                variables, init, ..
            } => {
                assert_eq!(variables.len(), 3);
                assert_eq!(init.len(), 3);
                assert!(matches!(variables[2], Expression::Index { .. }));
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_call_statement_forms() {
        let chunk = parse_ok("f()\nobj:m(1)\ng'str'\nh{1}\n;(f)()");
        assert_eq!(chunk.body.len(), 5);
        assert!(chunk.body.iter().all(|s| matches!(s, Statement::Call { .. })));

        // without the separator a parenthesized line continues the call
        let chunk = parse_ok("h{1}\n(f)()");
        assert_eq!(chunk.body.len(), 1);
        let Statement::Call { expression, .. } = &chunk.body[0] else {
            panic!("expected call statement, got {:?}", chunk.body[0]);
        };
        let Expression::Call { base, .. } = expression else {
            panic!("expected call, got {:?}", expression);
        };
        let Expression::Call { base: inner, .. } = &**base else {
            panic!("expected chained call, got {:?}", base);
        };
        assert!(matches!(**inner, Expression::TableCall { .. }));
    }

    #[test]
    fn test_bare_expression_is_error() {
        assert_eq!(messages("x\ny = 1"), vec!["'=' expected near 'y'"]);
        assert_eq!(messages("(x) = 1"), vec!["unexpected symbol '=' near '1'"]);
    }

    #[test]
    fn test_loops() {
        let chunk = parse_ok(
            "for i = 1, 10, 2 do print(i) end\n\
             for k, v in pairs(t) do print(k, v) end\n\
             while true do break end\n\
             repeat local done = true until done",
        );
        assert!(matches!(&chunk.body[0], Statement::ForNumeric { step: Some(_), .. }));
        assert!(matches!(
            &chunk.body[1],
            Statement::ForGeneric { variables, .. } if variables.len() == 2
        ));
        match &chunk.body[3] {
            Statement::Repeat { condition, .. } => {
                assert!(matches!(condition, Expression::Identifier(id) if id.is_local));
            }
            other => panic!("expected repeat, got {:?}", other),
        }
    }

    #[test]
    fn test_function_names() {
        let chunk = parse_ok("function a.b:c(x, ...) return self end\nlocal function f() end");
        match &chunk.body[0] {
            Statement::Function(func) => {
                assert!(func.is_method());
                assert_eq!(
                    func.identifier.as_ref().and_then(|i| i.dotted_name()).as_deref(),
                    Some("a.b:c")
                );
                assert_eq!(func.signature(), "(x,...)");
            }
            other => panic!("expected function, got {:?}", other),
        }
        assert!(matches!(&chunk.body[1], Statement::Function(f) if f.is_local));
    }

    #[test]
    fn test_return_must_be_last() {
        assert_eq!(
            messages("function f()\n  return 1\n  x = 2\nend"),
            vec!["'end' expected near 'x'", "unexpected keyword 'end' near '<eof>'"]
        );
    }

    #[test]
    fn test_break_outside_loop() {
        assert_eq!(messages("break"), vec!["no loop to break near '<eof>'"]);
        assert!(messages("while true do if x then break end end").is_empty());
    }

    #[test]
    fn test_break_does_not_cross_functions() {
        assert_eq!(
            messages("while true do\n  f = function() break end\nend"),
            vec!["no loop to break near 'end'"]
        );
    }

    #[test]
    fn test_goto_rules() {
        assert!(messages("::top:: x = 1 goto top").is_empty());
        assert!(messages("goto done\nx = 1\n::done::").is_empty());
        assert_eq!(
            messages("goto skip\nlocal x = 1\n::skip::\nprint(x)"),
            vec!["<goto skip> jumps into the scope of local 'x'"]
        );
        assert_eq!(
            messages("do goto missing end"),
            vec!["no visible label 'missing' for goto"]
        );
        assert_eq!(
            messages("::a::\n::a::"),
            vec!["label 'a' already defined on line 1"]
        );
    }

    #[test]
    fn test_empty_statements() {
        let chunk = parse_ok(";;x = 1;;");
        assert_eq!(chunk.body.len(), 1);
    }
}
