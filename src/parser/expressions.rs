//! Expression parsing implementation
//!
//! This module handles parsing of all expression types using precedence
//! climbing:
//!
//! - Literals: numbers, strings, `true`/`false`, `nil`, `...`
//! - Prefix expressions: names, parenthesized expressions, member access,
//!   indexing and the three call forms (`f(...)`, `f{...}`, `f"..."`)
//! - Unary operators including the PICO-8 peeks (`@`, `%`, `$`)
//! - Binary operators (`^` and `..` are right associative)
//! - Table constructors and anonymous functions
//!
//! # Precedence (lowest to highest)
//!
//! ```text
//! or
//! and
//! <  >  <=  >=  ~=  !=  ==
//! |
//! ^^
//! &
//! <<  >>  >>>  <<>  >><
//! ..
//! +  -
//! *  /  \  %
//! unary (not  #  -  ~  @  %  $)
//! ^
//! ```

use crate::parser::ast::*;
use crate::parser::lexer::{Token, TokenKind};
use crate::parser::messages;
use crate::parser::parse::{ParseError, Parser};

/// Minimum binding power of a unary operand; only `^` binds tighter
const UNARY_PRECEDENCE: u8 = 10;

impl Parser {
    /// Parse an expression if one starts at the current token.
    pub(crate) fn parse_expression(&mut self) -> Result<Option<Expression>, ParseError> {
        self.parse_sub_expression(0)
    }

    pub(crate) fn parse_expected_expression(&mut self) -> Result<Expression, ParseError> {
        match self.parse_expression()? {
            Some(expression) => Ok(expression),
            None => Err(self.expected_token("<expression>")),
        }
    }

    pub(crate) fn parse_identifier(&mut self) -> Result<Identifier, ParseError> {
        let token = self.token();
        if !token.is_identifier() {
            return Err(self.expected_token("<name>"));
        }
        let ident = Identifier::new(token.value.clone(), token.bounds);
        self.next()?;
        Ok(ident)
    }

    /// Parse operators binding tighter than `min_precedence`.
    ///
    /// Every operator that extends a left-deep chain counts as one more
    /// syntax level, so the height of any built tree is bounded by
    /// [`ParseOptions::max_depth`](crate::parser::parse::ParseOptions).
    fn parse_sub_expression(
        &mut self,
        min_precedence: u8,
    ) -> Result<Option<Expression>, ParseError> {
        let depth = self.depth();
        let expression = self.enter().and_then(|()| self.parse_operators(min_precedence));
        self.leave_to(depth);
        expression
    }

    fn parse_operators(&mut self, min_precedence: u8) -> Result<Option<Expression>, ParseError> {
        let start = self.token().bounds.start;

        let mut expression = if let Some(operator) = unary_operator(self.token()) {
            self.next()?;
            let Some(argument) = self.parse_sub_expression(UNARY_PRECEDENCE)? else {
                return Err(self.expected_token("<expression>"));
            };
            Expression::Unary {
                operator,
                argument: Box::new(argument),
                loc: Bounds::new(start, self.previous().bounds.end),
            }
        } else if let Some(primary) = self.parse_primary_expression()? {
            primary
        } else if let Some(prefix) = self.parse_prefix_expression()? {
            prefix
        } else {
            return Ok(None);
        };

        let mut folded = false;
        loop {
            let token = self.token();
            let precedence = binary_precedence(token);
            if precedence <= min_precedence {
                break;
            }
            let operator = token.value.clone();
            let right_associative = BinaryOp::from_punctuator(&operator)
                .is_some_and(BinaryOp::is_right_associative);
            let right_precedence = if right_associative {
                precedence - 1
            } else {
                precedence
            };
            // the left-deep spine grows by one node per operator
            if folded {
                self.enter()?;
            }
            folded = true;
            self.next()?;

            let Some(right) = self.parse_sub_expression(right_precedence)? else {
                return Err(self.expected_token("<expression>"));
            };
            let loc = Bounds::new(start, self.previous().bounds.end);
            expression = match Expression::binary(&operator, expression, right, loc) {
                Some(binary) => binary,
                None => return Err(self.unexpected(self.previous())),
            };
        }

        Ok(Some(expression))
    }

    /// Literals, anonymous functions and table constructors.
    fn parse_primary_expression(&mut self) -> Result<Option<Expression>, ParseError> {
        let token = self.token();
        let loc = token.bounds;
        let literal = match &token.kind {
            TokenKind::StringLiteral(value) => Some(Expression::String {
                value: value.clone(),
                raw: token.value.clone(),
                loc,
            }),
            TokenKind::NumericLiteral(value) => Some(Expression::Number {
                value: *value,
                raw: token.value.clone(),
                loc,
            }),
            TokenKind::BooleanLiteral(value) => Some(Expression::Boolean { value: *value, loc }),
            TokenKind::NilLiteral => Some(Expression::Nil { loc }),
            TokenKind::VarargLiteral => {
                if !self.flow.allow_vararg {
                    let err = self.raise_at(loc, messages::CANNOT_USE_VARARG, &[&token.value]);
                    self.errors.push(err);
                }
                Some(Expression::Vararg { loc })
            }
            _ => None,
        };
        if let Some(literal) = literal {
            self.next()?;
            return Ok(Some(literal));
        }

        if self.token().is_keyword("function") {
            self.mark_location();
            self.next()?;
            let function = self.parse_function_body(None, false)?;
            return Ok(Some(Expression::Function(Box::new(function))));
        }

        if self.token().is_punctuator("{") {
            let table = self.parse_table_constructor()?;
            return Ok(Some(Expression::Table(table)));
        }

        Ok(None)
    }

    /// `name` or `( expr )` followed by any number of member, index and
    /// call parts.
    fn parse_prefix_expression(&mut self) -> Result<Option<Expression>, ParseError> {
        let depth = self.depth();
        let expression = self.enter().and_then(|()| self.parse_prefix_chain());
        self.leave_to(depth);
        expression
    }

    fn parse_prefix_chain(&mut self) -> Result<Option<Expression>, ParseError> {
        let start = self.token().bounds.start;

        let mut base = if self.token().is_identifier() {
            let ident = self.parse_identifier()?;
            Expression::Identifier(self.reference(ident))
        } else if self.token().is_punctuator("(") {
            let outer = self.open_bracket("(")?;
            let inner = self.parse_expected_expression()?;
            self.close_bracket(")", outer)?;
            inner
        } else {
            return Ok(None);
        };

        while starts_prefix_part(self.token()) {
            self.enter()?;
            base = self.parse_prefix_expression_part(base, start)?;
        }
        Ok(Some(base))
    }

    /// Extend `base` with one `[index]`, `.name`, `:name(args)` or call part.
    /// Spans run from `start`, the first token of the whole chain.
    pub(crate) fn parse_prefix_expression_part(
        &mut self,
        base: Expression,
        start: Position,
    ) -> Result<Expression, ParseError> {
        if self.token().is_punctuator("[") {
            let outer = self.open_bracket("[")?;
            let index = self.parse_expected_expression()?;
            self.close_bracket("]", outer)?;
            return Ok(Expression::Index {
                base: Box::new(base),
                index: Box::new(index),
                loc: Bounds::new(start, self.previous().bounds.end),
            });
        }
        if self.consume(".")? {
            let identifier = self.parse_identifier()?;
            let loc = Bounds::new(start, identifier.loc.end);
            return Ok(Expression::member(base, Indexer::Dot, identifier, loc));
        }
        if self.consume(":")? {
            let identifier = self.parse_identifier()?;
            let loc = Bounds::new(start, identifier.loc.end);
            let method = Expression::member(base, Indexer::Colon, identifier, loc);
            return self.parse_call_expression(method, start);
        }
        self.parse_call_expression(base, start)
    }

    fn parse_call_expression(
        &mut self,
        base: Expression,
        start: Position,
    ) -> Result<Expression, ParseError> {
        let base = Box::new(base);

        if self.token().is_punctuator("(") {
            let outer = self.open_bracket("(")?;
            let mut arguments = Vec::new();
            if let Some(first) = self.parse_expression()? {
                arguments.push(first);
                while self.consume(",")? {
                    arguments.push(self.parse_expected_expression()?);
                }
            }
            self.close_bracket(")", outer)?;
            return Ok(Expression::Call {
                base,
                arguments,
                loc: Bounds::new(start, self.previous().bounds.end),
            });
        }

        if self.token().is_punctuator("{") {
            let argument = self.parse_table_constructor()?;
            return Ok(Expression::TableCall {
                base,
                argument,
                loc: Bounds::new(start, self.previous().bounds.end),
            });
        }

        if matches!(self.token().kind, TokenKind::StringLiteral(_)) {
            if let Some(argument) = self.parse_primary_expression()? {
                return Ok(Expression::StringCall {
                    base,
                    argument: Box::new(argument),
                    loc: Bounds::new(start, self.previous().bounds.end),
                });
            }
        }

        Err(self.expected_token("function arguments"))
    }

    /// `{ [k] = v, name = v, v; ... }`
    pub(crate) fn parse_table_constructor(&mut self) -> Result<TableConstructor, ParseError> {
        self.mark_location();
        let outer = self.open_bracket("{")?;
        let mut fields = Vec::new();

        loop {
            self.mark_location();
            if self.consume("[")? {
                let key = self.parse_expected_expression()?;
                self.expect("]")?;
                self.expect("=")?;
                let value = self.parse_expected_expression()?;
                fields.push(TableField::Keyed {
                    key,
                    value,
                    loc: self.finish_node(),
                });
            } else if self.token().is_identifier() && self.lookahead().is_punctuator("=") {
                let key = self.parse_identifier()?;
                self.next()?; // =
                let value = self.parse_expected_expression()?;
                fields.push(TableField::Named {
                    key,
                    value,
                    loc: self.finish_node(),
                });
            } else if let Some(value) = self.parse_expression()? {
                fields.push(TableField::Positional {
                    value,
                    loc: self.finish_node(),
                });
            } else {
                self.markers.pop();
                break;
            }

            if !self.consume(",")? && !self.consume(";")? {
                break;
            }
        }

        self.close_bracket("}", outer)?;
        Ok(TableConstructor {
            fields,
            loc: self.finish_node(),
        })
    }

    /// Parameters and body of a function whose marker is already open.
    /// `identifier` is the declared name for function statements.
    pub(crate) fn parse_function_body(
        &mut self,
        identifier: Option<Expression>,
        is_local: bool,
    ) -> Result<FunctionDeclaration, ParseError> {
        let is_method = matches!(
            identifier,
            Some(Expression::Member {
                indexer: Indexer::Colon,
                ..
            })
        );

        // a body spanning lines is one syntactic unit
        let outer = self.lexer.newline_mode();
        self.set_newline_mode(false);
        self.push_flow(false);
        self.flow.push_scope(false);
        self.create_scope();
        if is_method {
            self.scope_identifier_name("self");
        }

        self.expect("(")?;
        let mut parameters = Vec::new();
        if !self.consume(")")? {
            loop {
                if self.token().is_identifier() {
                    let name = self.parse_identifier()?;
                    self.flow.add_local(&name.name);
                    parameters.push(Parameter::Name(self.declare(name)));
                    if self.consume(",")? {
                        continue;
                    }
                    self.expect(")")?;
                    break;
                }
                if matches!(self.token().kind, TokenKind::VarargLiteral) {
                    parameters.push(Parameter::Vararg(self.token().bounds));
                    self.flow.allow_vararg = true;
                    self.next()?;
                    self.expect(")")?;
                    break;
                }
                return Err(self.expected_token("<name>"));
            }
        }

        let body = self.parse_block();
        self.close_bracket("end", outer)?;
        self.destroy_scope();
        self.pop_flow_scope();
        self.pop_flow();

        Ok(FunctionDeclaration {
            identifier: identifier.map(Box::new),
            is_local,
            parameters,
            body,
            loc: self.finish_node(),
        })
    }
}

fn unary_operator(token: &Token) -> Option<UnaryOp> {
    match token.kind {
        TokenKind::Punctuator => UnaryOp::from_token(&token.value),
        TokenKind::Keyword if token.value == "not" => Some(UnaryOp::Not),
        _ => None,
    }
}

/// Binding power of `token` as a binary operator, 0 if it is not one.
fn binary_precedence(token: &Token) -> u8 {
    match token.kind {
        TokenKind::Punctuator => BinaryOp::from_punctuator(&token.value)
            .map(BinaryOp::precedence)
            .unwrap_or(0),
        TokenKind::Keyword => match token.value.as_str() {
            "and" => LogicalOp::And.precedence(),
            "or" => LogicalOp::Or.precedence(),
            _ => 0,
        },
        _ => 0,
    }
}

fn starts_prefix_part(token: &Token) -> bool {
    match token.kind {
        TokenKind::StringLiteral(_) => true,
        TokenKind::Punctuator => matches!(token.value.as_str(), "[" | "." | ":" | "(" | "{"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::parse::parse;

    /// Parse `x = <source>` and return the right-hand side.
    fn parse_expr(source: &str) -> Expression {
        let chunk = parse(&format!("x = {}", source));
        assert!(chunk.errors.is_empty(), "unexpected errors: {:?}", chunk.errors);
        match chunk.body.into_iter().next() {
            Some(Statement::Assignment { mut init, .. }) => init.remove(0),
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_parenthesized_power_precedence() {
        let expr = parse_expr("1 - (t + 2)^3");
        match expr {
            Expression::Binary {
                operator: BinaryOp::Sub,
                left,
                right,
                ..
            } => {
                assert!(matches!(*left, Expression::Number { value, .. } if value == 1.0));
                match *right {
                    Expression::Binary {
                        operator: BinaryOp::Pow,
                        left,
                        right,
                        ..
                    } => {
                        assert!(matches!(
                            *left,
                            Expression::Binary {
                                operator: BinaryOp::Add,
                                ..
                            }
                        ));
                        assert!(matches!(*right, Expression::Number { value, .. } if value == 3.0));
                    }
                    other => panic!("expected power, got {:?}", other),
                }
            }
            other => panic!("expected subtraction, got {:?}", other),
        }
    }

    #[test]
    fn test_unary_binds_looser_than_power() {
        let expr = parse_expr("-a^2");
        match expr {
            Expression::Unary {
                operator: UnaryOp::Neg,
                argument,
                ..
            } => assert!(matches!(*argument, Expression::Binary { operator: BinaryOp::Pow, .. })),
            other => panic!("expected negation, got {:?}", other),
        }

        let expr = parse_expr("not a == b");
        assert!(matches!(expr, Expression::Binary { operator: BinaryOp::Eq, .. }));
    }

    #[test]
    fn test_right_associative_concat() {
        match parse_expr("a .. b .. c") {
            Expression::Binary {
                operator: BinaryOp::Concat,
                left,
                right,
                ..
            } => {
                assert!(matches!(*left, Expression::Identifier(_)));
                assert!(matches!(*right, Expression::Binary { operator: BinaryOp::Concat, .. }));
            }
            other => panic!("expected concat, got {:?}", other),
        }
    }

    #[test]
    fn test_right_associative_power() {
        match parse_expr("2 ^ 3 ^ 2") {
            Expression::Binary {
                operator: BinaryOp::Pow,
                left,
                right,
                ..
            } => {
                assert!(matches!(*left, Expression::Number { .. }));
                assert!(matches!(
                    *right,
                    Expression::Binary {
                        operator: BinaryOp::Pow,
                        ..
                    }
                ));
            }
            other => panic!("expected power, got {:?}", other),
        }
    }

    #[test]
    fn test_left_associative_subtraction() {
        match parse_expr("a - b - c") {
            Expression::Binary { left, .. } => {
                assert!(matches!(*left, Expression::Binary { operator: BinaryOp::Sub, .. }));
            }
            other => panic!("expected subtraction, got {:?}", other),
        }
    }

    #[test]
    fn test_logical_operators() {
        match parse_expr("a and b or c") {
            Expression::Logical {
                operator: LogicalOp::Or,
                left,
                ..
            } => assert!(matches!(*left, Expression::Logical { operator: LogicalOp::And, .. })),
            other => panic!("expected or, got {:?}", other),
        }
    }

    #[test]
    fn test_pico8_operators() {
        match parse_expr("@0x5f00 + %a") {
            Expression::Binary { left, right, .. } => {
                assert!(matches!(*left, Expression::Unary { operator: UnaryOp::Peek, .. }));
                assert!(matches!(*right, Expression::Unary { operator: UnaryOp::Peek2, .. }));
            }
            other => panic!("expected addition, got {:?}", other),
        }
        assert!(matches!(parse_expr("a % b"), Expression::Binary { operator: BinaryOp::Mod, .. }));
        assert!(matches!(
            parse_expr("a \\ b"),
            Expression::Binary {
                operator: BinaryOp::IntDiv,
                ..
            }
        ));
        assert!(matches!(parse_expr("a != b"), Expression::Binary { operator: BinaryOp::Ne, .. }));
        assert!(matches!(
            parse_expr("a ^^ b"),
            Expression::Binary {
                operator: BinaryOp::BitXor,
                ..
            }
        ));
        assert!(matches!(parse_expr("$a"), Expression::Unary { operator: UnaryOp::Peek4, .. }));
    }

    #[test]
    fn test_prefix_chain_spans() {
        let expr = parse_expr("a.b[1]:c(2)");
        match &expr {
            Expression::Call { base, arguments, loc } => {
                assert_eq!(arguments.len(), 1);
                assert_eq!(loc.start.column, 5);
                assert_eq!(loc.end.column, 16);
                assert!(matches!(**base, Expression::Member { indexer: Indexer::Colon, .. }));
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_call_forms() {
        assert!(matches!(parse_expr("f{1, 2}"), Expression::TableCall { .. }));
        assert!(matches!(parse_expr("f'str'"), Expression::StringCall { .. }));
        assert!(matches!(parse_expr("f[[long]]"), Expression::StringCall { .. }));
    }

    #[test]
    fn test_table_constructor() {
        match parse_expr("{1, x = 2; [3] = 4, f()}") {
            Expression::Table(table) => {
                assert_eq!(table.fields.len(), 4);
                assert!(matches!(table.fields[0], TableField::Positional { .. }));
                assert!(matches!(table.fields[1], TableField::Named { .. }));
                assert!(matches!(table.fields[2], TableField::Keyed { .. }));
                assert!(table.fields.iter().all(|f| table.loc.encloses(f.loc())));
            }
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn test_table_named_field_versus_comparison() {
        match parse_expr("{a == b}") {
            Expression::Table(table) => {
                assert!(matches!(table.fields[0], TableField::Positional { .. }));
            }
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn test_anonymous_function() {
        match parse_expr("function(a, ...) return ... end") {
            Expression::Function(func) => {
                assert!(func.identifier.is_none());
                assert_eq!(func.parameters.len(), 2);
                assert!(matches!(func.parameters[1], Parameter::Vararg(_)));
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_vararg_outside_vararg_function() {
        let chunk = parse("function f() return ... end");
        assert_eq!(chunk.errors.len(), 1);
        assert_eq!(
            chunk.errors[0].message,
            "cannot use '...' outside a vararg function near '...'"
        );
        // the main chunk is a vararg function
        assert!(parse("local a = ...").errors.is_empty());
    }

    #[test]
    fn test_identifier_locality() {
        let chunk = parse("local a\nfunction f(p) return a, p, g end");
        let Statement::Function(func) = &chunk.body[1] else {
            panic!("expected function");
        };
        let Statement::Return { arguments, .. } = &func.body[0] else {
            panic!("expected return");
        };
        let locality: Vec<bool> = arguments
            .iter()
            .map(|arg| arg.as_identifier().map(|id| id.is_local).unwrap_or(false))
            .collect();
        assert_eq!(locality, vec![true, true, false]);
        assert_eq!(chunk.globals, vec!["f".to_string(), "g".to_string()]);
    }

    #[test]
    fn test_missing_operand() {
        let chunk = parse("x = 1 +");
        assert_eq!(chunk.errors[0].message, "<expression> expected near '<eof>'");
    }

    #[test]
    fn test_bad_call_arguments() {
        let chunk = parse("obj:method");
        assert_eq!(chunk.errors[0].message, "function arguments expected near '<eof>'");
    }
}
