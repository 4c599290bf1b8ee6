// Integration tests for the PICO-8 Lua parser

use p8lua::analysis::visitor::{
    walk_chunk, walk_expression, walk_statement, NodeFlags, NodeRef, ScopeNode, VisitContext,
    Visitor,
};
use p8lua::parser::ast::*;
use p8lua::parser::encoding::EncodingMode;
use p8lua::parser::lexer::Lexer;
use p8lua::parse;

const CART: &str = r#"
-- player
player = { x = 64, y = 64, spd = 1.5 }

function player:move(dx, dy)
  self.x += dx * self.spd
  self.y = mid(0, self.y + dy, 127)
end

local function wrap(v)
  return v % 128
end

function _update()
  if (btn(0)) player:move(-1, 0)
  for i = 1, #enemies do
    local e = enemies[i]
    e.t = (e.t or 0) + 1
    if e.t > 30 then
      del(enemies, e)
      break
    end
  end
  ?"score: "..score
end

function _draw()
  cls()
  spr(1, wrap(player.x), player.y)
end
"#;

fn node_loc(node: &NodeRef<'_>) -> Bounds {
    match node {
        NodeRef::Statement(stmt) => *stmt.loc(),
        NodeRef::Expression(expr) => *expr.loc(),
        NodeRef::Identifier(ident) => ident.loc,
        NodeRef::Clause(clause) => clause.loc,
        NodeRef::Field(field) => *field.loc(),
    }
}

/// Checks every node against the nearest ancestor that syntactically
/// contains it.
#[derive(Default)]
struct BoundsChecker {
    checked: usize,
    violations: Vec<String>,
}

impl BoundsChecker {
    fn check(&mut self, ctx: &VisitContext<'_, ()>) {
        let Some((current, ancestors)) = ctx.ancestors().split_last() else {
            return;
        };
        let loc = node_loc(&current.node);
        self.checked += 1;
        if loc.start.index > loc.end.index {
            self.violations.push(format!("inverted span {}", loc));
        }
        // binding targets sit above their values without containing them
        let parent = ancestors
            .iter()
            .rev()
            .find(|a| !a.flags.contains(NodeFlags::BINDING_TARGET));
        if let Some(parent) = parent {
            let outer = node_loc(&parent.node);
            if !outer.encloses(&loc) {
                self.violations.push(format!("{} escapes {}", loc, outer));
            }
        }
    }
}

impl<'ast> Visitor<'ast> for BoundsChecker {
    type Scope = ();

    fn enter_scope(&mut self, _node: ScopeNode<'ast>, _ctx: &mut VisitContext<'ast, ()>) {}

    fn visit_statement(&mut self, stmt: &'ast Statement, ctx: &mut VisitContext<'ast, ()>) {
        self.check(ctx);
        walk_statement(self, stmt, ctx);
    }

    fn visit_expression(&mut self, expr: &'ast Expression, ctx: &mut VisitContext<'ast, ()>) {
        self.check(ctx);
        walk_expression(self, expr, ctx);
    }

    fn visit_identifier(&mut self, _ident: &'ast Identifier, ctx: &mut VisitContext<'ast, ()>) {
        if !matches!(ctx.node().map(|a| a.node), Some(NodeRef::Expression(_))) {
            self.check(ctx);
        }
    }
}

#[test]
fn test_cartridge_parses_cleanly() {
    let chunk = parse(CART);
    assert!(chunk.errors.is_empty(), "Parse errors: {:?}", chunk.errors);
    assert_eq!(chunk.body.len(), 5);
    assert!(matches!(chunk.body[1], Statement::Function(ref f) if f.is_method()));
    assert!(matches!(chunk.body[2], Statement::Function(ref f) if f.is_local));
}

#[test]
fn test_relexing_is_deterministic() {
    for mode in [EncodingMode::Identity, EncodingMode::PrivateUse, EncodingMode::Discard] {
        let first = Lexer::new(CART, FileId::ROOT, mode).tokenize().expect("Lexing failed");
        let second = Lexer::new(CART, FileId::ROOT, mode).tokenize().expect("Lexing failed");
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }
}

#[test]
fn test_child_bounds_lie_inside_parents() {
    let chunk = parse(CART);
    for stmt in &chunk.body {
        assert!(chunk.loc.encloses(stmt.loc()), "{} escapes the chunk", stmt.loc());
    }

    let mut checker = BoundsChecker::default();
    walk_chunk(&mut checker, &chunk.body);
    assert!(checker.checked > 50);
    assert!(checker.violations.is_empty(), "{:#?}", checker.violations);
}

#[test]
fn test_precedence_with_parentheses() {
    let chunk = parse("a = 1 - (t + 2)^3");
    assert!(chunk.errors.is_empty());
    let Statement::Assignment { init, .. } = &chunk.body[0] else {
        panic!("expected assignment, got {:?}", chunk.body[0]);
    };
    let Expression::Binary {
        operator: BinaryOp::Sub,
        left,
        right,
        ..
    } = &init[0]
    else {
        panic!("expected subtraction at the root, got {:?}", init[0]);
    };
    assert!(matches!(**left, Expression::Number { value, .. } if value == 1.0));
    let Expression::Binary {
        operator: BinaryOp::Pow,
        left: base,
        right: exponent,
        ..
    } = &**right
    else {
        panic!("expected power on the right, got {:?}", right);
    };
    assert!(matches!(
        **base,
        Expression::Binary {
            operator: BinaryOp::Add,
            ..
        }
    ));
    assert!(matches!(**exponent, Expression::Number { value, .. } if value == 3.0));
}

#[test]
fn test_long_chains_are_bounded() {
    let source = format!("x = {}1\ny = a{}", "1+".repeat(150), ".b".repeat(150));
    let chunk = parse(&source);
    assert!(chunk.errors.is_empty(), "Parse errors: {:?}", chunk.errors);
    let mut checker = BoundsChecker::default();
    walk_chunk(&mut checker, &chunk.body);
    assert!(checker.checked > 300);
    assert!(checker.violations.is_empty(), "{:#?}", checker.violations);
    assert!(p8lua::parser::readable::readable(&chunk).is_ok());

    let source = format!("x = {}1\nprint(x)", "1+".repeat(200_000));
    let chunk = parse(&source);
    assert_eq!(chunk.errors.len(), 1);
    assert_eq!(chunk.errors[0].message, "chunk has too many syntax levels");
    assert_eq!(chunk.body.len(), 1);
}

#[test]
fn test_errors_do_not_stop_the_parse() {
    let source = "x = \nfunction f(\n  return 1\nend\ny = 2\nz = {1, 2";
    let chunk = parse(source);
    assert!(chunk.errors.len() >= 2, "{:?}", chunk.errors);
    let assigned: Vec<String> = chunk
        .body
        .iter()
        .filter_map(|stmt| match stmt {
            Statement::Assignment { variables, .. } => variables[0].dotted_name(),
            _ => None,
        })
        .collect();
    assert!(assigned.contains(&"y".to_string()), "{:?}", chunk.body);
}

#[test]
fn test_cartridge_framing_is_skipped() {
    let cart = "pico-8 cartridge // http://www.pico-8.com\nversion 41\n\
                __lua__\nx = 1\n__gfx__\n0000\n";
    let chunk = parse(cart);
    assert!(chunk.errors.is_empty(), "{:?}", chunk.errors);
    assert_eq!(chunk.body.len(), 1);
    assert_eq!(chunk.body[0].loc().start.line, 4);
}

#[test]
fn test_parses_are_independent() {
    let handles: Vec<_> = (0..4)
        .map(|i| std::thread::spawn(move || parse(&format!("v{} = undefined_{}", i, i))))
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let chunk = handle.join().expect("parser thread panicked");
        assert_eq!(chunk.warnings.len(), 1);
        assert_eq!(chunk.warnings[0].message, format!("undefined variable: undefined_{}", i));
    }
}
