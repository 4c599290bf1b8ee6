//! # Tree visitor
//!
//! Traversal is separated from analysis: the [`Visitor`] trait has one hook
//! per node family whose default implementation calls the matching `walk_*`
//! function, so an analysis pass overrides only what it cares about.
//!
//! Walk functions keep two stacks in a [`VisitContext`]:
//! - the scope stack, holding one caller-supplied [`Visitor::Scope`] value per
//!   open scope (chunk, function bodies, `do`/loop bodies, if clauses and
//!   table constructors)
//! - the node stack, the ancestor chain of the node being visited, each entry
//!   tagged with [`NodeFlags`]
//!
//! Both are pushed before recursing and popped right after, so a hook always
//! sees the stacks of its own position.
//!
//! Fixed visiting orders:
//! - assignment: `var[0], init[0], var[1], init[1], ...`, every `init[i]`
//!   visited with `var[i]` on the node stack as a binding target
//! - local declaration: initializers first, then the declared names
//! - function: name, then (inside the function scope) parameters and body
//! - numeric/generic `for`: range or iterators, then (inside the loop
//!   scope) the control variables and body

use bitflags::bitflags;

use crate::parser::ast::*;

bitflags! {
    /// Role of a node relative to its parent
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        /// Written by an assignment (`x` in `x = y`)
        const ASSIGNMENT_TARGET = 1 << 0;
        /// Target whose value is being visited below it
        const BINDING_TARGET = 1 << 1;
        /// Introduces a new local name
        const DECLARATION = 1 << 2;
        /// Function parameter; always paired with `DECLARATION`
        const PARAMETER = 1 << 3;
    }
}

/// A borrowed node on the node stack
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'ast> {
    Statement(&'ast Statement),
    Expression(&'ast Expression),
    Identifier(&'ast Identifier),
    Clause(&'ast IfClause),
    Field(&'ast TableField),
}

#[derive(Debug, Clone, Copy)]
pub struct Ancestor<'ast> {
    pub node: NodeRef<'ast>,
    pub flags: NodeFlags,
}

/// Node that opens a scope
#[derive(Debug, Clone, Copy)]
pub enum ScopeNode<'ast> {
    Chunk(&'ast [Statement]),
    Function(&'ast FunctionDeclaration),
    /// `do`, `while`, `repeat` and `for` bodies
    Block(&'ast Statement),
    Clause(&'ast IfClause),
    Table(&'ast TableConstructor),
}

impl ScopeNode<'_> {
    /// Span of the scope; the chunk has none since it covers every file.
    pub fn loc(&self) -> Option<Bounds> {
        match self {
            ScopeNode::Chunk(_) => None,
            ScopeNode::Function(func) => Some(func.loc),
            ScopeNode::Block(stmt) => Some(*stmt.loc()),
            ScopeNode::Clause(clause) => Some(clause.loc),
            ScopeNode::Table(table) => Some(table.loc),
        }
    }
}

/// Scope and node stacks of a traversal
#[derive(Debug)]
pub struct VisitContext<'ast, S> {
    scopes: Vec<S>,
    nodes: Vec<Ancestor<'ast>>,
}

impl<'ast, S> VisitContext<'ast, S> {
    pub fn new() -> Self {
        VisitContext {
            scopes: Vec::new(),
            nodes: Vec::new(),
        }
    }

    /// Innermost open scope
    pub fn scope(&self) -> Option<&S> {
        self.scopes.last()
    }

    pub fn scope_mut(&mut self) -> Option<&mut S> {
        self.scopes.last_mut()
    }

    /// Open scopes, outermost first
    pub fn scopes(&self) -> &[S] {
        &self.scopes
    }

    pub fn scopes_mut(&mut self) -> &mut [S] {
        &mut self.scopes
    }

    /// The node being visited
    pub fn node(&self) -> Option<&Ancestor<'ast>> {
        self.nodes.last()
    }

    pub fn parent(&self) -> Option<&Ancestor<'ast>> {
        self.nodes.len().checked_sub(2).and_then(|i| self.nodes.get(i))
    }

    /// Ancestor chain, outermost first, ending with the current node
    pub fn ancestors(&self) -> &[Ancestor<'ast>] {
        &self.nodes
    }

    pub fn flags(&self) -> NodeFlags {
        self.node().map(|a| a.flags).unwrap_or_default()
    }

    fn push_node(&mut self, node: NodeRef<'ast>, flags: NodeFlags) {
        self.nodes.push(Ancestor { node, flags });
    }

    fn pop_node(&mut self) {
        self.nodes.pop();
    }
}

impl<S> Default for VisitContext<'_, S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-node hooks of an analysis pass.
///
/// Scope values are produced by [`Visitor::enter_scope`] and handed back to
/// [`Visitor::leave_scope`] when the scope closes.
pub trait Visitor<'ast> {
    type Scope;

    fn enter_scope(
        &mut self,
        node: ScopeNode<'ast>,
        ctx: &mut VisitContext<'ast, Self::Scope>,
    ) -> Self::Scope;

    fn leave_scope(&mut self, _scope: Self::Scope, _ctx: &mut VisitContext<'ast, Self::Scope>) {}

    fn visit_block(&mut self, block: &'ast [Statement], ctx: &mut VisitContext<'ast, Self::Scope>) {
        walk_block(self, block, ctx);
    }

    fn visit_statement(
        &mut self,
        stmt: &'ast Statement,
        ctx: &mut VisitContext<'ast, Self::Scope>,
    ) {
        walk_statement(self, stmt, ctx);
    }

    fn visit_expression(
        &mut self,
        expr: &'ast Expression,
        ctx: &mut VisitContext<'ast, Self::Scope>,
    ) {
        walk_expression(self, expr, ctx);
    }

    fn visit_function(
        &mut self,
        func: &'ast FunctionDeclaration,
        ctx: &mut VisitContext<'ast, Self::Scope>,
    ) {
        walk_function(self, func, ctx);
    }

    fn visit_table(
        &mut self,
        table: &'ast TableConstructor,
        ctx: &mut VisitContext<'ast, Self::Scope>,
    ) {
        walk_table(self, table, ctx);
    }

    fn visit_table_field(
        &mut self,
        field: &'ast TableField,
        ctx: &mut VisitContext<'ast, Self::Scope>,
    ) {
        walk_table_field(self, field, ctx);
    }

    /// Names outside expressions: local names, parameters and loop variables.
    /// Identifier expressions reach this through [`walk_expression`].
    fn visit_identifier(
        &mut self,
        _ident: &'ast Identifier,
        _ctx: &mut VisitContext<'ast, Self::Scope>,
    ) {
    }

    /// `::name::` (definition) or `goto name`
    fn visit_label(
        &mut self,
        _label: &'ast Identifier,
        _is_definition: bool,
        _ctx: &mut VisitContext<'ast, Self::Scope>,
    ) {
    }
}

/// Traverse a whole chunk inside its root scope.
pub fn walk_chunk<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, body: &'ast [Statement]) {
    let mut ctx = VisitContext::new();
    with_scope(visitor, &mut ctx, ScopeNode::Chunk(body), |visitor, ctx| {
        visitor.visit_block(body, ctx)
    });
}

fn with_scope<'ast, V, F>(
    visitor: &mut V,
    ctx: &mut VisitContext<'ast, V::Scope>,
    node: ScopeNode<'ast>,
    body: F,
) where
    V: Visitor<'ast> + ?Sized,
    F: FnOnce(&mut V, &mut VisitContext<'ast, V::Scope>),
{
    let scope = visitor.enter_scope(node, ctx);
    ctx.scopes.push(scope);
    body(visitor, ctx);
    if let Some(scope) = ctx.scopes.pop() {
        visitor.leave_scope(scope, ctx);
    }
}

fn visit_expression_node<'ast, V: Visitor<'ast> + ?Sized>(
    visitor: &mut V,
    expr: &'ast Expression,
    flags: NodeFlags,
    ctx: &mut VisitContext<'ast, V::Scope>,
) {
    ctx.push_node(NodeRef::Expression(expr), flags);
    visitor.visit_expression(expr, ctx);
    ctx.pop_node();
}

fn visit_identifier_node<'ast, V: Visitor<'ast> + ?Sized>(
    visitor: &mut V,
    ident: &'ast Identifier,
    flags: NodeFlags,
    ctx: &mut VisitContext<'ast, V::Scope>,
) {
    ctx.push_node(NodeRef::Identifier(ident), flags);
    visitor.visit_identifier(ident, ctx);
    ctx.pop_node();
}

/// Visit `value` below `target`, which stays on the node stack as its
/// binding target without being visited itself.
fn visit_bound_value<'ast, V: Visitor<'ast> + ?Sized>(
    visitor: &mut V,
    target: NodeRef<'ast>,
    target_flags: NodeFlags,
    value: &'ast Expression,
    ctx: &mut VisitContext<'ast, V::Scope>,
) {
    ctx.push_node(target, target_flags | NodeFlags::BINDING_TARGET);
    visit_expression_node(visitor, value, NodeFlags::empty(), ctx);
    ctx.pop_node();
}

fn visit_expressions<'ast, V: Visitor<'ast> + ?Sized>(
    visitor: &mut V,
    exprs: &'ast [Expression],
    ctx: &mut VisitContext<'ast, V::Scope>,
) {
    for expr in exprs {
        visit_expression_node(visitor, expr, NodeFlags::empty(), ctx);
    }
}

pub fn walk_block<'ast, V: Visitor<'ast> + ?Sized>(
    visitor: &mut V,
    block: &'ast [Statement],
    ctx: &mut VisitContext<'ast, V::Scope>,
) {
    for stmt in block {
        ctx.push_node(NodeRef::Statement(stmt), NodeFlags::empty());
        visitor.visit_statement(stmt, ctx);
        ctx.pop_node();
    }
}

pub fn walk_statement<'ast, V: Visitor<'ast> + ?Sized>(
    visitor: &mut V,
    stmt: &'ast Statement,
    ctx: &mut VisitContext<'ast, V::Scope>,
) {
    match stmt {
        Statement::Assignment {
            variables, init, ..
        } => {
            for i in 0..variables.len().max(init.len()) {
                if let Some(var) = variables.get(i) {
                    visit_expression_node(visitor, var, NodeFlags::ASSIGNMENT_TARGET, ctx);
                }
                if let Some(value) = init.get(i) {
                    match variables.get(i) {
                        Some(var) => visit_bound_value(
                            visitor,
                            NodeRef::Expression(var),
                            NodeFlags::ASSIGNMENT_TARGET,
                            value,
                            ctx,
                        ),
                        None => visit_expression_node(visitor, value, NodeFlags::empty(), ctx),
                    }
                }
            }
        }
        Statement::Local {
            variables, init, ..
        } => {
            for (i, value) in init.iter().enumerate() {
                match variables.get(i) {
                    Some(name) => visit_bound_value(
                        visitor,
                        NodeRef::Identifier(name),
                        NodeFlags::DECLARATION,
                        value,
                        ctx,
                    ),
                    None => visit_expression_node(visitor, value, NodeFlags::empty(), ctx),
                }
            }
            for name in variables {
                visit_identifier_node(visitor, name, NodeFlags::DECLARATION, ctx);
            }
        }
        Statement::Call { expression, .. } => {
            visit_expression_node(visitor, expression, NodeFlags::empty(), ctx);
        }
        Statement::Do { body, .. } => {
            with_scope(visitor, ctx, ScopeNode::Block(stmt), |visitor, ctx| {
                visitor.visit_block(body, ctx)
            });
        }
        Statement::While {
            condition, body, ..
        } => {
            visit_expression_node(visitor, condition, NodeFlags::empty(), ctx);
            with_scope(visitor, ctx, ScopeNode::Block(stmt), |visitor, ctx| {
                visitor.visit_block(body, ctx)
            });
        }
        Statement::Repeat {
            body, condition, ..
        } => {
            // the condition sees the body's locals
            with_scope(visitor, ctx, ScopeNode::Block(stmt), |visitor, ctx| {
                visitor.visit_block(body, ctx);
                visit_expression_node(visitor, condition, NodeFlags::empty(), ctx);
            });
        }
        Statement::If { clauses, .. } => {
            for clause in clauses {
                ctx.push_node(NodeRef::Clause(clause), NodeFlags::empty());
                if let Some(condition) = &clause.condition {
                    visit_expression_node(visitor, condition, NodeFlags::empty(), ctx);
                }
                with_scope(visitor, ctx, ScopeNode::Clause(clause), |visitor, ctx| {
                    visitor.visit_block(&clause.body, ctx)
                });
                ctx.pop_node();
            }
        }
        Statement::ForNumeric {
            variable,
            start,
            end,
            step,
            body,
            ..
        } => {
            visit_expression_node(visitor, start, NodeFlags::empty(), ctx);
            visit_expression_node(visitor, end, NodeFlags::empty(), ctx);
            if let Some(step) = step {
                visit_expression_node(visitor, step, NodeFlags::empty(), ctx);
            }
            with_scope(visitor, ctx, ScopeNode::Block(stmt), |visitor, ctx| {
                visit_identifier_node(visitor, variable, NodeFlags::DECLARATION, ctx);
                visitor.visit_block(body, ctx);
            });
        }
        Statement::ForGeneric {
            variables,
            iterators,
            body,
            ..
        } => {
            visit_expressions(visitor, iterators, ctx);
            with_scope(visitor, ctx, ScopeNode::Block(stmt), |visitor, ctx| {
                for variable in variables {
                    visit_identifier_node(visitor, variable, NodeFlags::DECLARATION, ctx);
                }
                visitor.visit_block(body, ctx);
            });
        }
        Statement::Function(func) => visitor.visit_function(func, ctx),
        Statement::Return { arguments, .. } => visit_expressions(visitor, arguments, ctx),
        Statement::Goto { label, .. } => visitor.visit_label(label, false, ctx),
        Statement::Label { label, .. } => visitor.visit_label(label, true, ctx),
        Statement::Break { .. } | Statement::Include { .. } => {}
    }
}

/// Walk a function: its name first, then parameters and body inside the
/// function scope.
pub fn walk_function<'ast, V: Visitor<'ast> + ?Sized>(
    visitor: &mut V,
    func: &'ast FunctionDeclaration,
    ctx: &mut VisitContext<'ast, V::Scope>,
) {
    if let Some(name) = &func.identifier {
        let flags = if func.is_local {
            NodeFlags::DECLARATION
        } else {
            NodeFlags::ASSIGNMENT_TARGET
        };
        visit_expression_node(visitor, name, flags, ctx);
    }

    with_scope(visitor, ctx, ScopeNode::Function(func), |visitor, ctx| {
        for param in &func.parameters {
            if let Parameter::Name(ident) = param {
                let flags = NodeFlags::DECLARATION | NodeFlags::PARAMETER;
                visit_identifier_node(visitor, ident, flags, ctx);
            }
        }
        visitor.visit_block(&func.body, ctx);
    });
}

pub fn walk_expression<'ast, V: Visitor<'ast> + ?Sized>(
    visitor: &mut V,
    expr: &'ast Expression,
    ctx: &mut VisitContext<'ast, V::Scope>,
) {
    match expr {
        Expression::Identifier(ident) => visitor.visit_identifier(ident, ctx),
        Expression::String { .. }
        | Expression::Number { .. }
        | Expression::Boolean { .. }
        | Expression::Nil { .. }
        | Expression::Vararg { .. } => {}
        Expression::Binary { left, right, .. } | Expression::Logical { left, right, .. } => {
            visit_expression_node(visitor, left, NodeFlags::empty(), ctx);
            visit_expression_node(visitor, right, NodeFlags::empty(), ctx);
        }
        Expression::Unary { argument, .. } => {
            visit_expression_node(visitor, argument, NodeFlags::empty(), ctx);
        }
        Expression::Member { base, .. } => {
            visit_expression_node(visitor, base, NodeFlags::empty(), ctx);
        }
        Expression::Index { base, index, .. } => {
            visit_expression_node(visitor, base, NodeFlags::empty(), ctx);
            visit_expression_node(visitor, index, NodeFlags::empty(), ctx);
        }
        Expression::Call {
            base, arguments, ..
        } => {
            visit_expression_node(visitor, base, NodeFlags::empty(), ctx);
            visit_expressions(visitor, arguments, ctx);
        }
        Expression::TableCall { base, argument, .. } => {
            visit_expression_node(visitor, base, NodeFlags::empty(), ctx);
            visitor.visit_table(argument, ctx);
        }
        Expression::StringCall { base, argument, .. } => {
            visit_expression_node(visitor, base, NodeFlags::empty(), ctx);
            visit_expression_node(visitor, argument, NodeFlags::empty(), ctx);
        }
        Expression::Table(table) => visitor.visit_table(table, ctx),
        Expression::Function(func) => visitor.visit_function(func, ctx),
    }
}

pub fn walk_table<'ast, V: Visitor<'ast> + ?Sized>(
    visitor: &mut V,
    table: &'ast TableConstructor,
    ctx: &mut VisitContext<'ast, V::Scope>,
) {
    with_scope(visitor, ctx, ScopeNode::Table(table), |visitor, ctx| {
        for field in &table.fields {
            ctx.push_node(NodeRef::Field(field), NodeFlags::empty());
            visitor.visit_table_field(field, ctx);
            ctx.pop_node();
        }
    });
}

/// Walk a field; the field itself stays on the node stack as the binding
/// target of its value.
pub fn walk_table_field<'ast, V: Visitor<'ast> + ?Sized>(
    visitor: &mut V,
    field: &'ast TableField,
    ctx: &mut VisitContext<'ast, V::Scope>,
) {
    if let TableField::Keyed { key, .. } = field {
        visit_expression_node(visitor, key, NodeFlags::empty(), ctx);
    }
    visit_expression_node(visitor, field.value(), NodeFlags::empty(), ctx);
}

/// The target `expr` is bound to, if the node below `expr` on the stack is
/// an assignment target, a declared name or a table field holding it.
pub fn binding_target<'ast, S>(
    ctx: &VisitContext<'ast, S>,
    expr: &Expression,
) -> Option<NodeRef<'ast>> {
    let parent = ctx.parent()?;
    match parent.node {
        NodeRef::Field(field) if std::ptr::eq(field.value(), expr) => Some(parent.node),
        NodeRef::Field(_) => None,
        node if parent.flags.contains(NodeFlags::BINDING_TARGET) => Some(node),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse::parse;

    /// Records the order of visited names and the scope depth of each
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl<'ast> Visitor<'ast> for Recorder {
        type Scope = &'static str;

        fn enter_scope(
            &mut self,
            node: ScopeNode<'ast>,
            _ctx: &mut VisitContext<'ast, &'static str>,
        ) -> &'static str {
            match node {
                ScopeNode::Chunk(_) => "chunk",
                ScopeNode::Function(_) => "function",
                ScopeNode::Block(_) => "block",
                ScopeNode::Clause(_) => "clause",
                ScopeNode::Table(_) => "table",
            }
        }

        fn leave_scope(
            &mut self,
            scope: &'static str,
            _ctx: &mut VisitContext<'ast, &'static str>,
        ) {
            self.events.push(format!("leave {}", scope));
        }

        fn visit_identifier(
            &mut self,
            ident: &'ast Identifier,
            ctx: &mut VisitContext<'ast, &'static str>,
        ) {
            let mut tags = String::new();
            if ctx.flags().contains(NodeFlags::ASSIGNMENT_TARGET) {
                tags.push('=');
            }
            if ctx.flags().contains(NodeFlags::DECLARATION) {
                tags.push('+');
            }
            let bound = ctx
                .parent()
                .filter(|p| p.flags.contains(NodeFlags::BINDING_TARGET))
                .is_some();
            if bound {
                tags.push('<');
            }
            self.events.push(format!("{}{}@{}", ident.name, tags, ctx.scopes().len()));
        }
    }

    fn record(source: &str) -> Vec<String> {
        let chunk = parse(source);
        let mut recorder = Recorder::default();
        walk_chunk(&mut recorder, &chunk.body);
        recorder.events
    }

    #[test]
    fn test_assignment_order() {
        assert_eq!(
            record("a, b = c, d"),
            vec!["a=@1", "c<@1", "b=@1", "d<@1", "leave chunk"]
        );
    }

    #[test]
    fn test_local_visits_initializers_first() {
        assert_eq!(record("local x = y"), vec!["y<@1", "x+@1", "leave chunk"]);
    }

    #[test]
    fn test_function_scope() {
        assert_eq!(
            record("function f(p) return p end"),
            vec!["f=@1", "p+@2", "p@2", "leave function", "leave chunk"]
        );
    }

    #[test]
    fn test_loop_and_clause_scopes() {
        assert_eq!(
            record("for i = 1, n do end\nif c then t = {} end"),
            vec![
                "n@1",
                "i+@2",
                "leave block",
                "c@1",
                "t=@2",
                "leave table",
                "leave clause",
                "leave chunk",
            ]
        );
    }

    #[test]
    fn test_binding_target_of_table_field() {
        struct Bindings(Vec<bool>);

        impl<'ast> Visitor<'ast> for Bindings {
            type Scope = ();

            fn enter_scope(&mut self, _node: ScopeNode<'ast>, _ctx: &mut VisitContext<'ast, ()>) {}

            fn visit_expression(
                &mut self,
                expr: &'ast Expression,
                ctx: &mut VisitContext<'ast, ()>,
            ) {
                if matches!(expr, Expression::Function(_)) {
                    self.0.push(binding_target(ctx, expr).is_some());
                }
                walk_expression(self, expr, ctx);
            }
        }

        let chunk = parse("t = { f = function() end }\ncall(function() end)");
        let mut bindings = Bindings(Vec::new());
        walk_chunk(&mut bindings, &chunk.body);
        assert_eq!(bindings.0, vec![true, false]);
    }
}
