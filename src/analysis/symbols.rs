//! Document outline
//!
//! [`SymbolFinder`] walks a chunk once and produces the hierarchical symbol
//! outline in source order:
//! - named functions carry their parameter list as detail, and anonymous
//!   functions bound to a name upgrade that name's symbol to a function
//! - plain assignments and local declarations create local or global
//!   variable symbols, once per name
//! - `a.b = ...` creates a symbol named `a.b`, nested under `a` when `a` is
//!   local and top level otherwise; `self` in methods stands for the
//!   receiver's name
//! - keys of a table constructor bound to a name become its children
//! - loop variables and labels are local leaves

use rustc_hash::FxHashMap;
use serde::Serialize;

use super::visitor::{
    binding_target, walk_chunk, walk_statement, NodeRef, ScopeNode, VisitContext, Visitor,
};
use crate::parser::ast::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SymbolKind {
    Function,
    LocalVariable,
    GlobalVariable,
    Label,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Symbol {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub kind: SymbolKind,
    /// The whole declaring construct
    pub full_span: Bounds,
    /// The name inside it
    pub selection_span: Bounds,
    pub children: Vec<Symbol>,
}

impl Symbol {
    pub fn new(
        name: impl Into<String>,
        kind: SymbolKind,
        full_span: Bounds,
        selection_span: Bounds,
    ) -> Self {
        Symbol {
            name: name.into(),
            detail: None,
            kind,
            full_span,
            selection_span,
            children: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct SymbolNode {
    symbol: Symbol,
    /// Dotted path with `.` separators, used to name nested members
    path: String,
    is_local: bool,
    children: Vec<usize>,
}

/// Outline state of one open scope
#[derive(Debug, Default)]
pub struct FinderScope {
    /// Symbol receiving new children; `None` is the top level
    owner: Option<usize>,
    names: FxHashMap<String, usize>,
    /// What `self` stands for
    self_name: Option<String>,
}

#[derive(Debug, Default)]
pub struct SymbolFinder {
    nodes: Vec<SymbolNode>,
    roots: Vec<usize>,
    /// Symbol of each binding target, keyed by the target's bounds
    targets: FxHashMap<Bounds, usize>,
    /// Symbol of the function statement about to open its scope
    pending_owner: Option<usize>,
}

impl SymbolFinder {
    pub fn find(body: &Block) -> Vec<Symbol> {
        let mut finder = SymbolFinder::default();
        walk_chunk(&mut finder, body);
        finder.roots.iter().map(|&id| finder.build(id)).collect()
    }

    fn build(&self, id: usize) -> Symbol {
        let node = &self.nodes[id];
        let mut symbol = node.symbol.clone();
        symbol.children = node.children.iter().map(|&child| self.build(child)).collect();
        symbol
    }

    fn add(
        &mut self,
        symbol: Symbol,
        path: String,
        is_local: bool,
        parent: Option<usize>,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(SymbolNode {
            symbol,
            path,
            is_local,
            children: Vec::new(),
        });
        match parent {
            Some(parent) => self.nodes[parent].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    fn owner(ctx: &VisitContext<'_, FinderScope>) -> Option<usize> {
        ctx.scope().and_then(|scope| scope.owner)
    }

    /// Innermost scope index and symbol declaring `name`.
    fn lookup(ctx: &VisitContext<'_, FinderScope>, name: &str) -> Option<(usize, usize)> {
        ctx.scopes()
            .iter()
            .enumerate()
            .rev()
            .find_map(|(depth, scope)| scope.names.get(name).map(|&id| (depth, id)))
    }

    fn register(
        ctx: &mut VisitContext<'_, FinderScope>,
        depth: Option<usize>,
        name: String,
        id: usize,
    ) {
        let scopes = ctx.scopes_mut();
        let depth = depth.unwrap_or(scopes.len().saturating_sub(1));
        if let Some(scope) = scopes.get_mut(depth) {
            scope.names.insert(name, id);
        }
    }

    /// Dotted `.` path of an identifier/member chain with `self` replaced
    /// by the receiver name.
    fn target_path(ctx: &VisitContext<'_, FinderScope>, expr: &Expression) -> Option<String> {
        let name = expr.dotted_name()?.replace(':', ".");
        let receiver = ctx.scope().and_then(|scope| scope.self_name.as_deref());
        if let (Some(rest), Some(receiver)) = (name.strip_prefix("self."), receiver) {
            return Some(format!("{}.{}", receiver, rest));
        }
        Some(name)
    }

    fn outline_variable(
        &mut self,
        var: &Expression,
        full_span: Bounds,
        ctx: &mut VisitContext<'_, FinderScope>,
    ) {
        let Some(path) = Self::target_path(ctx, var) else {
            return;
        };
        if let Some((_, id)) = Self::lookup(ctx, &path) {
            self.targets.insert(*var.loc(), id);
            return;
        }

        let id = match var {
            Expression::Identifier(ident) => {
                let kind = if ident.is_local {
                    SymbolKind::LocalVariable
                } else {
                    SymbolKind::GlobalVariable
                };
                let symbol = Symbol::new(path.clone(), kind, full_span, ident.loc);
                let id = self.add(symbol, path.clone(), ident.is_local, Self::owner(ctx));
                let depth = if ident.is_local { None } else { Some(0) };
                Self::register(ctx, depth, path, id);
                id
            }
            _ => self.outline_member(path, full_span, *var.loc(), ctx),
        };
        self.targets.insert(*var.loc(), id);
    }

    /// `a.b.c`: nested under `a` when `a` is a local symbol.
    fn outline_member(
        &mut self,
        path: String,
        full_span: Bounds,
        selection_span: Bounds,
        ctx: &mut VisitContext<'_, FinderScope>,
    ) -> usize {
        let root_name = path.split('.').next().unwrap_or_default();
        let root = Self::lookup(ctx, root_name).filter(|&(_, id)| self.nodes[id].is_local);

        let (depth, parent, kind) = match root {
            Some((depth, id)) => (Some(depth), Some(id), SymbolKind::LocalVariable),
            None => (Some(0), None, SymbolKind::GlobalVariable),
        };
        let symbol = Symbol::new(path.clone(), kind, full_span, selection_span);
        let id = self.add(symbol, path.clone(), root.is_some(), parent);
        Self::register(ctx, depth, path, id);
        id
    }

    fn outline_function(
        &mut self,
        func: &FunctionDeclaration,
        ctx: &mut VisitContext<'_, FinderScope>,
    ) -> Option<usize> {
        let identifier = func.identifier.as_deref()?;
        let display = identifier.dotted_name()?;
        let path = Self::target_path(ctx, identifier)?;

        let existing = if func.is_local {
            None
        } else {
            Self::lookup(ctx, &path)
        };
        let id = match existing {
            Some((_, id)) => id,
            None => match identifier {
                Expression::Identifier(ident) => {
                    let symbol = Symbol::new(display, SymbolKind::Function, func.loc, ident.loc);
                    let id = self.add(symbol, path.clone(), func.is_local, Self::owner(ctx));
                    let depth = if func.is_local { None } else { Some(0) };
                    Self::register(ctx, depth, path, id);
                    id
                }
                _ => {
                    let id = self.outline_member(path, func.loc, *identifier.loc(), ctx);
                    self.nodes[id].symbol.name = display;
                    id
                }
            },
        };

        let symbol = &mut self.nodes[id].symbol;
        symbol.kind = SymbolKind::Function;
        symbol.detail = Some(func.signature());
        Some(id)
    }

    fn outline_leaf(
        &mut self,
        ident: &Identifier,
        full_span: Bounds,
        ctx: &VisitContext<'_, FinderScope>,
    ) {
        let symbol = Symbol::new(
            ident.name.clone(),
            SymbolKind::LocalVariable,
            full_span,
            ident.loc,
        );
        self.add(symbol, ident.name.clone(), true, Self::owner(ctx));
    }

    /// Symbol of the target the current expression is bound to.
    fn bound_symbol(&self, ctx: &VisitContext<'_, FinderScope>) -> Option<usize> {
        let expr = match ctx.node()?.node {
            NodeRef::Expression(expr @ (Expression::Function(_) | Expression::Table(_))) => expr,
            _ => return None,
        };
        let loc = match binding_target(ctx, expr)? {
            NodeRef::Expression(target) => *target.loc(),
            NodeRef::Identifier(name) => name.loc,
            NodeRef::Field(field) => *field.loc(),
            NodeRef::Statement(_) | NodeRef::Clause(_) => return None,
        };
        self.targets.get(&loc).copied()
    }

    fn outline_fields(&mut self, table: &TableConstructor, owner: usize) {
        let is_local = self.nodes[owner].is_local;
        let kind = if is_local {
            SymbolKind::LocalVariable
        } else {
            SymbolKind::GlobalVariable
        };

        for field in &table.fields {
            let (key, key_loc) = match field {
                TableField::Named { key, .. } => (key.name.clone(), key.loc),
                TableField::Keyed { key, .. } => match string_key(key) {
                    Some(name) => (name, *key.loc()),
                    None => continue,
                },
                TableField::Positional { .. } => continue,
            };

            let mut symbol = Symbol::new(key.clone(), kind, *field.loc(), key_loc);
            if let Expression::Function(func) = field.value() {
                symbol.kind = SymbolKind::Function;
                symbol.detail = Some(func.signature());
            }
            let path = format!("{}.{}", self.nodes[owner].path, key);
            let id = self.add(symbol, path, is_local, Some(owner));
            self.targets.insert(*field.loc(), id);
        }
    }
}

/// Name of a `["key"]` field. Without a decoded value (discarding encoding)
/// the raw literal is used when it holds no escapes.
pub(crate) fn string_key(expr: &Expression) -> Option<String> {
    let Expression::String { value, raw, .. } = expr else {
        return None;
    };
    if let Some(value) = value {
        return Some(value.clone());
    }
    let quote = raw.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = raw.strip_prefix(quote)?.strip_suffix(quote)?;
    (!inner.contains('\\')).then(|| inner.to_string())
}

impl<'ast> Visitor<'ast> for SymbolFinder {
    type Scope = FinderScope;

    fn enter_scope(
        &mut self,
        node: ScopeNode<'ast>,
        ctx: &mut VisitContext<'ast, FinderScope>,
    ) -> FinderScope {
        let parent_owner = Self::owner(ctx);
        let parent_self = ctx.scope().and_then(|scope| scope.self_name.clone());

        match node {
            ScopeNode::Chunk(_) => FinderScope::default(),
            ScopeNode::Function(func) => {
                let named = self.pending_owner.take();
                let bound = if func.identifier.is_none() {
                    self.bound_symbol(ctx)
                } else {
                    None
                };
                if let Some(id) = bound {
                    let symbol = &mut self.nodes[id].symbol;
                    symbol.kind = SymbolKind::Function;
                    symbol.detail = Some(func.signature());
                }

                let receiver = match (named, bound) {
                    (Some(id), _) if func.is_method() => self.nodes[id].path.rsplit_once('.'),
                    (_, Some(id)) => self.nodes[id].path.rsplit_once('.'),
                    _ => None,
                };
                FinderScope {
                    owner: named.or(bound).or(parent_owner),
                    self_name: receiver.map(|(base, _)| base.to_string()).or(parent_self),
                    ..FinderScope::default()
                }
            }
            ScopeNode::Table(table) => {
                let bound = self.bound_symbol(ctx);
                if let Some(id) = bound {
                    self.outline_fields(table, id);
                }
                FinderScope {
                    owner: bound.or(parent_owner),
                    self_name: parent_self,
                    ..FinderScope::default()
                }
            }
            ScopeNode::Block(_) | ScopeNode::Clause(_) => FinderScope {
                owner: parent_owner,
                self_name: parent_self,
                ..FinderScope::default()
            },
        }
    }

    fn visit_statement(
        &mut self,
        stmt: &'ast Statement,
        ctx: &mut VisitContext<'ast, FinderScope>,
    ) {
        match stmt {
            Statement::Local { variables, loc, .. } => {
                for name in variables {
                    let symbol =
                        Symbol::new(name.name.clone(), SymbolKind::LocalVariable, *loc, name.loc);
                    let id = self.add(symbol, name.name.clone(), true, Self::owner(ctx));
                    Self::register(ctx, None, name.name.clone(), id);
                    self.targets.insert(name.loc, id);
                }
            }
            Statement::Assignment {
                variables,
                operator: AssignOp::Assign,
                loc,
                ..
            } => {
                for var in variables {
                    self.outline_variable(var, *loc, ctx);
                }
            }
            Statement::Function(func) => {
                self.pending_owner = self.outline_function(func, ctx);
            }
            Statement::ForNumeric { variable, loc, .. } => self.outline_leaf(variable, *loc, ctx),
            Statement::ForGeneric { variables, loc, .. } => {
                for variable in variables {
                    self.outline_leaf(variable, *loc, ctx);
                }
            }
            Statement::Label { label, loc } => self.outline_leaf(label, *loc, ctx),
            _ => {}
        }
        walk_statement(self, stmt, ctx);
    }
}
