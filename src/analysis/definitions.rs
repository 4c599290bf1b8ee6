//! Definitions and usages
//!
//! [`DefinitionsUsagesResolver`] makes one pass over a chunk and builds a
//! [`DefinitionsUsagesLookup`]: one [`DefinitionsUsages`] entry per logical
//! symbol (a variable, or a dotted member path such as `a.b.c`), a line
//! index for point lookups and the lexical scope tree.
//!
//! Names are resolved innermost scope first. References that resolve nowhere
//! are kept as early references and matched against the global scope once
//! the whole chunk has been seen, so a call may precede the global function
//! it calls. Unmatched plain names become `undefined variable` warnings;
//! unmatched member paths are admitted as new global symbols.
//!
//! Leaving a function or block scope reports its locals and parameters that
//! were never used after their declaration.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use super::builtins::is_builtin;
use super::symbols::string_key;
use super::visitor::{
    binding_target, walk_chunk, walk_expression, walk_table_field, NodeFlags, NodeRef, ScopeNode,
    VisitContext, Visitor,
};
use crate::parser::ast::*;
use crate::parser::messages::{self, format_message};
use crate::parser::parse::Warning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScopeId(pub usize);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EntryId(pub usize);

/// Every definition and usage of one logical symbol
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefinitionsUsages {
    pub symbol_name: String,
    /// Earliest declaration first
    pub definitions: Vec<Bounds>,
    pub usages: Vec<Bounds>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScopeKind {
    Global,
    Function,
    Block,
    /// A table constructor; names members but is not a lexical scope
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Declared {
    Local,
    Parameter,
}

/// Node of the lexical scope tree
#[derive(Debug, Clone)]
pub struct DefUsageScope {
    pub kind: ScopeKind,
    /// Display name, inherited by anonymous constructs
    pub name: Option<String>,
    /// `None` for the global scope, which contains every location
    pub loc: Option<Bounds>,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    symbols: FxHashMap<String, EntryId>,
    self_alias: Option<String>,
    /// Dotted name of the target a table scope is bound to
    table_name: Option<String>,
    declared: Vec<(EntryId, Declared, Bounds)>,
}

impl DefUsageScope {
    fn new(
        kind: ScopeKind,
        name: Option<String>,
        loc: Option<Bounds>,
        parent: Option<ScopeId>,
    ) -> Self {
        DefUsageScope {
            kind,
            name,
            loc,
            parent,
            children: Vec::new(),
            symbols: FxHashMap::default(),
            self_alias: None,
            table_name: None,
            declared: Vec::new(),
        }
    }

    pub fn symbol(&self, name: &str) -> Option<EntryId> {
        self.symbols.get(name).copied()
    }

    /// Symbols declared directly in this scope, sorted by name
    pub fn symbols(&self) -> Vec<(&str, EntryId)> {
        let mut symbols: Vec<(&str, EntryId)> = self
            .symbols
            .iter()
            .map(|(name, &id)| (name.as_str(), id))
            .collect();
        symbols.sort_by(|a, b| a.0.cmp(b.0));
        symbols
    }

    /// What `self` stands for inside this scope
    pub fn self_alias(&self) -> Option<&str> {
        self.self_alias.as_deref()
    }

    pub fn contains(&self, file: FileId, line: usize, column: usize) -> bool {
        self.loc.map_or(true, |loc| loc.contains(file, line, column))
    }
}

/// Read-only result of the resolver
#[derive(Debug, Clone, Default)]
pub struct DefinitionsUsagesLookup {
    entries: Vec<DefinitionsUsages>,
    lines: FxHashMap<(FileId, usize), Vec<(Bounds, EntryId)>>,
    scopes: Vec<DefUsageScope>,
}

impl DefinitionsUsagesLookup {
    /// Entry at a point of the root document.
    pub fn lookup(&self, line: usize, column: usize) -> Option<&DefinitionsUsages> {
        self.lookup_in(FileId::ROOT, line, column)
    }

    /// Entry of the narrowest occurrence containing the point, so a member
    /// path shadows its base at the same column.
    pub fn lookup_in(
        &self,
        file: FileId,
        line: usize,
        column: usize,
    ) -> Option<&DefinitionsUsages> {
        self.lines
            .get(&(file, line))?
            .iter()
            .filter(|(bounds, _)| bounds.contains(file, line, column))
            .min_by_key(|(bounds, _)| bounds.len())
            .and_then(|(_, id)| self.entries.get(id.0))
    }

    pub fn entry(&self, id: EntryId) -> Option<&DefinitionsUsages> {
        self.entries.get(id.0)
    }

    pub fn entries(&self) -> &[DefinitionsUsages] {
        &self.entries
    }

    pub fn scopes(&self) -> &[DefUsageScope] {
        &self.scopes
    }

    pub fn scope(&self, id: ScopeId) -> Option<&DefUsageScope> {
        self.scopes.get(id.0)
    }

    /// Innermost scope containing the point.
    pub fn scope_at(&self, file: FileId, line: usize, column: usize) -> ScopeId {
        let mut current = ScopeId::ROOT;
        while let Some(scope) = self.scopes.get(current.0) {
            let inner = scope.children.iter().copied().find(|child| {
                self.scopes
                    .get(child.0)
                    .is_some_and(|s| s.loc.is_some() && s.contains(file, line, column))
            });
            match inner {
                Some(child) => current = child,
                None => break,
            }
        }
        current
    }

    /// Symbols visible from `scope`, innermost first; shadowed names are
    /// left out.
    pub fn visible_symbols(&self, scope: ScopeId) -> Vec<(&str, &DefinitionsUsages)> {
        let mut seen = FxHashSet::default();
        let mut visible = Vec::new();
        let mut current = Some(scope);

        while let Some(id) = current {
            let Some(scope) = self.scopes.get(id.0) else {
                break;
            };
            for (name, entry) in scope.symbols() {
                if seen.insert(name) {
                    if let Some(entry) = self.entries.get(entry.0) {
                        visible.push((name, entry));
                    }
                }
            }
            current = scope.parent;
        }
        visible
    }
}

#[derive(Debug)]
struct EarlyRef {
    name: String,
    loc: Bounds,
    /// Scope a member path belongs to
    home: ScopeId,
    dotted: bool,
}

#[derive(Debug, Default)]
pub struct DefinitionsUsagesResolver {
    entries: Vec<DefinitionsUsages>,
    lines: FxHashMap<(FileId, usize), Vec<(Bounds, EntryId)>>,
    scopes: Vec<DefUsageScope>,
    early_refs: Vec<EarlyRef>,
    warnings: Vec<Warning>,
}

impl DefinitionsUsagesResolver {
    pub fn resolve(body: &Block) -> (DefinitionsUsagesLookup, Vec<Warning>) {
        let mut resolver = DefinitionsUsagesResolver::default();
        walk_chunk(&mut resolver, body);
        resolver.resolve_early_refs();

        let mut warnings = resolver.warnings;
        warnings.sort_by_key(|w| (w.bounds.start.file, w.bounds.start.index));
        tracing::debug!(
            symbols = resolver.entries.len(),
            scopes = resolver.scopes.len(),
            "definitions resolved"
        );

        let lookup = DefinitionsUsagesLookup {
            entries: resolver.entries,
            lines: resolver.lines,
            scopes: resolver.scopes,
        };
        (lookup, warnings)
    }

    // ===== Entries =====

    fn new_entry(&mut self, name: String) -> EntryId {
        let id = EntryId(self.entries.len());
        self.entries.push(DefinitionsUsages {
            symbol_name: name,
            definitions: Vec::new(),
            usages: Vec::new(),
        });
        id
    }

    fn index(&mut self, loc: Bounds, id: EntryId) {
        let slot = self.lines.entry((loc.file(), loc.start.line)).or_default();
        if !slot.contains(&(loc, id)) {
            slot.push((loc, id));
        }
    }

    fn add_usage(&mut self, id: EntryId, loc: Bounds) {
        self.entries[id.0].usages.push(loc);
        self.index(loc, id);
    }

    fn add_definition(&mut self, id: EntryId, loc: Bounds) {
        self.entries[id.0].definitions.push(loc);
        self.index(loc, id);
    }

    /// New symbol in `scope`; its first occurrence is both a definition and
    /// a usage.
    fn define(&mut self, scope: ScopeId, name: String, loc: Bounds) -> EntryId {
        let id = self.new_entry(name.clone());
        self.add_definition(id, loc);
        self.add_usage(id, loc);
        self.scopes[scope.0].symbols.insert(name, id);
        id
    }

    fn declare(&mut self, ident: &Identifier, declared: Declared, ctx: &VisitContext<'_, ScopeId>) {
        let Some(&scope) = ctx.scope() else {
            return;
        };
        let id = self.define(scope, ident.name.clone(), ident.loc);
        self.scopes[scope.0].declared.push((id, declared, ident.loc));
    }

    // ===== Name resolution =====

    /// Innermost open scope declaring `name`.
    fn find(&self, name: &str, ctx: &VisitContext<'_, ScopeId>) -> Option<(ScopeId, EntryId)> {
        ctx.scopes()
            .iter()
            .rev()
            .find_map(|&scope| self.scopes[scope.0].symbol(name).map(|id| (scope, id)))
    }

    /// What `self` stands for: the nearest scope with an alias or a symbol
    /// named `self` decides, the alias first.
    fn self_alias(&self, ctx: &VisitContext<'_, ScopeId>) -> Option<String> {
        for &scope in ctx.scopes().iter().rev() {
            let scope = &self.scopes[scope.0];
            if let Some(alias) = &scope.self_alias {
                return Some(alias.clone());
            }
            if scope.symbols.contains_key("self") {
                return None;
            }
        }
        None
    }

    /// Cumulative names of an identifier/member chain (`a`, `a.b`, `a.b.c`)
    /// with the span ending at each part.
    fn chain(
        &self,
        expr: &Expression,
        ctx: &VisitContext<'_, ScopeId>,
    ) -> Option<Vec<(String, Bounds)>> {
        let segments = chain_segments(expr)?;
        let alias = match segments.first() {
            Some((root, _)) if *root == "self" => self.self_alias(ctx),
            _ => None,
        };

        let mut names: Vec<(String, Bounds)> = Vec::with_capacity(segments.len());
        for (segment, loc) in segments {
            let name = match names.last() {
                Some((prefix, _)) => format!("{}.{}", prefix, segment),
                None => alias.clone().unwrap_or_else(|| segment.to_string()),
            };
            names.push((name, loc));
        }
        Some(names)
    }

    fn chain_name(&self, expr: &Expression, ctx: &VisitContext<'_, ScopeId>) -> Option<String> {
        self.chain(expr, ctx)?.pop().map(|(name, _)| name)
    }

    /// Record every part of a chain. Returns `false` if `expr` is not one.
    fn resolve_chain(
        &mut self,
        expr: &Expression,
        is_target: bool,
        ctx: &VisitContext<'_, ScopeId>,
    ) -> bool {
        let Some(names) = self.chain(expr, ctx) else {
            return false;
        };
        let last = names.len().saturating_sub(1);
        let mut home = ScopeId::ROOT;

        for (i, (name, loc)) in names.into_iter().enumerate() {
            let writes = is_target && i == last;
            match self.find(&name, ctx) {
                Some((scope, id)) => {
                    if i == 0 {
                        home = scope;
                    }
                    self.add_usage(id, loc);
                    // locals are assigned, globals and members redefined
                    if writes && (i > 0 || self.scopes[scope.0].kind == ScopeKind::Global) {
                        self.add_definition(id, loc);
                    }
                }
                None if writes => {
                    self.define(home, name, loc);
                }
                None => {
                    let dotted = i > 0 || name.contains('.');
                    self.early_refs.push(EarlyRef {
                        name,
                        loc,
                        home,
                        dotted,
                    });
                }
            }
        }
        true
    }

    /// Dotted name of the target the current function or table expression
    /// is bound to.
    fn binding_name(&self, ctx: &VisitContext<'_, ScopeId>) -> Option<String> {
        let NodeRef::Expression(expr) = ctx.node()?.node else {
            return None;
        };
        if !matches!(expr, Expression::Function(_) | Expression::Table(_)) {
            return None;
        }
        match binding_target(ctx, expr)? {
            NodeRef::Expression(target) => self.chain_name(target, ctx),
            NodeRef::Identifier(name) => Some(name.name.clone()),
            NodeRef::Field(field) => {
                let table = self.current_table(ctx)?;
                Some(format!("{}.{}", table, field_key(field)?.0))
            }
            NodeRef::Statement(_) | NodeRef::Clause(_) => None,
        }
    }

    fn current_table(&self, ctx: &VisitContext<'_, ScopeId>) -> Option<String> {
        let scope = ctx.scope()?;
        self.scopes[scope.0].table_name.clone()
    }

    fn open_scope(&mut self, scope: DefUsageScope) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        if let Some(parent) = scope.parent {
            self.scopes[parent.0].children.push(id);
        }
        self.scopes.push(scope);
        id
    }

    /// `name` in `scope`, skipping locals: a reference recorded before a
    /// local declaration cannot see it and names a global instead.
    fn earlier_visible(&self, scope: ScopeId, name: &str) -> Option<EntryId> {
        let scope = &self.scopes[scope.0];
        let id = scope.symbol(name)?;
        let is_local = scope.declared.iter().any(|&(local, _, _)| local == id);
        (!is_local).then_some(id)
    }

    fn resolve_early_refs(&mut self) {
        for early in std::mem::take(&mut self.early_refs) {
            let found = self
                .earlier_visible(early.home, &early.name)
                .or_else(|| self.earlier_visible(ScopeId::ROOT, &early.name));

            match found {
                Some(id) => {
                    tracing::trace!(
                        name = %early.name,
                        line = early.loc.start.line,
                        "resolved early reference"
                    );
                    self.add_usage(id, early.loc);
                }
                None if early.dotted => {
                    self.define(early.home, early.name, early.loc);
                }
                None if is_builtin(&early.name) => {
                    let id = self.new_entry(early.name.clone());
                    self.add_usage(id, early.loc);
                    self.scopes[ScopeId::ROOT.0].symbols.insert(early.name, id);
                }
                None => {
                    let message =
                        format_message(messages::UNDEFINED_VARIABLE, &[early.name.as_str()]);
                    self.warnings.push(Warning::new(message, early.loc));
                }
            }
        }
    }
}

impl<'ast> Visitor<'ast> for DefinitionsUsagesResolver {
    type Scope = ScopeId;

    fn enter_scope(
        &mut self,
        node: ScopeNode<'ast>,
        ctx: &mut VisitContext<'ast, ScopeId>,
    ) -> ScopeId {
        let parent = ctx.scope().copied();
        let inherited = parent.and_then(|p| self.scopes[p.0].name.clone());
        let loc = node.loc();

        match node {
            ScopeNode::Chunk(_) => {
                self.open_scope(DefUsageScope::new(ScopeKind::Global, None, None, None))
            }
            ScopeNode::Function(func) => {
                let own = func
                    .identifier
                    .as_deref()
                    .and_then(|identifier| self.chain_name(identifier, ctx));
                let bound = if func.identifier.is_none() {
                    self.binding_name(ctx)
                } else {
                    None
                };
                let receiver = if func.is_method() {
                    own.as_deref()
                } else {
                    bound.as_deref()
                };

                let mut scope = DefUsageScope::new(ScopeKind::Function, None, loc, parent);
                scope.self_alias = receiver
                    .and_then(|name| name.rsplit_once('.'))
                    .map(|(base, _)| base.to_string());
                scope.name = own.or(bound).or(inherited);
                self.open_scope(scope)
            }
            ScopeNode::Table(_) => {
                let bound = self.binding_name(ctx);
                let name = bound.clone().or(inherited);
                let mut scope = DefUsageScope::new(ScopeKind::Table, name, loc, parent);
                scope.table_name = bound;
                self.open_scope(scope)
            }
            ScopeNode::Block(_) | ScopeNode::Clause(_) => {
                self.open_scope(DefUsageScope::new(ScopeKind::Block, inherited, loc, parent))
            }
        }
    }

    fn leave_scope(&mut self, scope: ScopeId, _ctx: &mut VisitContext<'ast, ScopeId>) {
        if matches!(self.scopes[scope.0].kind, ScopeKind::Global | ScopeKind::Table) {
            return;
        }

        for (id, declared, loc) in std::mem::take(&mut self.scopes[scope.0].declared) {
            let entry = &self.entries[id.0];
            let name = entry.symbol_name.as_str();
            if entry.usages.len() > 1 || name.starts_with('_') || name == "self" {
                continue;
            }
            let template = match declared {
                Declared::Local => messages::UNUSED_LOCAL,
                Declared::Parameter => messages::UNUSED_PARAMETER,
            };
            let message = format_message(template, &[name]);
            self.warnings.push(Warning::new(message, loc));
        }
    }

    fn visit_expression(&mut self, expr: &'ast Expression, ctx: &mut VisitContext<'ast, ScopeId>) {
        let flags = ctx.flags();
        match expr {
            Expression::Identifier(ident) if flags.contains(NodeFlags::DECLARATION) => {
                self.declare(ident, Declared::Local, ctx);
            }
            Expression::Identifier(_) | Expression::Member { .. } => {
                let is_target = flags.contains(NodeFlags::ASSIGNMENT_TARGET);
                if !self.resolve_chain(expr, is_target, ctx) {
                    walk_expression(self, expr, ctx);
                }
            }
            _ => walk_expression(self, expr, ctx),
        }
    }

    fn visit_identifier(&mut self, ident: &'ast Identifier, ctx: &mut VisitContext<'ast, ScopeId>) {
        let flags = ctx.flags();
        if flags.contains(NodeFlags::PARAMETER) {
            self.declare(ident, Declared::Parameter, ctx);
        } else if flags.contains(NodeFlags::DECLARATION) {
            self.declare(ident, Declared::Local, ctx);
        }
    }

    /// Fields of a bound table define `table.key`.
    fn visit_table_field(
        &mut self,
        field: &'ast TableField,
        ctx: &mut VisitContext<'ast, ScopeId>,
    ) {
        if let (Some(table), Some((key, key_loc))) = (self.current_table(ctx), field_key(field)) {
            let name = format!("{}.{}", table, key);
            match self.find(&name, ctx) {
                Some((_, id)) => {
                    self.add_usage(id, key_loc);
                    self.add_definition(id, key_loc);
                }
                None => {
                    let root = table.split('.').next().unwrap_or_default();
                    let home = self.find(root, ctx).map_or(ScopeId::ROOT, |(scope, _)| scope);
                    self.define(home, name, key_loc);
                }
            }
        }
        walk_table_field(self, field, ctx);
    }
}

/// Names of an identifier/member chain with the span ending at each part,
/// or `None` if anything but names and member accesses appears.
fn chain_segments(expr: &Expression) -> Option<Vec<(&str, Bounds)>> {
    match expr {
        Expression::Identifier(ident) => Some(vec![(ident.name.as_str(), ident.loc)]),
        Expression::Member {
            base,
            identifier,
            loc,
            ..
        } => {
            let mut segments = chain_segments(base)?;
            segments.push((identifier.name.as_str(), *loc));
            Some(segments)
        }
        _ => None,
    }
}

fn field_key(field: &TableField) -> Option<(String, Bounds)> {
    match field {
        TableField::Named { key, .. } => Some((key.name.clone(), key.loc)),
        TableField::Keyed { key, .. } => string_key(key).map(|name| (name, *key.loc())),
        TableField::Positional { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse::parse;

    fn warnings(source: &str) -> Vec<String> {
        let chunk = parse(source);
        assert!(chunk.errors.is_empty(), "unexpected errors: {:?}", chunk.errors);
        chunk.warnings.into_iter().map(|w| w.message).collect()
    }

    #[test]
    fn test_forward_reference() {
        let chunk = parse("do_the_thing()\nfunction do_the_thing() end");
        assert!(chunk.warnings.is_empty(), "{:?}", chunk.warnings);
        let entry = chunk.definitions_usages.lookup(1, 3).unwrap();
        assert_eq!(entry.symbol_name, "do_the_thing");
        assert_eq!(entry.definitions.len(), 1);
        assert_eq!(entry.definitions[0].start.line, 2);
        let lines: Vec<usize> = entry.usages.iter().map(|u| u.start.line).collect();
        assert_eq!(lines, vec![2, 1]);
    }

    #[test]
    fn test_reference_before_local_is_global() {
        let chunk = parse("print(x)\nlocal x = 1\nprint(x)");
        let messages: Vec<&str> = chunk.warnings.iter().map(|w| w.message.as_str()).collect();
        assert_eq!(messages, vec!["undefined variable: x"]);
        assert_eq!(chunk.warnings[0].bounds.start.line, 1);

        let local = chunk.definitions_usages.lookup(2, 7).unwrap();
        let lines: Vec<usize> = local.usages.iter().map(|u| u.start.line).collect();
        assert_eq!(lines, vec![2, 3]);
        assert!(chunk.definitions_usages.lookup(1, 7).is_none());

        // same inside a function body that runs before the declaration
        assert_eq!(
            warnings("function f() return g() end\nlocal function g() end\nf()"),
            vec!["undefined variable: g"]
        );
    }

    #[test]
    fn test_undefined_variable() {
        let chunk = parse("a = b");
        assert!(chunk.errors.is_empty());
        assert_eq!(chunk.warnings.len(), 1);
        assert_eq!(chunk.warnings[0].message, "undefined variable: b");
        assert_eq!(chunk.warnings[0].bounds.start.column, 5);
    }

    #[test]
    fn test_builtins_are_defined() {
        assert!(warnings("cls()\nspr(1, x0, 0)\nx0 = 1").is_empty());
        let chunk = parse("print(1)");
        assert_eq!(chunk.definitions_usages.lookup(1, 2).unwrap().symbol_name, "print");
    }

    #[test]
    fn test_dotted_chain() {
        let chunk = parse("a = {}\na.b = {}\na.b.c = {}");
        assert!(chunk.warnings.is_empty(), "{:?}", chunk.warnings);
        let lookup = &chunk.definitions_usages;
        assert_eq!(lookup.lookup(3, 5).unwrap().symbol_name, "a.b.c");
        assert_eq!(lookup.lookup(3, 3).unwrap().symbol_name, "a.b");
        assert_eq!(lookup.lookup(3, 1).unwrap().symbol_name, "a");

        let a = lookup.lookup(1, 1).unwrap();
        assert_eq!(a.usages.len(), 3);
        let ab = lookup.lookup(2, 3).unwrap();
        assert_eq!(ab.definitions.len(), 1);
        assert_eq!(ab.usages.len(), 2);
    }

    #[test]
    fn test_unknown_member_is_admitted() {
        let chunk = parse("t = {}\nprint(t.missing)");
        assert!(chunk.warnings.is_empty(), "{:?}", chunk.warnings);
        assert_eq!(chunk.definitions_usages.lookup(2, 9).unwrap().symbol_name, "t.missing");
    }

    #[test]
    fn test_shadowing() {
        let chunk = parse("x = 1\nfunction f()\n  local x = 2\n  return x\nend\nprint(x)");
        let lookup = &chunk.definitions_usages;
        let inner = lookup.lookup(4, 10).unwrap();
        assert_eq!(inner.definitions[0].start.line, 3);
        let outer = lookup.lookup(6, 7).unwrap();
        assert_eq!(outer.definitions[0].start.line, 1);
        assert!(!std::ptr::eq(inner, outer));
    }

    #[test]
    fn test_method_self_alias() {
        let chunk = parse("obj = {}\nfunction obj:setup()\n  self.hp = 1\nend\nprint(obj.hp)");
        assert!(chunk.warnings.is_empty(), "{:?}", chunk.warnings);
        let lookup = &chunk.definitions_usages;
        let hp = lookup.lookup(3, 8).unwrap();
        assert_eq!(hp.symbol_name, "obj.hp");
        assert_eq!(hp.usages.len(), 2);
        assert_eq!(lookup.lookup(3, 3).unwrap().symbol_name, "obj");
    }

    #[test]
    fn test_table_fields_and_bound_methods() {
        let source = "p = {\n  x = 1,\n  move = function(self) self.x += 1 end\n}\np.move(p)";
        let chunk = parse(source);
        assert!(chunk.warnings.is_empty(), "{:?}", chunk.warnings);
        let lookup = &chunk.definitions_usages;
        let x = lookup.lookup(2, 3).unwrap();
        assert_eq!(x.symbol_name, "p.x");
        assert_eq!(x.usages.len(), 2);
        assert_eq!(lookup.lookup(5, 3).unwrap().symbol_name, "p.move");
    }

    #[test]
    fn test_unused_locals_and_parameters() {
        assert_eq!(
            warnings("function f(a, b)\n  local c = a\n  local _d = 1\nend"),
            vec!["unused function parameter: b", "unused local variable: c"]
        );
        assert!(warnings("local top = 1").is_empty());
        assert!(warnings("for _, v in pairs({}) do print(v) end").is_empty());
    }

    #[test]
    fn test_repeat_condition_uses_body_local() {
        assert!(warnings("repeat local done = true until done").is_empty());
    }

    #[test]
    fn test_scope_tree() {
        let chunk = parse("function f()\n  if x then\n    y = 1\n  end\nend\nx = 0");
        let lookup = &chunk.definitions_usages;
        let scope = lookup.scope_at(FileId::ROOT, 3, 5);
        let clause = lookup.scope(scope).unwrap();
        assert_eq!(clause.kind, ScopeKind::Block);
        assert_eq!(clause.name.as_deref(), Some("f"));
        let function = lookup.scope(clause.parent.unwrap()).unwrap();
        assert_eq!(function.kind, ScopeKind::Function);
        assert_eq!(lookup.scope_at(FileId::ROOT, 6, 1), ScopeId::ROOT);
    }

    #[test]
    fn test_visible_symbols() {
        let chunk = parse("g = 1\nfunction f(p)\n  local q = p\n  return q\nend");
        let lookup = &chunk.definitions_usages;
        let scope = lookup.scope_at(FileId::ROOT, 4, 3);
        let names: Vec<&str> = lookup.visible_symbols(scope).iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["p", "q", "f", "g"]);
    }

    #[test]
    fn test_lookup_is_idempotent() {
        let chunk = parse("local a = 1\nprint(a)");
        let lookup = &chunk.definitions_usages;
        let first = lookup.lookup(2, 7);
        let second = lookup.lookup(2, 7);
        assert!(first.is_some());
        assert_eq!(first, second);
    }
}
