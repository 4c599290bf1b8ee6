//! Control-flow context for `break`, `goto` and labels
//!
//! One [`FlowContext`] exists per function body (the chunk counts as one).
//! It mirrors Lua's visibility rules:
//! - a `goto` resolves against labels already visible in enclosing scopes,
//!   otherwise it stays pending until a matching label appears at a depth it
//!   can reach, or until the function closes (`no visible label`)
//! - a goto that would jump forward over a `local` declaration is deferred
//!   and reported only if another statement follows the label in its scope
//! - `break` requires an enclosing loop scope

use super::ast::Bounds;
use super::messages::{self, format_message};
use super::parse::ParseError;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone)]
struct LabelInfo {
    line: usize,
}

#[derive(Debug, Clone)]
struct PendingGoto {
    target: String,
    bounds: Bounds,
    /// Deepest scope level the goto can still see
    max_depth: usize,
    /// Local count of every enclosing scope when the goto was seen
    local_counts: Vec<usize>,
}

/// Labels, locals and deferred gotos of one block
#[derive(Debug, Clone, Default)]
pub struct FlowScope {
    labels: FxHashMap<String, LabelInfo>,
    locals: Vec<String>,
    deferred_gotos: Vec<PendingGoto>,
    is_loop: bool,
}

#[derive(Debug, Clone)]
pub struct FlowContext {
    scopes: Vec<FlowScope>,
    pending_gotos: Vec<PendingGoto>,
    /// Whether `...` may be used in this function
    pub allow_vararg: bool,
}

impl FlowContext {
    pub fn new(allow_vararg: bool) -> Self {
        FlowContext {
            scopes: Vec::new(),
            pending_gotos: Vec::new(),
            allow_vararg,
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_in_loop(&self) -> bool {
        self.scopes.iter().rev().any(|scope| scope.is_loop)
    }

    pub fn push_scope(&mut self, is_loop: bool) {
        self.scopes.push(FlowScope {
            is_loop,
            ..FlowScope::default()
        });
    }

    /// Close the innermost scope. Pending gotos move out one level; those
    /// that fall off the function report `no visible label`.
    pub fn pop_scope(&mut self) -> Vec<ParseError> {
        let depth = self.scopes.len();
        let mut errors = Vec::new();

        self.pending_gotos.retain_mut(|pending| {
            if pending.max_depth < depth {
                return true;
            }
            pending.max_depth -= 1;
            if pending.max_depth == 0 {
                errors.push(ParseError::new(
                    format_message(messages::LABEL_NOT_VISIBLE, &[&pending.target]),
                    pending.bounds,
                ));
                return false;
            }
            true
        });

        self.scopes.pop();
        errors
    }

    /// Drop scopes above `depth` without reporting, after a statement was
    /// abandoned mid-way.
    pub fn truncate(&mut self, depth: usize) {
        self.scopes.truncate(depth);
        self.pending_gotos
            .iter_mut()
            .for_each(|pending| pending.max_depth = pending.max_depth.min(depth));
    }

    pub fn add_local(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.locals.push(name.to_string());
        }
    }

    pub fn add_goto(&mut self, target: &str, bounds: Bounds) {
        let mut local_counts = Vec::with_capacity(self.scopes.len());
        for scope in &self.scopes {
            local_counts.push(scope.locals.len());
            if scope.labels.contains_key(target) {
                return;
            }
        }
        self.pending_gotos.push(PendingGoto {
            target: target.to_string(),
            bounds,
            max_depth: self.scopes.len(),
            local_counts,
        });
    }

    /// Declare a label in the innermost scope, resolving pending gotos.
    pub fn add_label(&mut self, name: &str, bounds: Bounds) -> Option<ParseError> {
        let depth = self.scopes.len();
        let scope = self.scopes.last_mut()?;

        if let Some(existing) = scope.labels.get(name) {
            let line = existing.line.to_string();
            return Some(ParseError::new(
                format_message(messages::LABEL_ALREADY_DEFINED, &[name, &line]),
                bounds,
            ));
        }

        let locals_here = scope.locals.len();
        let mut still_pending = Vec::with_capacity(self.pending_gotos.len());
        for pending in self.pending_gotos.drain(..) {
            if pending.max_depth >= depth && pending.target == name {
                let seen = pending.local_counts.get(depth - 1).copied().unwrap_or(0);
                if seen < locals_here {
                    scope.deferred_gotos.push(pending);
                }
                continue;
            }
            still_pending.push(pending);
        }
        self.pending_gotos = still_pending;

        scope.labels.insert(
            name.to_string(),
            LabelInfo {
                line: bounds.start.line,
            },
        );
        None
    }

    /// Report gotos that jump into the scope of a local. Called when a
    /// statement follows a label, since a label at the end of its block
    /// keeps the jump legal.
    pub fn raise_deferred_errors(&mut self) -> Vec<ParseError> {
        let depth = self.scopes.len();
        let Some(scope) = self.scopes.last_mut() else {
            return Vec::new();
        };

        scope
            .deferred_gotos
            .drain(..)
            .map(|pending| {
                let seen = pending.local_counts.get(depth - 1).copied().unwrap_or(0);
                let local = scope.locals.get(seen).map(String::as_str).unwrap_or("?");
                ParseError::new(
                    format_message(messages::GOTO_JUMP_IN_LOCAL_SCOPE, &[&pending.target, local]),
                    pending.bounds,
                )
            })
            .collect()
    }
}
