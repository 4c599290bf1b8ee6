//! Location markers
//!
//! A [`Marker`] remembers where a construct started. The parser opens one at
//! the construct's first token and closes it once the construct is parsed,
//! taking the end of the last consumed token as the end of the span.

use super::ast::{Bounds, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub start: Position,
}

impl Marker {
    pub fn new(start: Position) -> Self {
        Marker { start }
    }

    pub fn finish(self, end: Position) -> Bounds {
        Bounds::new(self.start, end)
    }
}

/// Stack of open markers
#[derive(Debug, Default)]
pub struct MarkerStack {
    markers: Vec<Marker>,
}

impl MarkerStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, marker: Marker) {
        self.markers.push(marker);
    }

    /// Open a marker at `start`.
    pub fn mark(&mut self, start: Position) {
        self.push(Marker::new(start));
    }

    /// Push a copy of the innermost marker so a nested construct can share
    /// its start (an `if` and its first clause).
    pub fn reuse(&mut self) {
        if let Some(top) = self.markers.last().copied() {
            self.markers.push(top);
        }
    }

    /// Close the innermost marker at `end`. With nothing open the span
    /// collapses onto `end`.
    pub fn finish(&mut self, end: Position) -> Bounds {
        match self.markers.pop() {
            Some(marker) => marker.finish(end),
            None => Bounds::new(end, end),
        }
    }

    pub fn pop(&mut self) -> Option<Marker> {
        self.markers.pop()
    }

    pub fn depth(&self) -> usize {
        self.markers.len()
    }

    /// Drop markers opened after `depth`; used when a statement is abandoned.
    pub fn truncate(&mut self, depth: usize) {
        self.markers.truncate(depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::FileId;

    fn pos(column: usize) -> Position {
        Position::new(1, column, column - 1, FileId::ROOT)
    }

    #[test]
    fn test_nested_markers() {
        let mut stack = MarkerStack::new();
        stack.mark(pos(1));
        stack.mark(pos(5));
        let inner = stack.finish(pos(8));
        let outer = stack.finish(pos(10));
        assert_eq!(inner.start.column, 5);
        assert_eq!(inner.end.column, 8);
        assert!(outer.encloses(&inner));
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_reuse_shares_start() {
        let mut stack = MarkerStack::new();
        stack.mark(pos(3));
        stack.reuse();
        let clause = stack.finish(pos(6));
        let statement = stack.finish(pos(9));
        assert_eq!(clause.start, statement.start);
    }

    #[test]
    fn test_truncate_and_empty_finish() {
        let mut stack = MarkerStack::new();
        stack.mark(pos(1));
        stack.mark(pos(2));
        stack.truncate(0);
        let bounds = stack.finish(pos(4));
        assert!(bounds.is_empty());
    }
}
