//! Externally supplied mapping from loop/switch elements (and the leave
//! jumps that target them) to a shared integer index. A backend turns each
//! index into a concrete end-label the first time either side is lowered;
//! entries are write-once-then-read.

use crate::ast::ElementId;
use std::collections::HashMap;

/// Sentinel for a leave jump whose depth exceeds the available enclosing
/// loops, detected by the tree's own validation before code generation.
pub const ILLEGAL_JUMP: i32 = -1;

#[derive(Debug, Clone, Default)]
pub struct JumpTable {
    entries: HashMap<ElementId, i32>,
}

impl JumpTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the index for an element; the first write wins.
    pub fn insert(&mut self, id: ElementId, index: i32) {
        self.entries.entry(id).or_insert(index);
    }

    pub fn resolve(&self, id: ElementId) -> Option<i32> {
        self.entries.get(&id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_write_wins() {
        let mut table = JumpTable::new();
        table.insert(ElementId(4), 0);
        table.insert(ElementId(4), 7);
        assert_eq!(table.resolve(ElementId(4)), Some(0));
        assert_eq!(table.resolve(ElementId(5)), None);
    }
}
