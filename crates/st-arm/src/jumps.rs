//! Label allocation and multi-level loop-exit resolution.
//!
//! Every construct needing branch targets draws a fresh number from one
//! monotonically increasing counter, so labels are unique across the whole
//! translation unit. Constructs listed in the external jump table share
//! their number with the leave-jumps targeting them; the number is fixed on
//! first touch by either side, making label assignment independent of the
//! order in which jump and loop are visited.

use st_core::ast::ElementId;
use st_core::jump::{JumpTable, ILLEGAL_JUMP};
use std::collections::HashMap;

/// Label emitted before the trailing `MOV PC, LR` when an upstream-detected
/// illegal leave needs a visible branch target.
pub const ERROR_MARKER_LABEL: &str = "leave_error";

#[derive(Debug, Default)]
pub struct JumpManager {
    next_label: u32,
    /// Jump-table index -> label number, write-once.
    end_labels: HashMap<i32, u32>,
    pub error_label_used: bool,
}

impl JumpManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh, never-reused label number.
    pub fn fresh_label(&mut self) -> u32 {
        let label = self.next_label;
        self.next_label += 1;
        label
    }

    /// The label number a construct with table index `index` must use for
    /// its end label. Allocated on first touch.
    pub fn end_label_for_index(&mut self, index: i32) -> u32 {
        if let Some(label) = self.end_labels.get(&index) {
            return *label;
        }
        let label = self.fresh_label();
        self.end_labels.insert(index, label);
        label
    }

    /// Label number for a loop/switch construct: its table slot if the jump
    /// table lists it, a private fresh number otherwise.
    pub fn construct_label(&mut self, id: ElementId, table: &JumpTable) -> u32 {
        match table.resolve(id) {
            Some(index) if index != ILLEGAL_JUMP => self.end_label_for_index(index),
            _ => self.fresh_label(),
        }
    }

    /// Branch target for a leave jump, or `None` for the illegal sentinel
    /// (the caller emits a branch to [`ERROR_MARKER_LABEL`] plus a
    /// diagnostic).
    pub fn leave_target(&mut self, id: ElementId, table: &JumpTable) -> Option<String> {
        match table.resolve(id) {
            Some(index) if index != ILLEGAL_JUMP => {
                Some(format!("end_{}", self.end_label_for_index(index)))
            }
            _ => {
                self.error_label_used = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_never_repeat() {
        let mut mgr = JumpManager::new();
        let a = mgr.fresh_label();
        let b = mgr.fresh_label();
        let c = mgr.end_label_for_index(0);
        assert!(a != b && b != c && a != c);
    }

    #[test]
    fn end_label_is_stable_regardless_of_touch_order() {
        let mut table = JumpTable::new();
        table.insert(ElementId(10), 3); // the loop
        table.insert(ElementId(20), 3); // a leave inside it
        let mut mgr = JumpManager::new();
        // The jump is lowered before its loop.
        let target = mgr.leave_target(ElementId(20), &table).unwrap();
        let loop_label = mgr.construct_label(ElementId(10), &table);
        assert_eq!(target, format!("end_{}", loop_label));
    }

    #[test]
    fn illegal_sentinel_yields_no_target() {
        let mut table = JumpTable::new();
        table.insert(ElementId(7), ILLEGAL_JUMP);
        let mut mgr = JumpManager::new();
        assert_eq!(mgr.leave_target(ElementId(7), &table), None);
        assert!(mgr.error_label_used);
    }
}
