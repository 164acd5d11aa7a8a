//! Multi-select state for columns and rows of a displayed window.
//!
//! The selection is a set of integer indices plus the index touched last.
//! It changes only through [`SelectionSet::transition`], driven by three
//! kinds of clicks, and is cleared whenever the displayed window changes.

use std::collections::BTreeSet;

/// Which modifier accompanied a click
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionInput {
    Plain,
    Ctrl,
    Shift,
}

/// Selected indices and the index touched last
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    members: BTreeSet<usize>,
    last_touched: Option<usize>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The state after one click; `self` is left untouched
    pub fn transition(&self, input: SelectionInput, index: usize) -> Self {
        let mut next = self.clone();
        next.apply(input, index);
        next
    }

    /// Apply one click in place
    pub fn apply(&mut self, input: SelectionInput, index: usize) {
        match (input, self.last_touched) {
            (SelectionInput::Plain, _) | (SelectionInput::Shift, None) => {
                let only_member = self.members.len() == 1 && self.members.contains(&index);
                self.members.clear();
                if !only_member {
                    self.members.insert(index);
                }
            }
            (SelectionInput::Ctrl, _) => {
                if !self.members.remove(&index) {
                    self.members.insert(index);
                }
            }
            (SelectionInput::Shift, Some(last)) => {
                let target = !self.members.contains(&index);
                if index != last {
                    // the end at `last` is excluded
                    let (low, high) = if index > last {
                        (last + 1, index)
                    } else {
                        (index, last - 1)
                    };
                    for i in low..=high {
                        if target {
                            self.members.insert(i);
                        } else {
                            self.members.remove(&i);
                        }
                    }
                }
            }
        }
        self.last_touched = Some(index);
    }

    pub fn contains(&self, index: usize) -> bool {
        self.members.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn last_touched(&self) -> Option<usize> {
        self.last_touched
    }

    /// Selected indices in increasing order
    pub fn members(&self) -> impl Iterator<Item = usize> + '_ {
        self.members.iter().copied()
    }

    pub fn add(&mut self, index: usize) {
        self.members.insert(index);
    }

    pub fn remove(&mut self, index: usize) {
        self.members.remove(&index);
    }

    pub fn clear(&mut self) {
        self.members.clear();
        self.last_touched = None;
    }
}

/// Column and row selections of one view
#[derive(Debug, Clone, Default)]
pub struct ViewSelection {
    /// Indices into the visible columns of the current order
    pub columns: SelectionSet,
    /// Indices into the rows of the current window
    pub rows: SelectionSet,
}

impl ViewSelection {
    /// Forget everything; indices from an old window are meaningless
    pub fn clear(&mut self) {
        self.columns.clear();
        self.rows.clear();
    }
}
