//! View subscriber trait

use crate::order::RecordOrder;
use crate::selection::ViewSelection;
use crate::window::{FindResult, LogicalWindow};

/// What a renderer needs to draw one table view
#[derive(Debug, Clone, Default)]
pub struct ViewSnapshot {
    pub view_id: u64,
    pub order: RecordOrder,
    pub window: Option<LogicalWindow>,
    pub status: Option<String>,
    pub find_result: Option<FindResult>,
    pub selection: ViewSelection,
}

/// Trait for components that redraw when a view changes
pub trait ViewSubscriber: Send + Sync {
    /// Called after a window is installed or the status line changes
    fn on_view_change(&self, snapshot: &ViewSnapshot);
}
