//! Cancellable operations and chaining.
//!
//! Cancellation is cooperative: it only stops local consumption of replies,
//! the remote side keeps computing until it finishes. Operations form a tree.
//! A child keeps a weak reference to its parent for lookup, a parent keeps
//! weak references to its children so cancellation can be pushed down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(0);

/// Lifecycle of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Running,
    Completed,
    Failed,
    Cancelled,
}

struct OperationInner {
    id: u64,
    description: String,
    started_at: DateTime<Utc>,
    state: Mutex<OperationState>,
    parent: Mutex<Option<Weak<OperationInner>>>,
    children: Mutex<Vec<Weak<OperationInner>>>,
}

impl OperationInner {
    fn cancel_tree(&self) {
        {
            let mut state = self.state.lock();
            if *state == OperationState::Running {
                *state = OperationState::Cancelled;
            }
        }
        let children: Vec<Arc<OperationInner>> = self
            .children
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for child in children {
            child.cancel_tree();
        }
    }

    fn invalidates_children(&self) -> bool {
        matches!(*self.state.lock(), OperationState::Cancelled | OperationState::Failed)
    }

    fn parent(&self) -> Option<Arc<OperationInner>> {
        self.parent.lock().as_ref().and_then(Weak::upgrade)
    }
}

/// Handle to one in-flight request, cheap to clone
#[derive(Clone)]
pub struct Operation {
    inner: Arc<OperationInner>,
}

impl Operation {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(OperationInner {
                id: NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed),
                description: description.into(),
                started_at: Utc::now(),
                state: Mutex::new(OperationState::Running),
                parent: Mutex::new(None),
                children: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn description(&self) -> &str {
        &self.inner.description
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    pub fn state(&self) -> OperationState {
        *self.inner.state.lock()
    }

    /// Run this operation as a continuation of `parent`.
    ///
    /// A child chained to an already cancelled or failed parent starts cancelled.
    pub fn chain(&self, parent: &Operation) {
        if Arc::ptr_eq(&self.inner, &parent.inner) {
            return;
        }
        *self.inner.parent.lock() = Some(Arc::downgrade(&parent.inner));
        {
            let mut children = parent.inner.children.lock();
            children.retain(|c| c.strong_count() > 0);
            children.push(Arc::downgrade(&self.inner));
        }
        if parent.is_cancelled() || parent.inner.invalidates_children() {
            self.inner.cancel_tree();
        }
    }

    pub fn parent(&self) -> Option<Operation> {
        self.inner.parent().map(|inner| Operation { inner })
    }

    /// Cancel this operation and everything chained to it
    pub fn cancel(&self) {
        self.inner.cancel_tree();
    }

    /// Mark a normal completion; children keep running
    pub fn complete(&self) {
        let mut state = self.inner.state.lock();
        if *state == OperationState::Running {
            *state = OperationState::Completed;
        }
    }

    /// Mark an abnormal completion; children are cancelled
    pub fn fail(&self) {
        {
            let mut state = self.inner.state.lock();
            if *state == OperationState::Running {
                *state = OperationState::Failed;
            }
        }
        let children: Vec<Arc<OperationInner>> = self
            .inner
            .children
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for child in children {
            child.cancel_tree();
        }
    }

    /// True if this operation or any live ancestor was cancelled or failed
    pub fn is_cancelled(&self) -> bool {
        if *self.inner.state.lock() == OperationState::Cancelled {
            return true;
        }
        let mut current = self.inner.parent();
        while let Some(parent) = current {
            if parent.invalidates_children() {
                return true;
            }
            current = parent.parent();
        }
        false
    }

    /// Milliseconds since this operation was created
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.inner.started_at).num_milliseconds()
    }

    /// Milliseconds since the root of the chain was created
    pub fn chain_elapsed_ms(&self) -> i64 {
        let mut root = self.inner.clone();
        while let Some(parent) = root.parent() {
            root = parent;
        }
        (Utc::now() - root.started_at).num_milliseconds()
    }

    pub fn same_as(&self, other: &Operation) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.inner.id)
            .field("description", &self.inner.description)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_propagates_to_children() {
        let root = Operation::new("root");
        let child = Operation::new("child");
        let grandchild = Operation::new("grandchild");
        child.chain(&root);
        grandchild.chain(&child);

        root.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
        assert_eq!(grandchild.state(), OperationState::Cancelled);
    }

    #[test]
    fn cancellation_survives_dropped_parent() {
        let child = Operation::new("child");
        {
            let root = Operation::new("root");
            child.chain(&root);
            root.cancel();
        }
        assert!(child.is_cancelled());
    }

    #[test]
    fn normal_completion_keeps_children_alive() {
        let root = Operation::new("quantile");
        let child = Operation::new("next k");
        child.chain(&root);
        root.complete();
        assert!(!child.is_cancelled());
        assert_eq!(child.state(), OperationState::Running);
    }

    #[test]
    fn failure_cancels_children() {
        let root = Operation::new("root");
        let child = Operation::new("child");
        child.chain(&root);
        root.fail();
        assert!(child.is_cancelled());
        assert!(!root.is_cancelled());
    }

    #[test]
    fn chaining_to_cancelled_parent_starts_cancelled() {
        let root = Operation::new("root");
        root.cancel();
        let child = Operation::new("child");
        child.chain(&root);
        assert!(child.is_cancelled());
    }

    #[test]
    fn cancel_does_not_reach_parent() {
        let root = Operation::new("root");
        let child = Operation::new("child");
        child.chain(&root);
        child.cancel();
        assert!(!root.is_cancelled());
        assert_eq!(root.state(), OperationState::Running);
    }

    #[test]
    fn elapsed_is_measured_per_operation() {
        let root = Operation::new("root");
        std::thread::sleep(std::time::Duration::from_millis(20));
        let child = Operation::new("child");
        child.chain(&root);
        assert!(child.elapsed_ms() < root.elapsed_ms());
        assert!(child.chain_elapsed_ms() >= 20);
        assert!(child.parent().unwrap().same_as(&root));
    }
}
