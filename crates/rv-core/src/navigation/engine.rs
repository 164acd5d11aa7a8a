//! Navigation engine implementation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::requests::{
    FindArgs, FindOptions, NextKArgs, QuantileArgs, FIND, GET_NEXT_K, GET_SCHEMA, QUANTILE,
};
use super::{NavigationError, ViewSnapshot, ViewSubscriber};
use crate::config::ClientConfig;
use crate::events::{events, EventBus, Reporter};
use crate::order::{ColumnSortOrientation, RecordOrder};
use crate::rpc::{OnCompleteReceiver, Operation, RemoteObject};
use crate::selection::{SelectionInput, ViewSelection};
use crate::window::{FindResult, LogicalWindow, NextKList, RowValues, TableSummary};

static NEXT_VIEW_ID: AtomicU64 = AtomicU64::new(1);

/// Navigation state stored internally
#[derive(Debug, Default)]
struct ViewState {
    summary: Option<TableSummary>,
    order: RecordOrder,
    window: Option<LogicalWindow>,
    status: Option<String>,
    find_result: Option<FindResult>,
    /// Filter of the last search, to tell "find again" from a new search
    find_filter: Option<(String, FindOptions)>,
    selection: ViewSelection,
    /// Root of the most recent navigation; cancelled when superseded
    current: Option<Operation>,
}

impl ViewState {
    fn table_size(&self) -> Option<i64> {
        self.window
            .as_ref()
            .map(|w| w.total_row_count)
            .or_else(|| self.summary.as_ref().map(|s| s.row_count))
    }

    fn displayed_window(&self) -> Result<&LogicalWindow, NavigationError> {
        self.window
            .as_ref()
            .filter(|w| !w.is_empty())
            .ok_or(NavigationError::NoWindow)
    }
}

struct NavigatorInner {
    view_id: u64,
    remote: RemoteObject,
    config: ClientConfig,
    bus: Arc<EventBus>,
    state: Mutex<ViewState>,
    subscribers: RwLock<Vec<Weak<dyn ViewSubscriber>>>,
}

/// One table view over a remote object.
///
/// Every action issues at most one request and cancels the previous action
/// of the same view, so a late reply can never overwrite a newer window.
/// Replies are installed by receivers holding only a weak reference to the
/// view.
#[derive(Clone)]
pub struct TableNavigator {
    inner: Arc<NavigatorInner>,
}

#[derive(Clone)]
struct WeakNavigator(Weak<NavigatorInner>);

impl WeakNavigator {
    fn upgrade(&self) -> Option<TableNavigator> {
        self.0.upgrade().map(|inner| TableNavigator { inner })
    }
}

impl TableNavigator {
    pub fn new(remote: RemoteObject, config: ClientConfig, bus: Arc<EventBus>) -> Self {
        Self {
            inner: Arc::new(NavigatorInner {
                view_id: NEXT_VIEW_ID.fetch_add(1, Ordering::Relaxed),
                remote,
                config,
                bus,
                state: Mutex::new(ViewState::default()),
                subscribers: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn view_id(&self) -> u64 {
        self.inner.view_id
    }

    pub fn object_id(&self) -> &str {
        self.inner.remote.object_id()
    }

    pub fn order(&self) -> RecordOrder {
        self.inner.state.lock().order.clone()
    }

    pub fn window(&self) -> Option<LogicalWindow> {
        self.inner.state.lock().window.clone()
    }

    pub fn status(&self) -> Option<String> {
        self.inner.state.lock().status.clone()
    }

    pub fn find_result(&self) -> Option<FindResult> {
        self.inner.state.lock().find_result.clone()
    }

    pub fn summary(&self) -> Option<TableSummary> {
        self.inner.state.lock().summary.clone()
    }

    pub fn selection(&self) -> ViewSelection {
        self.inner.state.lock().selection.clone()
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let state = self.inner.state.lock();
        ViewSnapshot {
            view_id: self.inner.view_id,
            order: state.order.clone(),
            window: state.window.clone(),
            status: state.status.clone(),
            find_result: state.find_result.clone(),
            selection: state.selection.clone(),
        }
    }

    /// Add a subscriber
    pub fn add_subscriber(&self, subscriber: Arc<dyn ViewSubscriber>) {
        self.inner.subscribers.write().push(Arc::downgrade(&subscriber));
    }

    /// Cancel whatever this view is waiting for
    pub fn cancel(&self) {
        if let Some(current) = self.inner.state.lock().current.take() {
            current.cancel();
        }
    }

    /// Fetch the table summary, then show the first page
    pub fn load_schema(&self) -> Result<(), NavigationError> {
        let root = self.begin(GET_SCHEMA);
        let handle = self
            .inner
            .remote
            .create_request(GET_SCHEMA, &None::<()>, root.clone())?;
        let view = self.downgrade();
        let parent = root.clone();
        let receiver = OnCompleteReceiver::new(GET_SCHEMA, root, self.reporter(), move |summary: Option<TableSummary>| {
            if let Some(view) = view.upgrade() {
                view.schema_loaded(summary.unwrap_or_default(), &parent);
            }
        })
        .with_error_handler(self.error_handler());
        handle.attach(receiver);
        Ok(())
    }

    /// Install a known summary; an empty order becomes all columns ascending
    pub fn set_summary(&self, summary: TableSummary) {
        let mut state = self.inner.state.lock();
        if state.order.is_empty() {
            state.order = RecordOrder::new(
                summary
                    .schema
                    .columns()
                    .iter()
                    .cloned()
                    .map(ColumnSortOrientation::ascending)
                    .collect(),
            );
        }
        state.summary = Some(summary);
    }

    fn schema_loaded(&self, summary: TableSummary, parent: &Operation) {
        if parent.is_cancelled() {
            return;
        }
        debug!(view_id = self.view_id(), rows = summary.row_count, "schema loaded");
        self.set_summary(summary);
        let child = Operation::new(GET_NEXT_K);
        child.chain(parent);
        let order = self.order();
        self.follow_up(order, None, child);
    }

    /// Jump to a relative position in the current order
    pub fn scroll_to_fraction(&self, fraction: f64) -> Result<(), NavigationError> {
        if fraction.is_nan() || fraction <= 0.0 {
            return self.goto_start();
        }
        if fraction >= 1.0 {
            return self.goto_end();
        }
        let (order, table_size) = self.guarded(|state| {
            let table_size = state.table_size().ok_or(NavigationError::NoWindow)?;
            Ok((state.order.clone(), table_size))
        })?;

        let root = self.begin(QUANTILE);
        let args = QuantileArgs {
            precision: self.inner.config.quantile_precision,
            table_size,
            order: order.clone(),
            position: fraction,
            seed: self.inner.config.seed,
        };
        let handle = self.inner.remote.create_request(QUANTILE, &args, root.clone())?;
        let view = self.downgrade();
        let parent = root.clone();
        let receiver = OnCompleteReceiver::new(QUANTILE, root, self.reporter(), move |row: Option<RowValues>| {
            if let Some(view) = view.upgrade() {
                view.quantile_found(order, row, &parent);
            }
        })
        .with_error_handler(self.error_handler());
        handle.attach(receiver);
        Ok(())
    }

    fn quantile_found(&self, order: RecordOrder, row: Option<RowValues>, parent: &Operation) {
        if parent.is_cancelled() {
            return;
        }
        let child = Operation::new(GET_NEXT_K);
        child.chain(parent);
        // An empty table has no quantile; fall back to the first page.
        let anchor = row.filter(|values| !values.is_empty());
        self.follow_up(order, anchor, child);
    }

    pub fn goto_start(&self) -> Result<(), NavigationError> {
        let order = self.order();
        let operation = self.begin(GET_NEXT_K);
        self.request_next_k(order, None, false, operation)
    }

    pub fn goto_end(&self) -> Result<(), NavigationError> {
        let order = self.order();
        let operation = self.begin(GET_NEXT_K);
        self.request_next_k(order, None, true, operation)
    }

    pub fn page_down(&self) -> Result<(), NavigationError> {
        let (order, anchor) = self.guarded(|state| {
            let window = state.displayed_window()?;
            if window.at_bottom() {
                return Err(NavigationError::AlreadyAtBottom);
            }
            let anchor = window.last_row().map(|row| row.values.clone());
            Ok((state.order.clone(), anchor))
        })?;
        let operation = self.begin(GET_NEXT_K);
        self.request_next_k(order, anchor, false, operation)
    }

    pub fn page_up(&self) -> Result<(), NavigationError> {
        let (order, anchor) = self.guarded(|state| {
            let window = state.displayed_window()?;
            if window.at_top() {
                return Err(NavigationError::AlreadyAtTop);
            }
            let anchor = window.first_row().map(|row| row.values.clone());
            Ok((state.order.clone(), anchor))
        })?;
        let operation = self.begin(GET_NEXT_K);
        self.request_next_k(order, anchor, true, operation)
    }

    /// Search forward from the first displayed row (or the top of the table)
    pub fn find_next(
        &self,
        pattern: &str,
        options: FindOptions,
        from_top: bool,
    ) -> Result<(), NavigationError> {
        self.find(pattern, options, from_top, true)
    }

    /// Search backward from the first displayed row
    pub fn find_previous(
        &self,
        pattern: &str,
        options: FindOptions,
        from_top: bool,
    ) -> Result<(), NavigationError> {
        self.find(pattern, options, from_top, false)
    }

    fn find(
        &self,
        pattern: &str,
        options: FindOptions,
        from_top: bool,
        next: bool,
    ) -> Result<(), NavigationError> {
        let args = self.guarded(|state| {
            if state.order.is_empty() {
                return Err(NavigationError::EmptyOrder);
            }
            let top_row = state
                .window
                .as_ref()
                .and_then(|w| w.first_row())
                .map(|row| row.values.clone())
                .ok_or(NavigationError::NoData)?;
            if pattern.is_empty() {
                return Err(NavigationError::NoSearchString);
            }

            let filter = (pattern.to_string(), options);
            let repeated = state.find_filter.as_ref() == Some(&filter);
            if !repeated {
                state.find_filter = Some(filter);
            }
            Ok(FindArgs {
                to_find: pattern.to_string(),
                options,
                top_row: if from_top { None } else { Some(top_row) },
                order: state.order.clone(),
                exclude_top_row: repeated || !next,
                next,
            })
        })?;

        let root = self.begin(FIND);
        let order = args.order.clone();
        let handle = self.inner.remote.create_request(FIND, &args, root.clone())?;
        let view = self.downgrade();
        let parent = root.clone();
        let receiver = OnCompleteReceiver::new(FIND, root, self.reporter(), move |result: Option<FindResult>| {
            if let Some(view) = view.upgrade() {
                view.match_found(order, result.unwrap_or_default(), &parent);
            }
        })
        .with_error_handler(self.error_handler());
        handle.attach(receiver);
        Ok(())
    }

    fn match_found(&self, order: RecordOrder, result: FindResult, parent: &Operation) {
        if parent.is_cancelled() {
            return;
        }
        let anchor = result.first_matching_row.clone();
        let has_match = result.has_match();
        debug!(view_id = self.view_id(), before = result.before, at = result.at, after = result.after, "find finished");
        self.inner.state.lock().find_result = Some(result);
        if !has_match {
            self.set_status(Some(NavigationError::NoMatches.to_string()));
            return;
        }
        let child = Operation::new(GET_NEXT_K);
        child.chain(parent);
        self.follow_up(order, anchor, child);
    }

    /// Replace the order and show the first page under it
    pub fn set_order(&self, order: RecordOrder) -> Result<(), NavigationError> {
        {
            let mut state = self.inner.state.lock();
            if let Some(previous) = state.current.take() {
                previous.cancel();
            }
            state.order = order;
            state.window = None;
            state.find_result = None;
            state.find_filter = None;
            state.selection.clear();
        }
        self.goto_start()
    }

    /// Make `entry` the primary sort key
    pub fn sort_first(&self, entry: ColumnSortOrientation) -> Result<(), NavigationError> {
        let order = self.order().sort_first(entry);
        self.set_order(order)
    }

    pub fn hide_column(&self, name: &str) -> Result<(), NavigationError> {
        let order = self.order().hide(name);
        self.set_order(order)
    }

    /// Show a column of the table schema as the last sort key
    pub fn show_column(&self, name: &str, ascending: bool) -> Result<(), NavigationError> {
        let column = self.guarded(|state| {
            state
                .summary
                .as_ref()
                .and_then(|s| s.schema.find(name))
                .cloned()
                .ok_or_else(|| NavigationError::UnknownColumn(name.to_string()))
        })?;
        let order = self.order().show(ColumnSortOrientation::new(column, ascending));
        self.set_order(order)
    }

    pub fn toggle_direction(&self, name: &str) -> Result<(), NavigationError> {
        let order = self.guarded(|state| {
            state
                .order
                .find(name)
                .map(|_| state.order.clone().toggle(name))
                .ok_or_else(|| NavigationError::UnknownColumn(name.to_string()))
        })?;
        self.set_order(order)
    }

    pub fn select_column(&self, input: SelectionInput, index: usize) {
        self.inner.state.lock().selection.columns.apply(input, index);
        self.notify();
    }

    pub fn select_row(&self, input: SelectionInput, index: usize) {
        self.inner.state.lock().selection.rows.apply(input, index);
        self.notify();
    }

    fn downgrade(&self) -> WeakNavigator {
        WeakNavigator(Arc::downgrade(&self.inner))
    }

    fn reporter(&self) -> Arc<dyn Reporter> {
        self.inner.bus.clone()
    }

    /// Remote errors go to the shared sink and become this view's status
    fn error_handler(&self) -> impl FnMut(String) + Send + 'static {
        let view = self.downgrade();
        let bus = self.inner.bus.clone();
        move |message: String| {
            bus.report_error(&message);
            if let Some(view) = view.upgrade() {
                view.set_status(Some(message));
            }
        }
    }

    /// Start a new navigation, cancelling the previous one
    fn begin(&self, description: &str) -> Operation {
        let operation = Operation::new(description);
        if let Some(previous) = self.inner.state.lock().current.replace(operation.clone()) {
            previous.cancel();
        }
        operation
    }

    /// Check a guard under the state lock; a refusal becomes the status line
    fn guarded<T>(
        &self,
        check: impl FnOnce(&mut ViewState) -> Result<T, NavigationError>,
    ) -> Result<T, NavigationError> {
        let outcome = {
            let mut state = self.inner.state.lock();
            check(&mut *state)
        };
        outcome.map_err(|err| {
            debug!(view_id = self.view_id(), reason = %err, "navigation refused");
            self.set_status(Some(err.to_string()));
            err
        })
    }

    fn request_next_k(
        &self,
        order: RecordOrder,
        anchor: Option<RowValues>,
        reversed: bool,
        operation: Operation,
    ) -> Result<(), NavigationError> {
        let args = NextKArgs {
            to_find: None,
            order: if reversed { order.invert() } else { order.clone() },
            first_row: anchor,
            rows_on_screen: self.inner.config.rows_per_page,
        };
        let handle = self
            .inner
            .remote
            .create_request(GET_NEXT_K, &args, operation.clone())?;
        let view = self.downgrade();
        let installing = operation.clone();
        let receiver = OnCompleteReceiver::new(GET_NEXT_K, operation, self.reporter(), move |list: Option<NextKList>| {
            if let Some(view) = view.upgrade() {
                view.install(order, list, reversed, &installing);
            }
        })
        .with_error_handler(self.error_handler());
        handle.attach(receiver);
        Ok(())
    }

    /// Issue the next-K half of a chained action from inside a receiver
    fn follow_up(&self, order: RecordOrder, anchor: Option<RowValues>, operation: Operation) {
        if let Err(err) = self.request_next_k(order, anchor, false, operation) {
            warn!(view_id = self.view_id(), error = %err, "could not fetch window");
            self.set_status(Some(err.to_string()));
        }
    }

    fn install(
        &self,
        order: RecordOrder,
        list: Option<NextKList>,
        reversed: bool,
        operation: &Operation,
    ) {
        let (window, had_status) = {
            let mut state = self.inner.state.lock();
            // Checked under the lock so a concurrent set_order cannot interleave
            if operation.is_cancelled() {
                debug!(view_id = self.view_id(), "discarding window of superseded request");
                return;
            }
            let window = match list {
                Some(list) => LogicalWindow::from_next_k(order.schema(), list, reversed),
                None => LogicalWindow::empty(order.schema(), state.table_size().unwrap_or(0)),
            };
            if let Some(summary) = state.summary.as_mut() {
                summary.row_count = window.total_row_count;
            }
            state.window = Some(window.clone());
            state.selection.clear();
            (window, state.status.take().is_some())
        };
        if !window.is_consistent() {
            warn!(
                view_id = self.view_id(),
                start = window.start_position,
                displayed = window.displayed_row_count(),
                total = window.total_row_count,
                "service returned an inconsistent window"
            );
        }
        info!(
            view_id = self.view_id(),
            start = window.start_position,
            displayed = window.displayed_row_count(),
            total = window.total_row_count,
            elapsed_ms = operation.chain_elapsed_ms(),
            "window installed"
        );

        self.inner.bus.publish(events::WindowInstalled {
            view_id: self.view_id(),
            object_id: self.object_id().to_string(),
            start_position: window.start_position,
            displayed_rows: window.displayed_row_count(),
            total_rows: window.total_row_count,
        });
        if had_status {
            self.inner.bus.publish(events::StatusChanged {
                view_id: self.view_id(),
                message: None,
            });
        }
        self.notify();
    }

    fn set_status(&self, message: Option<String>) {
        self.inner.state.lock().status = message.clone();
        self.inner.bus.publish(events::StatusChanged {
            view_id: self.view_id(),
            message,
        });
        self.notify();
    }

    /// Notify all subscribers; dead weak references are pruned
    fn notify(&self) {
        let snapshot = self.snapshot();
        let live: Vec<Arc<dyn ViewSubscriber>> = {
            let mut subscribers = self.inner.subscribers.write();
            subscribers.retain(|weak| weak.strong_count() > 0);
            subscribers.iter().filter_map(Weak::upgrade).collect()
        };
        for subscriber in live {
            subscriber.on_view_change(&snapshot);
        }
    }
}

impl std::fmt::Debug for TableNavigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableNavigator")
            .field("view_id", &self.inner.view_id)
            .field("object_id", &self.inner.remote.object_id())
            .finish()
    }
}
