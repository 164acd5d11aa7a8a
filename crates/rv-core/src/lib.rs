//! Client core for browsing remotely computed tables.
//!
//! A [`Session`] owns one streaming [`ChannelContext`] shared by every view.
//! Each [`TableNavigator`] keeps a logical window over a remote table and
//! moves it with quantile, next-K and find requests, replacing the window
//! wholesale whenever a reply completes.

pub mod config;
pub mod events;
pub mod navigation;
pub mod order;
pub mod rpc;
pub mod schema;
pub mod selection;
pub mod state;
pub mod window;

// Re-export commonly used types
pub use config::{ClientConfig, ConfigError};
pub use events::{ConsoleReporter, EventBus, Reporter};
pub use navigation::{FindOptions, NavigationError, TableNavigator, ViewSnapshot, ViewSubscriber};
pub use order::{ColumnSortOrientation, RecordOrder};
pub use rpc::{ChannelContext, Operation, PartialResult, RemoteObject, RpcError, Transport};
pub use schema::{ColumnDescription, ContentsKind, Schema};
pub use selection::{SelectionInput, SelectionSet, ViewSelection};
pub use state::Session;
pub use window::{FindResult, LogicalWindow, NextKList, RowValues, RowView, TableSummary};
