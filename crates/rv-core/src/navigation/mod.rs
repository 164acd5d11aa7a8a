//! Windowed navigation over a remotely ordered table

use thiserror::Error;

use crate::rpc::RpcError;

mod engine;
mod requests;
mod subscriber;

pub use engine::TableNavigator;
pub use requests::{
    FindArgs, FindOptions, NextKArgs, QuantileArgs, FIND, GET_NEXT_K, GET_SCHEMA, QUANTILE,
};
pub use subscriber::{ViewSnapshot, ViewSubscriber};

/// Why a navigation action was refused.
///
/// Everything except `Rpc` is a guard outcome: no request is issued, the
/// displayed window is kept and the message becomes the view's status.
#[derive(Error, Debug)]
pub enum NavigationError {
    #[error("Nothing is displayed yet")]
    NoWindow,

    #[error("Already at the top")]
    AlreadyAtTop,

    #[error("Already at the bottom")]
    AlreadyAtBottom,

    #[error("Find operates in the displayed columns, but no column is currently visible.")]
    EmptyOrder,

    #[error("No data to search in")]
    NoData,

    #[error("No current search string.")]
    NoSearchString,

    #[error("No other matches found.")]
    NoMatches,

    #[error("Unknown column {0}")]
    UnknownColumn(String),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl NavigationError {
    /// Guard outcomes are informational; only transport problems are real failures
    pub fn is_guard(&self) -> bool {
        !matches!(self, NavigationError::Rpc(_))
    }
}
