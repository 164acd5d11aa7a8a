use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::ClientConfig;
use crate::events::EventBus;
use crate::navigation::{NavigationError, TableNavigator, ViewSubscriber};
use crate::rpc::{ChannelContext, RemoteObject, Transport};

/// The client session: one channel and one event bus shared by every view
pub struct Session {
    /// The streaming channel
    pub channel: Arc<ChannelContext>,

    /// The event bus
    pub event_bus: Arc<EventBus>,

    /// Client settings handed to every view
    pub config: ClientConfig,

    views: RwLock<Vec<TableNavigator>>,
}

impl Session {
    pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self {
            channel: ChannelContext::with_protocol_version(transport, config.protocol_version),
            event_bus: Arc::new(EventBus::new()),
            config,
            views: RwLock::new(Vec::new()),
        }
    }

    pub fn remote(&self, object_id: impl Into<String>) -> RemoteObject {
        RemoteObject::new(object_id, self.channel.clone())
    }

    /// Open a view on a remote table; its schema and first page load asynchronously
    pub fn open_table(&self, object_id: impl Into<String>) -> Result<TableNavigator, NavigationError> {
        self.open_table_with(object_id, Vec::new())
    }

    /// Open a view whose subscribers are attached before anything is requested
    pub fn open_table_with(
        &self,
        object_id: impl Into<String>,
        subscribers: Vec<Arc<dyn ViewSubscriber>>,
    ) -> Result<TableNavigator, NavigationError> {
        let view = TableNavigator::new(
            self.remote(object_id),
            self.config.clone(),
            self.event_bus.clone(),
        );
        for subscriber in subscribers {
            view.add_subscriber(subscriber);
        }
        view.load_schema()?;
        tracing::info!(view_id = view.view_id(), object_id = view.object_id(), "table view opened");
        self.views.write().push(view.clone());
        Ok(view)
    }

    pub fn view(&self, view_id: u64) -> Option<TableNavigator> {
        self.views
            .read()
            .iter()
            .find(|v| v.view_id() == view_id)
            .cloned()
    }

    pub fn views(&self) -> Vec<TableNavigator> {
        self.views.read().clone()
    }

    /// Cancel the view's pending work and forget it
    pub fn close_view(&self, view_id: u64) -> bool {
        let mut views = self.views.write();
        match views.iter().position(|v| v.view_id() == view_id) {
            Some(index) => {
                views.remove(index).cancel();
                true
            }
            None => false,
        }
    }
}
