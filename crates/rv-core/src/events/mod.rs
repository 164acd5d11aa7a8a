use std::sync::Arc;
use parking_lot::Mutex;
use ahash::AHashMap;

/// Shared surface for errors, progress and timing reported by receivers
pub trait Reporter: Send + Sync {
    /// A remote computation failed; the message is shown verbatim
    fn report_error(&self, message: &str);

    /// Progress of a streaming request, in [0, 1]
    fn report_progress(&self, _description: &str, _done: f64) {}

    /// A buffered operation delivered its final value
    fn report_completed(&self, _description: &str, _elapsed_ms: i64) {}
}

/// Reporter that only writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report_error(&self, message: &str) {
        tracing::error!(%message, "remote operation failed");
    }

    fn report_progress(&self, description: &str, done: f64) {
        tracing::trace!(%description, done, "progress");
    }

    fn report_completed(&self, description: &str, elapsed_ms: i64) {
        tracing::info!(%description, elapsed_ms, "operation completed");
    }
}

/// System-wide event bus
pub struct EventBus {
    handlers: Arc<Mutex<AHashMap<std::any::TypeId, Vec<Box<dyn EventHandler>>>>>,
}

/// Event trait that all events must implement
pub trait Event: Send + Sync + 'static {
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Handler trait for event handlers
pub trait EventHandler: Send + Sync {
    fn handle(&mut self, event: &dyn Event);
}

/// Common system events
pub mod events {
    use super::Event;

    /// A remote computation returned an error
    #[derive(Debug, Clone, PartialEq)]
    pub struct RemoteError {
        pub message: String,
    }

    /// A partial result arrived
    #[derive(Debug, Clone, PartialEq)]
    pub struct Progress {
        pub description: String,
        pub done: f64,
    }

    /// A buffered operation finished
    #[derive(Debug, Clone, PartialEq)]
    pub struct OperationCompleted {
        pub description: String,
        pub elapsed_ms: i64,
    }

    /// The single status line of a view changed; `None` clears it
    #[derive(Debug, Clone, PartialEq)]
    pub struct StatusChanged {
        pub view_id: u64,
        pub message: Option<String>,
    }

    /// A view replaced its displayed window
    #[derive(Debug, Clone, PartialEq)]
    pub struct WindowInstalled {
        pub view_id: u64,
        pub object_id: String,
        pub start_position: i64,
        pub displayed_rows: i64,
        pub total_rows: i64,
    }

    // Implement Event trait for all event types
    macro_rules! impl_event {
        ($($t:ty),*) => {
            $(
                impl Event for $t {
                    fn as_any(&self) -> &dyn std::any::Any {
                        self
                    }
                }
            )*
        }
    }

    impl_event!(
        RemoteError,
        Progress,
        OperationCompleted,
        StatusChanged,
        WindowInstalled
    );
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(AHashMap::new())),
        }
    }

    /// Subscribe to events of a specific type
    pub fn subscribe<E: Event>(&self, handler: Box<dyn EventHandler>) {
        let type_id = std::any::TypeId::of::<E>();
        let mut handlers = self.handlers.lock();
        handlers.entry(type_id).or_insert_with(Vec::new).push(handler);
    }

    /// Publish an event.
    ///
    /// Handlers run under the bus lock and must not publish themselves.
    pub fn publish<E: Event>(&self, event: E) {
        let type_id = std::any::TypeId::of::<E>();
        let mut handlers = self.handlers.lock();

        if let Some(event_handlers) = handlers.get_mut(&type_id) {
            for handler in event_handlers.iter_mut() {
                handler.handle(&event);
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for EventBus {
    fn report_error(&self, message: &str) {
        tracing::error!(%message, "remote operation failed");
        self.publish(events::RemoteError {
            message: message.to_string(),
        });
    }

    fn report_progress(&self, description: &str, done: f64) {
        self.publish(events::Progress {
            description: description.to_string(),
            done: done.clamp(0.0, 1.0),
        });
    }

    fn report_completed(&self, description: &str, elapsed_ms: i64) {
        tracing::info!(%description, elapsed_ms, "operation completed");
        self.publish(events::OperationCompleted {
            description: description.to_string(),
            elapsed_ms,
        });
    }
}

/// Helper struct for creating event handlers from closures
pub struct ClosureEventHandler<F> {
    handler: F,
}

impl<F> EventHandler for ClosureEventHandler<F>
where
    F: FnMut(&dyn Event) + Send + Sync,
{
    fn handle(&mut self, event: &dyn Event) {
        (self.handler)(event);
    }
}

/// Create an event handler from a closure
pub fn handler_from_fn<F>(f: F) -> Box<dyn EventHandler>
where
    F: FnMut(&dyn Event) + Send + Sync + 'static,
{
    Box::new(ClosureEventHandler { handler: f })
}

/// Handler that records every event of type `E` into a shared vector
pub fn collect_into<E: Event + Clone>(sink: Arc<Mutex<Vec<E>>>) -> Box<dyn EventHandler> {
    handler_from_fn(move |event| {
        if let Some(event) = event.as_any().downcast_ref::<E>() {
            sink.lock().push(event.clone());
        }
    })
}
