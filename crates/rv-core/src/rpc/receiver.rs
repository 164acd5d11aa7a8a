//! Consumer side of a streaming request.
//!
//! The channel turns every reply into a [`Delivery`] and hands it to the
//! request's receiver: zero or more `Next`, then exactly one of `Error` or
//! `Completed`.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::cancel::Operation;
use super::envelope::{PartialResult, RequestId};
use crate::events::Reporter;

/// One delivery for a request
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery<T> {
    Next(PartialResult<T>),
    Error(String),
    Completed,
}

impl<T> Delivery<T> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Delivery::Next(_))
    }
}

/// Streaming receiver: acts on every partial result
pub trait Receiver<T>: Send {
    fn on_next(&mut self, value: PartialResult<T>);

    fn on_error(&mut self, message: String);

    fn on_completed(&mut self);

    fn deliver(&mut self, delivery: Delivery<T>) {
        match delivery {
            Delivery::Next(value) => self.on_next(value),
            Delivery::Error(message) => self.on_error(message),
            Delivery::Completed => self.on_completed(),
        }
    }
}

/// Type-erased receiver stored in the channel's request table
pub(crate) trait RawReceiver: Send {
    fn deliver(&mut self, request_id: RequestId, delivery: Delivery<Value>);
}

/// Decodes untyped payloads into `T` before forwarding
pub(crate) struct TypedReceiver<T, R> {
    inner: R,
    _payload: PhantomData<fn() -> T>,
}

impl<T, R> TypedReceiver<T, R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            _payload: PhantomData,
        }
    }
}

impl<T, R> RawReceiver for TypedReceiver<T, R>
where
    T: DeserializeOwned,
    R: Receiver<T>,
{
    fn deliver(&mut self, request_id: RequestId, delivery: Delivery<Value>) {
        match delivery {
            Delivery::Next(partial) => match serde_json::from_value::<T>(partial.data) {
                Ok(data) => self.inner.on_next(PartialResult::new(partial.done, data)),
                Err(err) => {
                    tracing::warn!(request_id, error = %err, "dropping partial result with unexpected shape");
                }
            },
            Delivery::Error(message) => self.inner.on_error(message),
            Delivery::Completed => self.inner.on_completed(),
        }
    }
}

type Finalizer<T> = Box<dyn FnOnce(Option<T>) + Send>;
type ErrorHandler = Box<dyn FnMut(String) + Send>;

/// Buffering receiver.
///
/// Keeps the data of the most recent partial result and runs `finalize`
/// exactly once on completion. A completion without any partial result
/// finalizes with `None`, meaning an empty result. Errors go to the shared
/// reporter unless an error handler is installed.
pub struct OnCompleteReceiver<T> {
    description: String,
    operation: Operation,
    reporter: Arc<dyn Reporter>,
    last: Option<T>,
    finalize: Option<Finalizer<T>>,
    on_error: Option<ErrorHandler>,
}

impl<T: Send> OnCompleteReceiver<T> {
    pub fn new<F>(
        description: impl Into<String>,
        operation: Operation,
        reporter: Arc<dyn Reporter>,
        finalize: F,
    ) -> Self
    where
        F: FnOnce(Option<T>) + Send + 'static,
    {
        Self {
            description: description.into(),
            operation,
            reporter,
            last: None,
            finalize: Some(Box::new(finalize)),
            on_error: None,
        }
    }

    /// Route errors to `handler` instead of the shared reporter
    pub fn with_error_handler<H>(mut self, handler: H) -> Self
    where
        H: FnMut(String) + Send + 'static,
    {
        self.on_error = Some(Box::new(handler));
        self
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }
}

impl<T: Send> Receiver<T> for OnCompleteReceiver<T> {
    fn on_next(&mut self, value: PartialResult<T>) {
        self.reporter.report_progress(&self.description, value.done);
        self.last = Some(value.data);
    }

    fn on_error(&mut self, message: String) {
        match self.on_error.as_mut() {
            Some(handler) => handler(message),
            None => self.reporter.report_error(&message),
        }
    }

    fn on_completed(&mut self) {
        if let Some(finalize) = self.finalize.take() {
            self.reporter
                .report_completed(&self.description, self.operation.elapsed_ms());
            finalize(self.last.take());
        }
    }
}

/// Streaming receiver built from a closure, reporting progress on every delivery
pub struct StreamReceiver<T> {
    description: String,
    operation: Operation,
    reporter: Arc<dyn Reporter>,
    on_next: Box<dyn FnMut(PartialResult<T>) + Send>,
}

impl<T> StreamReceiver<T> {
    pub fn new<F>(
        description: impl Into<String>,
        operation: Operation,
        reporter: Arc<dyn Reporter>,
        on_next: F,
    ) -> Self
    where
        F: FnMut(PartialResult<T>) + Send + 'static,
    {
        Self {
            description: description.into(),
            operation,
            reporter,
            on_next: Box::new(on_next),
        }
    }
}

impl<T> Receiver<T> for StreamReceiver<T> {
    fn on_next(&mut self, value: PartialResult<T>) {
        self.reporter.report_progress(&self.description, value.done);
        (self.on_next)(value);
    }

    fn on_error(&mut self, message: String) {
        self.reporter.report_error(&message);
    }

    fn on_completed(&mut self) {
        self.reporter
            .report_completed(&self.description, self.operation.elapsed_ms());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingReporter {
        errors: Mutex<Vec<String>>,
        completed: Mutex<Vec<String>>,
    }

    impl Reporter for RecordingReporter {
        fn report_error(&self, message: &str) {
            self.errors.lock().push(message.to_string());
        }

        fn report_completed(&self, description: &str, _elapsed_ms: i64) {
            self.completed.lock().push(description.to_string());
        }
    }

    fn buffering(
        reporter: Arc<RecordingReporter>,
        seen: Arc<Mutex<Vec<Option<i32>>>>,
    ) -> OnCompleteReceiver<i32> {
        OnCompleteReceiver::new("count", Operation::new("count"), reporter, move |value| {
            seen.lock().push(value)
        })
    }

    #[test]
    fn finalizes_with_last_value_once() {
        let reporter = Arc::new(RecordingReporter::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut receiver = buffering(reporter.clone(), seen.clone());

        receiver.deliver(Delivery::Next(PartialResult::new(0.5, 1)));
        receiver.deliver(Delivery::Next(PartialResult::new(1.0, 2)));
        receiver.deliver(Delivery::Completed);
        receiver.deliver(Delivery::Completed);

        assert_eq!(seen.lock().as_slice(), [Some(2)]);
        assert_eq!(reporter.completed.lock().as_slice(), ["count"]);
    }

    #[test]
    fn completion_without_value_is_empty_result() {
        let reporter = Arc::new(RecordingReporter::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut receiver = buffering(reporter.clone(), seen.clone());

        receiver.deliver(Delivery::Completed);

        assert_eq!(seen.lock().as_slice(), [None]);
        assert!(reporter.errors.lock().is_empty());
    }

    #[test]
    fn errors_go_to_reporter_unless_overridden() {
        let reporter = Arc::new(RecordingReporter::default());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut receiver = buffering(reporter.clone(), seen.clone());
        receiver.deliver(Delivery::Error("remote failure".into()));
        assert_eq!(reporter.errors.lock().as_slice(), ["remote failure"]);

        let handled = Arc::new(Mutex::new(Vec::new()));
        let sink = handled.clone();
        let mut receiver = buffering(reporter.clone(), seen.clone())
            .with_error_handler(move |message| sink.lock().push(message));
        receiver.deliver(Delivery::Error("local".into()));
        assert_eq!(handled.lock().as_slice(), ["local"]);
        assert_eq!(reporter.errors.lock().len(), 1);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn typed_receiver_drops_bad_payloads() {
        let reporter = Arc::new(RecordingReporter::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut receiver = TypedReceiver::new(buffering(reporter, seen.clone()));

        receiver.deliver(1, Delivery::Next(PartialResult::new(0.2, serde_json::json!(4))));
        receiver.deliver(1, Delivery::Next(PartialResult::new(0.9, serde_json::json!("oops"))));
        receiver.deliver(1, Delivery::Completed);

        assert_eq!(seen.lock().as_slice(), [Some(4)]);
    }
}
