//! Span finalization for requests that outlive their dispatch thread.
//!
//! When an inbound request suspends into asynchronous processing, the
//! paired response hook can only close its own thread's activation; the
//! span itself must be finished by whichever completion signal eventually
//! fires. The host registers an [`AsyncCompletion`] with its async
//! lifecycle and calls exactly one of the three methods below. Should the
//! inline path and a completion callback ever race, or a buggy host fire
//! two signals, the record's atomic flag guarantees a single end event,
//! and the loser's decoration never runs.

use std::error::Error as StdError;
use std::sync::Arc;

use opentelemetry::trace::Status;
use opentelemetry::KeyValue;
use opentelemetry_semantic_conventions::attribute::ERROR_TYPE;

use crate::lifecycle::SpanHandle;
use crate::response::{record_response, ResponseOutcome};

/// Finishes a suspended request's span from its completion callbacks.
#[derive(Clone, Debug)]
pub struct AsyncCompletion {
    record: Arc<SpanHandle>,
}

impl AsyncCompletion {
    pub(crate) fn new(record: Arc<SpanHandle>) -> Self {
        AsyncCompletion { record }
    }

    /// The async request produced a response.
    ///
    /// Returns whether this call actually finished the span.
    pub fn on_complete(&self, outcome: &ResponseOutcome<'_>) -> bool {
        self.record
            .finish_with(|span| record_response(span, outcome))
    }

    /// The async request timed out before producing a response.
    pub fn on_timeout(&self) -> bool {
        self.record.finish_with(|span| {
            span.set_attribute(KeyValue::new(ERROR_TYPE, "timeout"));
            span.set_status(Status::error("request timed out"));
        })
    }

    /// The async request failed with an uncaught error.
    pub fn on_error(&self, error: &(dyn StdError + 'static)) -> bool {
        self.record.finish_with(|span| {
            span.record_error(error);
            span.set_status(Status::error(error.to_string()));
        })
    }

    /// Whether the span has already been finished by any path.
    pub fn is_finished(&self) -> bool {
        self.record.is_finished()
    }
}
