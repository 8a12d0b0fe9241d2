//! Generic start/stop/scope lifecycle mapped onto spans.
//!
//! Not every traced operation is shaped like an HTTP exchange. Messaging
//! sends and receives, scheduled work, and other cross-cutting operations
//! come as a five-event lifecycle: start, any number of scope open/close
//! pairs (possibly on different threads, e.g. across an executor handoff),
//! optional errors, and one stop. [`ObservationHandler`] maps that onto the
//! same span records the boundary filters use, so the exactly-once finish
//! guarantee and the thread-bound scope discipline carry over unchanged.
//!
//! Attributes recorded on an [`Observation`] are buffered and copied onto
//! the span only when it stops, tagged by cardinality so that a
//! non-tracing consumer can pick out the low-cardinality subset.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::sync::{Arc, Mutex, OnceLock};

use opentelemetry::trace::{SpanContext, SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{otel_warn, Context, KeyValue};

use crate::attributes::AttributeBag;
use crate::lifecycle::SpanHandle;
use crate::parent::resolve_observation_parent;

/// The role an observed operation plays, deciding the span kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObservationKind {
    /// Hands work to another component (producer span).
    Sender,
    /// Takes work from another component (consumer span).
    Receiver,
    /// Anything else (internal span).
    Generic,
}

impl ObservationKind {
    fn span_kind(self) -> SpanKind {
        match self {
            ObservationKind::Sender => SpanKind::Producer,
            ObservationKind::Receiver => SpanKind::Consumer,
            ObservationKind::Generic => SpanKind::Internal,
        }
    }
}

/// One observed operation: its identity, relationships and buffered state.
///
/// Shared via `Arc` when the operation crosses threads; all mutation goes
/// through interior mutability, none of it on the span finish path.
pub struct Observation {
    name: Cow<'static, str>,
    kind: ObservationKind,
    parent: Option<Arc<Observation>>,
    manual_context: Mutex<Option<Context>>,
    contextual_name: Mutex<Option<String>>,
    attributes: Mutex<AttributeBag>,
    record: OnceLock<Arc<SpanHandle>>,
}

impl Observation {
    /// A new, not-yet-started observation.
    pub fn new(name: impl Into<Cow<'static, str>>, kind: ObservationKind) -> Self {
        Observation {
            name: name.into(),
            kind,
            parent: None,
            manual_context: Mutex::new(None),
            contextual_name: Mutex::new(None),
            attributes: Mutex::new(AttributeBag::new()),
            record: OnceLock::new(),
        }
    }

    /// Nests this observation under an enclosing one.
    pub fn with_parent(mut self, parent: Arc<Observation>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Attaches an explicit span-bearing context that overrides all other
    /// parent candidates when the observation starts.
    pub fn attach_context(&self, cx: Context) {
        if let Ok(mut manual) = self.manual_context.lock() {
            *manual = Some(cx);
        }
    }

    /// Overrides the span name applied at stop.
    pub fn set_contextual_name(&self, name: impl Into<String>) {
        if let Ok(mut contextual) = self.contextual_name.lock() {
            *contextual = Some(name.into());
        }
    }

    /// Buffers a low-cardinality attribute.
    pub fn record_low(&self, attribute: KeyValue) {
        if let Ok(mut attributes) = self.attributes.lock() {
            attributes.put_low(attribute);
        }
    }

    /// Buffers a high-cardinality attribute.
    pub fn record_high(&self, attribute: KeyValue) {
        if let Ok(mut attributes) = self.attributes.lock() {
            attributes.put_high(attribute);
        }
    }

    /// The started span's context, once the observation has started.
    pub fn span_context(&self) -> Option<SpanContext> {
        self.record
            .get()
            .map(|record| record.span().span_context().clone())
    }

    fn enclosing_context(&self) -> Option<Context> {
        self.parent
            .as_ref()
            .and_then(|parent| parent.record.get())
            .map(|record| record.context().clone())
    }
}

impl std::fmt::Debug for Observation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observation")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("started", &self.record.get().is_some())
            .finish()
    }
}

/// Maps observation lifecycle events onto span operations.
pub struct ObservationHandler<T> {
    tracer: T,
}

impl<T> ObservationHandler<T>
where
    T: Tracer,
    T::Span: Send + Sync + 'static,
{
    /// A handler creating spans from the given tracer.
    pub fn new(tracer: T) -> Self {
        ObservationHandler { tracer }
    }

    /// Starts the observation's span. A second start is a no-op.
    ///
    /// Parent resolution: an explicitly attached context wins; otherwise
    /// the enclosing observation's span, unless a *different* span is
    /// active on the current thread, which then wins as a manually started
    /// nested span; otherwise the span is a root.
    pub fn on_start(&self, observation: &Observation) {
        if observation.record.get().is_some() {
            return;
        }

        let manual = observation
            .manual_context
            .lock()
            .ok()
            .and_then(|manual| manual.clone());
        let parent_cx = resolve_observation_parent(manual, observation.enclosing_context());

        let builder = self
            .tracer
            .span_builder(observation.name.clone())
            .with_kind(observation.kind.span_kind());
        let span = self.tracer.build_with_context(builder, &parent_cx);

        let record = Arc::new(SpanHandle::new(parent_cx.with_span(span)));
        let _ = observation.record.set(record);
    }

    /// Makes the observation's span current on the calling thread.
    ///
    /// Each thread that opens a scope must close it itself; the handle is
    /// filed under the observation's record on this thread only.
    pub fn on_scope_opened(&self, observation: &Observation) {
        match observation.record.get() {
            Some(record) => record.activate(),
            None => {
                otel_warn!(name: "ObservationHandler.ScopeOpenedBeforeStart");
            }
        }
    }

    /// Closes the scope the calling thread holds for this observation.
    ///
    /// A close without a matching open on this thread is logged and
    /// otherwise ignored; typical of double registration or an executor
    /// returning work to a thread that never entered the scope.
    pub fn on_scope_closed(&self, observation: &Observation) {
        let closed = observation
            .record
            .get()
            .map(|record| record.deactivate())
            .unwrap_or(false);
        if !closed {
            otel_warn!(name: "ObservationHandler.ScopeCloseWithoutActivation");
        }
    }

    /// Records an error on the span without ending it.
    ///
    /// Ending is `on_stop`'s exclusive responsibility; an errored
    /// observation still stops normally.
    pub fn on_error(&self, observation: &Observation, error: &(dyn StdError + 'static)) {
        if let Some(record) = observation.record.get() {
            let span = record.span();
            span.record_error(error);
            span.set_status(Status::error(error.to_string()));
        }
    }

    /// Copies the buffered attributes and final name onto the span and
    /// ends it. Exactly one stop wins; later calls are no-ops.
    pub fn on_stop(&self, observation: &Observation) {
        let Some(record) = observation.record.get() else {
            return;
        };
        record.finish_with(|span| {
            if let Ok(attributes) = observation.attributes.lock() {
                span.set_attributes(attributes.iter().cloned());
            }
            let contextual = observation
                .contextual_name
                .lock()
                .ok()
                .and_then(|name| name.clone());
            if let Some(name) = contextual {
                span.update_name(name);
            }
        });
    }
}
