//! Outbound (client-side) boundary instrumentation.
//!
//! Mirrors the server filter for calls leaving the process: a client-kind
//! span is started before the request goes on the wire, the propagation
//! headers are injected into the outbound carrier, and the paired response
//! hook finishes the span. There is no asynchronous branch here: from the
//! calling code's perspective a client call always completes inline, even
//! when the transport underneath is asynchronous.

use std::sync::Arc;

use http::HeaderMap;
use opentelemetry::trace::{SpanKind, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};
use opentelemetry_semantic_conventions::attribute::{
    HTTP_REQUEST_METHOD, SERVER_ADDRESS, SERVER_PORT, URL_FULL, URL_SCHEME,
};
use url::Url;

use crate::config::InstrumentationConfig;
use crate::lifecycle::SpanHandle;
use crate::propagation::PropagationCodec;
use crate::properties::{keys, PropertyStore};
use crate::response::{record_response, ResponseOutcome};

/// Host-side view of an outbound call.
pub trait ClientRequest {
    /// HTTP request method.
    fn method(&self) -> &str;

    /// Full request URL.
    fn url(&self) -> &str;

    /// Logical operation name, when the host tracks one (used for span
    /// naming and for the suppression lookup).
    fn operation(&self) -> Option<&str> {
        None
    }

    /// The outbound headers, written as the propagation carrier.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Call-scoped storage shared between the paired hooks.
    fn properties(&self) -> &dyn PropertyStore;
}

/// Creates a client-kind span per outbound call and propagates its context
/// on the wire.
pub struct ClientFilter<T> {
    tracer: T,
    codec: PropagationCodec,
    config: InstrumentationConfig,
}

impl<T> ClientFilter<T>
where
    T: Tracer,
    T::Span: Send + Sync + 'static,
{
    /// A filter with default configuration and propagation.
    pub fn new(tracer: T) -> Self {
        ClientFilter::with_config(
            tracer,
            InstrumentationConfig::default(),
            PropagationCodec::default(),
        )
    }

    /// A filter with explicit configuration and propagation codec.
    pub fn with_config(
        tracer: T,
        config: InstrumentationConfig,
        codec: PropagationCodec,
    ) -> Self {
        ClientFilter {
            tracer,
            codec,
            config,
        }
    }

    /// Starts the client span and injects its context into the outbound
    /// headers.
    ///
    /// No-op when instrumentation is disabled, when the call carries the
    /// explicit suppression property, when the operation is registered as
    /// not traced, or when a record is already attached.
    ///
    /// The parent is an explicitly supplied context (under
    /// [`keys::CLIENT_PARENT_CONTEXT`]) when present, otherwise the calling
    /// thread's current context, which also decides between child and root.
    pub fn on_request(&self, request: &mut dyn ClientRequest) {
        if !self.config.enabled() {
            return;
        }
        if request.properties().get(keys::CLIENT_SUPPRESS).is_some() {
            return;
        }
        if let Some(operation) = request.operation() {
            if self.config.is_suppressed(operation) {
                return;
            }
        }
        if request.properties().get(keys::CLIENT_SPAN).is_some() {
            return;
        }

        let parent = request
            .properties()
            .get_as::<Context>(keys::CLIENT_PARENT_CONTEXT)
            .map(|cx| cx.as_ref().clone())
            .unwrap_or_else(Context::current);

        let name = request
            .operation()
            .map(str::to_owned)
            .unwrap_or_else(|| request.method().to_owned());
        let builder = self
            .tracer
            .span_builder(name)
            .with_kind(SpanKind::Client)
            .with_attributes(request_attributes(request));
        let span = self.tracer.build_with_context(builder, &parent);

        let record = Arc::new(SpanHandle::new(parent.with_span(span)));
        record.activate();
        self.codec.inject(record.context(), request.headers_mut());
        request.properties().set(keys::CLIENT_SPAN, record);
    }

    /// Finishes the client span with the observed outcome.
    pub fn on_response(&self, request: &dyn ClientRequest, outcome: &ResponseOutcome<'_>) {
        let Some(record) = request
            .properties()
            .get_as::<SpanHandle>(keys::CLIENT_SPAN)
        else {
            return;
        };
        record.deactivate();
        record.finish_with(|span| record_response(span, outcome));
    }
}

fn request_attributes(request: &dyn ClientRequest) -> Vec<KeyValue> {
    let mut attributes = vec![
        KeyValue::new(HTTP_REQUEST_METHOD, request.method().to_owned()),
        KeyValue::new(URL_FULL, request.url().to_owned()),
    ];
    if let Ok(url) = Url::parse(request.url()) {
        attributes.push(KeyValue::new(URL_SCHEME, url.scheme().to_owned()));
        if let Some(host) = url.host_str() {
            attributes.push(KeyValue::new(SERVER_ADDRESS, host.to_owned()));
        }
        if let Some(port) = url.port_or_known_default() {
            attributes.push(KeyValue::new(SERVER_PORT, i64::from(port)));
        }
    }
    attributes
}
