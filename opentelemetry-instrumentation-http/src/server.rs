//! Inbound (server-side) boundary instrumentation.
//!
//! The filter is driven by two paired hooks the host calls around its
//! dispatch: [`ServerFilter::on_request`] when a request arrives and
//! [`ServerFilter::on_response`] when the inline dispatch produced (or
//! failed to produce) a response. For requests that continue asynchronously
//! after the inline dispatch returns, the host additionally wires an
//! [`AsyncCompletion`] into its completion callbacks; see the `completion`
//! module for the contract.
//!
//! The two hooks may run on different threads. The activation opened on the
//! request thread is closed on whatever thread runs the response hook *only
//! if that thread opened it*; the guard is thread-bound, and a dispatch
//! hop simply leaves nothing to close.

use std::sync::Arc;

use http::HeaderMap;
use opentelemetry::trace::{Link, SpanKind, TraceContextExt, Tracer};
use opentelemetry::{otel_debug, KeyValue};
use opentelemetry_semantic_conventions::attribute::{
    HTTP_REQUEST_METHOD, HTTP_ROUTE, URL_PATH, URL_SCHEME,
};

use crate::completion::AsyncCompletion;
use crate::config::InstrumentationConfig;
use crate::lifecycle::SpanHandle;
use crate::parent::resolve_server_parent;
use crate::propagation::PropagationCodec;
use crate::properties::{keys, PropertyStore};
use crate::response::{record_response, ResponseOutcome};

/// Host-side view of an inbound request.
///
/// The host framework adapts its request type to this trait once; the
/// filter never sees the framework itself.
pub trait ServerRequest {
    /// HTTP request method.
    fn method(&self) -> &str;

    /// Request path as received on the wire.
    fn path(&self) -> &str;

    /// URI scheme, when known.
    fn scheme(&self) -> Option<&str> {
        None
    }

    /// The matched route template (e.g. `/users/{id}`), when the host has
    /// resolved one. May become available only by response time; the filter
    /// copes with either.
    fn route(&self) -> Option<&str> {
        None
    }

    /// Whether request processing has been handed off asynchronously and
    /// will complete after the inline dispatch returns.
    fn is_suspended(&self) -> bool {
        false
    }

    /// The inbound headers, read as the propagation carrier.
    fn headers(&self) -> &HeaderMap;

    /// Request-scoped storage shared between the paired hooks.
    fn properties(&self) -> &dyn PropertyStore;
}

/// Creates a server-kind span per inbound request and finishes it when the
/// request/response cycle completes.
pub struct ServerFilter<T> {
    tracer: T,
    codec: PropagationCodec,
    config: InstrumentationConfig,
}

impl<T> ServerFilter<T>
where
    T: Tracer,
    T::Span: Send + Sync + 'static,
{
    /// A filter with default configuration and propagation.
    pub fn new(tracer: T) -> Self {
        ServerFilter::with_config(
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
        ServerFilter {
            tracer,
            codec,
            config,
        }
    }

    /// Starts the server span for an arriving request.
    ///
    /// No-op when instrumentation is disabled, when a span record is
    /// already attached (a second registration of the same filter must not
    /// double-instrument the request), or when the path matches the
    /// configured skip pattern.
    pub fn on_request(&self, request: &dyn ServerRequest) {
        if !self.config.enabled() {
            return;
        }
        if request.properties().get(keys::SERVER_SPAN).is_some() {
            return;
        }
        if self.config.should_skip(request.path()) {
            otel_debug!(name: "ServerFilter.SkipPatternMatched");
            return;
        }

        let parent = resolve_server_parent(&self.config, &self.codec, request.headers());
        let remote_link = parent.remote_reference().cloned();

        let mut builder = self
            .tracer
            .span_builder(self.operation_name(request))
            .with_kind(SpanKind::Server)
            .with_attributes(request_attributes(request));
        if let Some(remote) = remote_link {
            builder = builder.with_links(vec![Link::with_context(remote)]);
        }

        let parent_cx = parent.into_context();
        let span = self.tracer.build_with_context(builder, &parent_cx);
        let record = Arc::new(SpanHandle::new(parent_cx.with_span(span)));
        record.activate();
        request.properties().set(keys::SERVER_SPAN, record);
    }

    /// Completes the inline half of the request cycle.
    ///
    /// Closes the activation this thread may hold and, unless the request
    /// is suspended in asynchronous processing, finishes the span with the
    /// response attributes. For suspended requests the span stays open and
    /// the [`AsyncCompletion`] obtained from
    /// [`async_completion`](Self::async_completion) finishes it.
    pub fn on_response(&self, request: &dyn ServerRequest, outcome: &ResponseOutcome<'_>) {
        let Some(record) = request
            .properties()
            .get_as::<SpanHandle>(keys::SERVER_SPAN)
        else {
            return;
        };

        if self.config.operation_name().is_none() {
            // Sub-resource locators may resolve the route only during
            // dispatch; pick the better name up now.
            if let Some(route) = request.route() {
                record
                    .span()
                    .update_name(format!("{} {}", request.method(), route));
            }
        }

        record.deactivate();
        if request.is_suspended() {
            return;
        }
        record.finish_with(|span| record_response(span, outcome));
    }

    /// The completion bridge for a request that went asynchronous.
    ///
    /// `None` when no span record is attached (skipped or never-seen
    /// request).
    pub fn async_completion(&self, request: &dyn ServerRequest) -> Option<AsyncCompletion> {
        request
            .properties()
            .get_as::<SpanHandle>(keys::SERVER_SPAN)
            .map(AsyncCompletion::new)
    }

    /// Span name tie-break: configured static name, then `METHOD route`,
    /// then the bare method when no route template is known.
    fn operation_name(&self, request: &dyn ServerRequest) -> String {
        if let Some(name) = self.config.operation_name() {
            return name.to_owned();
        }
        match request.route() {
            Some(route) => format!("{} {}", request.method(), route),
            None => request.method().to_owned(),
        }
    }
}

fn request_attributes(request: &dyn ServerRequest) -> Vec<KeyValue> {
    let mut attributes = vec![
        KeyValue::new(HTTP_REQUEST_METHOD, request.method().to_owned()),
        KeyValue::new(URL_PATH, request.path().to_owned()),
    ];
    if let Some(scheme) = request.scheme() {
        attributes.push(KeyValue::new(URL_SCHEME, scheme.to_owned()));
    }
    if let Some(route) = request.route() {
        attributes.push(KeyValue::new(HTTP_ROUTE, route.to_owned()));
    }
    attributes
}
