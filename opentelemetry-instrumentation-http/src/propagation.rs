//! Trace context encoding and decoding over HTTP headers.
//!
//! The codec composes any number of [`TextMapPropagator`]s. Injection runs
//! them all; extraction feeds each propagator the context accumulated so
//! far, with the twist that the *first* propagator to yield a valid trace
//! context wins; a later propagator may still contribute baggage, but it
//! cannot displace an already-extracted span context. Decoding never fails:
//! absent or malformed headers leave the returned context without a valid
//! span context, which callers read as "start a new trace".

use std::fmt;

use http::HeaderMap;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::{SpanContext, TraceContextExt};
use opentelemetry::Context;
use opentelemetry_http::{HeaderExtractor, HeaderInjector};
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};

use crate::error::Error;

/// Encodes and decodes trace context to and from an HTTP header carrier.
pub struct PropagationCodec {
    propagators: Vec<Box<dyn TextMapPropagator + Send + Sync>>,
}

impl PropagationCodec {
    /// The default codec: W3C trace context plus W3C baggage.
    pub fn new() -> Self {
        PropagationCodec::with_propagators(vec![
            Box::new(TraceContextPropagator::new()),
            Box::new(BaggagePropagator::new()),
        ])
    }

    /// A codec over an explicit propagator chain, in extraction order.
    pub fn with_propagators(propagators: Vec<Box<dyn TextMapPropagator + Send + Sync>>) -> Self {
        PropagationCodec { propagators }
    }

    /// Resolves a codec from propagator names.
    ///
    /// Supported names are `tracecontext`, `baggage`, `jaeger` and `none`
    /// (which contributes nothing and exists so a list can be explicitly
    /// emptied). Anything else is rejected up front rather than silently
    /// dropped on the wire.
    pub fn from_names<'a, I>(names: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut propagators: Vec<Box<dyn TextMapPropagator + Send + Sync>> = Vec::new();
        for name in names {
            match name.trim() {
                "tracecontext" => propagators.push(Box::new(TraceContextPropagator::new())),
                "baggage" => propagators.push(Box::new(BaggagePropagator::new())),
                "jaeger" => {
                    propagators.push(Box::new(opentelemetry_jaeger_propagator::Propagator::new()))
                }
                "none" | "" => {}
                unknown => return Err(Error::UnknownPropagator(unknown.to_owned())),
            }
        }
        Ok(PropagationCodec::with_propagators(propagators))
    }

    /// Writes the propagation headers for `cx` into `headers`.
    pub fn inject(&self, cx: &Context, headers: &mut HeaderMap) {
        let mut injector = HeaderInjector(headers);
        for propagator in &self.propagators {
            propagator.inject_context(cx, &mut injector);
        }
    }

    /// Reads propagation headers into a fresh context.
    pub fn extract(&self, headers: &HeaderMap) -> Context {
        self.extract_with(&Context::new(), headers)
    }

    /// Reads propagation headers on top of an existing context.
    pub fn extract_with(&self, cx: &Context, headers: &HeaderMap) -> Context {
        let extractor = HeaderExtractor(headers);
        let mut current = cx.clone();
        let mut first_valid: Option<SpanContext> = None;

        for propagator in &self.propagators {
            current = propagator.extract_with_context(&current, &extractor);
            if first_valid.is_none() {
                let span = current.span();
                let span_context = span.span_context();
                if span_context.is_valid() {
                    first_valid = Some(span_context.clone());
                }
            }
        }

        match first_valid {
            Some(span_context) if *current.span().span_context() != span_context => {
                current.with_remote_span_context(span_context)
            }
            _ => current,
        }
    }
}

impl Default for PropagationCodec {
    fn default() -> Self {
        PropagationCodec::new()
    }
}

impl fmt::Debug for PropagationCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropagationCodec")
            .field("propagators", &self.propagators)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{HeaderName, HeaderValue};
    use opentelemetry::baggage::BaggageExt;
    use opentelemetry::trace::{SpanId, TraceFlags, TraceId, TraceState};

    fn headers(entries: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in entries {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        headers
    }

    fn span_context(trace_id: u128, span_id: u64) -> SpanContext {
        SpanContext::new(
            TraceId::from(trace_id),
            SpanId::from(span_id),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        )
    }

    #[test]
    fn round_trip_preserves_trace_and_span_ids() {
        let codec = PropagationCodec::new();
        let original = span_context(0x4bf9_2f35_77b3_4da6, 0x00f0_67aa_0ba9_02b7);
        let cx = Context::new().with_remote_span_context(original.clone());

        let mut carrier = HeaderMap::new();
        codec.inject(&cx, &mut carrier);
        let extracted = codec.extract(&carrier);
        let extracted = extracted.span().span_context().clone();

        assert_eq!(extracted.trace_id(), original.trace_id());
        assert_eq!(extracted.span_id(), original.span_id());
        assert!(extracted.is_remote());
    }

    #[test]
    fn malformed_traceparent_degrades_to_no_context() {
        let codec = PropagationCodec::new();

        for bad in [
            "not-a-traceparent",
            "00-00000000000000000000000000000000-0000000000000000-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7",
        ] {
            let carrier = headers(&[("traceparent", bad)]);
            let extracted = codec.extract(&carrier);
            assert!(
                !extracted.span().span_context().is_valid(),
                "{bad:?} must not yield a context"
            );
        }
    }

    #[test]
    fn absent_headers_degrade_to_no_context() {
        let codec = PropagationCodec::new();
        let extracted = codec.extract(&HeaderMap::new());
        assert!(!extracted.span().span_context().is_valid());
    }

    #[test]
    fn first_propagator_with_a_valid_context_wins() {
        let codec = PropagationCodec::from_names(["tracecontext", "jaeger"]).unwrap();
        let carrier = headers(&[
            (
                "traceparent",
                "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",
            ),
            ("uber-trace-id", "deadbeef:aaaabbbb:0:1"),
        ]);

        let extracted = codec.extract(&carrier);

        assert_eq!(
            extracted.span().span_context().trace_id(),
            TraceId::from(0x0af7_6519_16cd_43dd_8448_eb21_1c80_319c)
        );
    }

    #[test]
    fn baggage_extraction_is_independent_of_trace_context() {
        let codec = PropagationCodec::new();
        let carrier = headers(&[("baggage", "tenant=acme")]);

        let extracted = codec.extract(&carrier);

        assert!(!extracted.span().span_context().is_valid());
        assert_eq!(extracted.baggage().len(), 1);
    }

    #[test]
    fn unknown_propagator_name_is_rejected() {
        let err = PropagationCodec::from_names(["tracecontext", "pigeon"]).unwrap_err();
        assert!(matches!(err, Error::UnknownPropagator(name) if name == "pigeon"));
    }

    #[test]
    fn none_contributes_nothing() {
        let codec = PropagationCodec::from_names(["none"]).unwrap();
        let cx = Context::new().with_remote_span_context(span_context(7, 7));

        let mut carrier = HeaderMap::new();
        codec.inject(&cx, &mut carrier);

        assert!(carrier.is_empty());
    }
}
