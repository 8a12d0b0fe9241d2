//! Parent resolution for boundary and observation spans.
//!
//! Two distinct policies live here. The server-side policy decides between
//! the span already active on the handling thread, the context extracted
//! from the inbound carrier, and a fresh root. The observation-side policy
//! additionally honors a context the user attached by hand, which always
//! wins over anything the framework tracked.

use http::HeaderMap;
use opentelemetry::trace::{SpanContext, TraceContextExt};
use opentelemetry::Context;

use crate::config::InstrumentationConfig;
use crate::propagation::PropagationCodec;

/// The resolved parent of a span about to be started.
#[derive(Debug)]
pub enum ParentLink {
    /// No parent; the span starts a new trace.
    ///
    /// The carried context still holds whatever the carrier yielded besides
    /// a trace context (typically baggage), so it keeps riding along.
    Root(Context),

    /// A strict causal parent: the new span is a child in the same trace.
    Parent(Context),

    /// A local parent plus a non-causal reference to a related remote
    /// context that was deliberately not adopted as the trace parent.
    Linked(Context, SpanContext),
}

impl ParentLink {
    /// The context the new span should be built against.
    pub fn context(&self) -> &Context {
        match self {
            ParentLink::Root(cx) | ParentLink::Parent(cx) | ParentLink::Linked(cx, _) => cx,
        }
    }

    /// Consumes the resolution, yielding the parent context.
    pub fn into_context(self) -> Context {
        match self {
            ParentLink::Root(cx) | ParentLink::Parent(cx) | ParentLink::Linked(cx, _) => cx,
        }
    }

    /// The related remote context to record as a span link, if any.
    pub fn remote_reference(&self) -> Option<&SpanContext> {
        match self {
            ParentLink::Linked(_, remote) => Some(remote),
            _ => None,
        }
    }
}

/// Picks the parent for an inbound server span.
///
/// Ordered, first match wins:
///
/// 1. When `join_active_span` is enabled and a span is active on the current
///    thread, that span becomes the parent. A valid context extracted from
///    the carrier is then *not* adopted, only preserved as a link.
/// 2. A valid context extracted from the carrier becomes the parent.
/// 3. Root. Malformed propagation headers land here silently; a broken
///    upstream must never fail the request.
pub(crate) fn resolve_server_parent(
    config: &InstrumentationConfig,
    codec: &PropagationCodec,
    headers: &HeaderMap,
) -> ParentLink {
    let extracted = codec.extract(headers);
    let remote = {
        let span_context = extracted.span().span_context().clone();
        span_context.is_valid().then_some(span_context)
    };

    if config.join_active_span() {
        let current = Context::current();
        if current.span().span_context().is_valid() {
            return match remote {
                Some(remote) => ParentLink::Linked(current, remote),
                None => ParentLink::Parent(current),
            };
        }
    }

    match remote {
        Some(_) => ParentLink::Parent(extracted),
        None => ParentLink::Root(extracted),
    }
}

/// Picks the parent context for an observation span.
///
/// Ordered, first match wins:
///
/// 1. A context the user attached to the observation by hand.
/// 2. The enclosing observation's span, unless the span active on the
///    current thread is a *different* one, in which case the user started a
///    nested span the framework did not create, and that span wins.
/// 3. Root.
pub(crate) fn resolve_observation_parent(
    manual: Option<Context>,
    enclosing: Option<Context>,
) -> Context {
    if let Some(cx) = manual {
        return cx;
    }
    if let Some(candidate) = enclosing {
        let current = Context::current();
        let active = current.span().span_context().clone();
        if active.is_valid() && active != *candidate.span().span_context() {
            return current;
        }
        return candidate;
    }
    Context::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{SpanId, TraceContextExt, TraceId};

    fn remote_context(trace_id: u128, span_id: u64) -> Context {
        Context::new().with_remote_span_context(SpanContext::new(
            TraceId::from(trace_id),
            SpanId::from(span_id),
            Default::default(),
            true,
            Default::default(),
        ))
    }

    #[test]
    fn manual_context_wins_over_enclosing() {
        let manual = remote_context(1, 1);
        let enclosing = remote_context(2, 2);

        let resolved = resolve_observation_parent(Some(manual), Some(enclosing));

        assert_eq!(
            resolved.span().span_context().trace_id(),
            TraceId::from(1)
        );
    }

    #[test]
    fn enclosing_context_is_used_when_nothing_else_is_active() {
        let enclosing = remote_context(3, 3);

        let resolved = resolve_observation_parent(None, Some(enclosing));

        assert_eq!(
            resolved.span().span_context().trace_id(),
            TraceId::from(3)
        );
    }

    #[test]
    fn no_candidates_resolve_to_root() {
        let resolved = resolve_observation_parent(None, None);
        assert!(!resolved.span().span_context().is_valid());
    }

    #[test]
    fn differing_active_span_overrides_the_enclosing_candidate() {
        let enclosing = remote_context(4, 4);
        let active = remote_context(5, 5);
        let _guard = active.attach();

        let resolved = resolve_observation_parent(None, Some(enclosing));

        assert_eq!(
            resolved.span().span_context().trace_id(),
            TraceId::from(5)
        );
    }

    #[test]
    fn identical_active_span_keeps_the_enclosing_candidate() {
        let enclosing = remote_context(6, 6);
        let _guard = enclosing.clone().attach();

        let resolved = resolve_observation_parent(None, Some(enclosing));

        assert_eq!(
            resolved.span().span_context().span_id(),
            SpanId::from(6)
        );
    }
}
