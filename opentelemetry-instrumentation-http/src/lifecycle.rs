//! Span records with exactly-once finish semantics.
//!
//! A boundary span can be ended from several racing paths: the inline
//! response hook, an asynchronous completion callback, a timeout or an error
//! listener. [`SpanHandle`] arbitrates those paths with a single atomic flag;
//! whichever caller wins the compare-and-set performs the one and only
//! `Span::end`, everyone else no-ops. Nothing on the finish path blocks.
//!
//! Activation (making the span current so that children pick it up as an
//! implicit parent) is a strictly thread-bound affair: the guard returned by
//! [`Context::attach`] restores the previous context when dropped and cannot
//! leave the thread that created it. Each thread therefore keeps its own map
//! from [`ScopeId`] to guard, and "close the scope I opened" becomes a lookup
//! in the current thread's map. An id that was never activated on this thread
//! simply is not found, which the callers treat as a benign condition.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use opentelemetry::trace::{SpanRef, TraceContextExt};
use opentelemetry::{Context, ContextGuard};

/// Process-unique identifier tying thread-bound activation guards to the
/// record that opened them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ScopeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

thread_local! {
    static ACTIVE_SCOPES: RefCell<HashMap<ScopeId, ContextGuard>> =
        RefCell::new(HashMap::new());
}

/// A span plus the state needed to activate and finish it exactly once.
///
/// The record holds the [`Context`] the span rides in for the entire
/// request/operation lifetime, so a child created late (even on a different
/// thread) can still resolve this span as its parent. It is typically shared
/// through an `Arc` stored in the request's property store.
pub struct SpanHandle {
    context: Context,
    scope: ScopeId,
    finished: AtomicBool,
}

impl SpanHandle {
    /// Wraps a span-bearing context in a fresh, unfinished record.
    pub fn new(context: Context) -> Self {
        SpanHandle {
            context,
            scope: ScopeId::next(),
            finished: AtomicBool::new(false),
        }
    }

    /// The context carrying this record's span (and any extracted baggage).
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// A reference to this record's span for attribute updates.
    pub fn span(&self) -> SpanRef<'_> {
        self.context.span()
    }

    /// The id under which activation guards for this record are filed.
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Makes this record's span current on the calling thread.
    ///
    /// The activation stays open until [`deactivate`](Self::deactivate) is
    /// called on the same thread. Re-activating on a thread that already has
    /// an open scope for this record replaces (and thereby closes) it.
    pub fn activate(&self) {
        let guard = self.context.clone().attach();
        ACTIVE_SCOPES.with(|scopes| scopes.borrow_mut().insert(self.scope, guard));
    }

    /// Closes the activation opened on the calling thread, if there is one.
    ///
    /// Returns whether a scope was actually open on this thread. Other
    /// threads' activations are untouched: a guard can only be released by
    /// the thread that owns it.
    pub fn deactivate(&self) -> bool {
        ACTIVE_SCOPES
            .with(|scopes| scopes.borrow_mut().remove(&self.scope))
            .is_some()
    }

    /// Whether this record has already been finished.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Ends the span if no other caller has done so yet.
    ///
    /// Returns `true` for the single caller that actually ended the span.
    pub fn finish(&self) -> bool {
        self.finish_with(|_| {})
    }

    /// Ends the span, letting the winning caller decorate it first.
    ///
    /// The flag transitions via compare-and-set, so when an inline response
    /// hook races an async completion callback only one of them runs its
    /// decoration and emits the end event; the loser returns `false` without
    /// touching the span.
    pub fn finish_with<F>(&self, decorate: F) -> bool
    where
        F: FnOnce(&SpanRef<'_>),
    {
        if self
            .finished
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let span = self.context.span();
        decorate(&span);
        span.end();
        true
    }
}

impl fmt::Debug for SpanHandle {
    // Context intentionally omitted; its contents are the tracing backend's.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanHandle")
            .field("scope", &self.scope)
            .field("finished", &self.is_finished())
            .finish()
    }
}
