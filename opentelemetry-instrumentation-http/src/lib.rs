//! Boundary instrumentation for HTTP request/response pipelines.
//!
//! This crate creates and finishes OpenTelemetry spans at the points where a
//! request enters or leaves a process, and carries trace context across those
//! boundaries:
//!
//! * [`ServerFilter`] wraps an inbound request in a server-kind span, resolving
//!   the parent from the propagation headers of the incoming carrier.
//! * [`ClientFilter`] wraps an outbound call in a client-kind span and injects
//!   the propagation headers into the outgoing carrier.
//! * [`AsyncCompletion`] finishes a server span for requests whose processing
//!   left the original dispatch thread, so completion, timeout and error paths
//!   all converge on a single span end.
//! * [`ObservationHandler`] maps a generic start/stop/scope lifecycle (e.g.
//!   messaging send/receive) onto the same span machinery.
//!
//! The crate is host-framework agnostic: frameworks adapt their request types
//! through the [`ServerRequest`] and [`ClientRequest`] traits and provide
//! request-scoped storage through [`PropertyStore`]. The tracing backend is
//! whatever [`Tracer`] the filters are constructed with.
//!
//! Every span started by a filter is finished exactly once, no matter whether
//! the response is produced inline, on another thread, or not at all because
//! the request timed out. The record attached to the request carries an atomic
//! finished flag; racing completion paths are resolved without locks.
//!
//! ```no_run
//! use http::HeaderMap;
//! use opentelemetry::global;
//! use opentelemetry_instrumentation_http::{
//!     Properties, PropertyStore, ResponseOutcome, ServerFilter, ServerRequest,
//! };
//!
//! struct Inbound {
//!     headers: HeaderMap,
//!     properties: Properties,
//! }
//!
//! impl ServerRequest for Inbound {
//!     fn method(&self) -> &str {
//!         "GET"
//!     }
//!     fn path(&self) -> &str {
//!         "/hello"
//!     }
//!     fn headers(&self) -> &HeaderMap {
//!         &self.headers
//!     }
//!     fn properties(&self) -> &dyn PropertyStore {
//!         &self.properties
//!     }
//! }
//!
//! let filter = ServerFilter::new(global::tracer("http-server"));
//! let request = Inbound {
//!     headers: HeaderMap::new(),
//!     properties: Properties::new(),
//! };
//!
//! filter.on_request(&request);
//! // ... dispatch to the application ...
//! filter.on_response(&request, &ResponseOutcome::status(200));
//! ```
//!
//! [`Tracer`]: opentelemetry::trace::Tracer

#![warn(missing_docs)]

pub mod attributes;
pub mod client;
pub mod completion;
pub mod config;
mod error;
pub mod lifecycle;
pub mod observation;
pub mod parent;
pub mod propagation;
pub mod properties;
mod response;
pub mod server;

pub use client::{ClientFilter, ClientRequest};
pub use completion::AsyncCompletion;
pub use config::{InstrumentationConfig, InstrumentationConfigBuilder};
pub use error::Error;
pub use lifecycle::{ScopeId, SpanHandle};
pub use observation::{Observation, ObservationHandler, ObservationKind};
pub use parent::ParentLink;
pub use propagation::PropagationCodec;
pub use properties::{keys, Properties, PropertyStore};
pub use response::ResponseOutcome;
pub use server::{ServerFilter, ServerRequest};
