#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};

use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use opentelemetry_instrumentation_http::{ClientRequest, Properties, PropertyStore, ServerRequest};
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};

/// A tracer provider whose spans land in the returned in-memory exporter.
pub fn tracing_setup() -> (SdkTracerProvider, InMemorySpanExporter) {
    let exporter = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    (provider, exporter)
}

/// Builds a carrier holding a W3C `traceparent` header.
pub fn carrier_with_traceparent(trace_id: u128, span_id: u64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("traceparent"),
        HeaderValue::from_str(&format!("00-{trace_id:032x}-{span_id:016x}-01")).unwrap(),
    );
    headers
}

pub struct TestServerRequest {
    pub method: String,
    pub path: String,
    pub scheme: Option<String>,
    pub route: Option<String>,
    pub headers: HeaderMap,
    suspended: AtomicBool,
    properties: Properties,
}

impl TestServerRequest {
    pub fn get(path: &str) -> Self {
        TestServerRequest {
            method: "GET".to_owned(),
            path: path.to_owned(),
            scheme: Some("http".to_owned()),
            route: Some(path.to_owned()),
            headers: HeaderMap::new(),
            suspended: AtomicBool::new(false),
            properties: Properties::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn without_route(mut self) -> Self {
        self.route = None;
        self
    }

    /// Marks the request as having entered asynchronous processing.
    pub fn suspend(&self) {
        self.suspended.store(true, Ordering::SeqCst);
    }
}

impl ServerRequest for TestServerRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn properties(&self) -> &dyn PropertyStore {
        &self.properties
    }
}

pub struct TestClientRequest {
    pub method: String,
    pub url: String,
    pub operation: Option<String>,
    pub headers: HeaderMap,
    properties: Properties,
}

impl TestClientRequest {
    pub fn get(url: &str) -> Self {
        TestClientRequest {
            method: "GET".to_owned(),
            url: url.to_owned(),
            operation: None,
            headers: HeaderMap::new(),
            properties: Properties::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_owned());
        self
    }
}

impl ClientRequest for TestClientRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn properties(&self) -> &dyn PropertyStore {
        &self.properties
    }
}
