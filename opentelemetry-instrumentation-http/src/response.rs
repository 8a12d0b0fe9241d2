use std::error::Error as StdError;

use opentelemetry::trace::{SpanRef, Status};
use opentelemetry::KeyValue;
use opentelemetry_semantic_conventions::attribute::{ERROR_TYPE, HTTP_RESPONSE_STATUS_CODE};

/// What the host observed when a request or call completed.
///
/// Passed to the response hooks and to the async completion bridge; carries
/// at most a status code and the error that escaped the handler, if any.
/// The error is only recorded onto the span; surfacing it to the caller
/// remains entirely the host's business.
#[derive(Default)]
pub struct ResponseOutcome<'a> {
    status_code: Option<u16>,
    error: Option<&'a (dyn StdError + 'static)>,
}

impl<'a> ResponseOutcome<'a> {
    /// A completed exchange with the given status code.
    pub fn status(status_code: u16) -> Self {
        ResponseOutcome {
            status_code: Some(status_code),
            error: None,
        }
    }

    /// A completed exchange whose handler also raised an error.
    pub fn failure(status_code: u16, error: &'a (dyn StdError + 'static)) -> Self {
        ResponseOutcome {
            status_code: Some(status_code),
            error: Some(error),
        }
    }

    /// An exchange aborted before any status was produced.
    pub fn aborted(error: &'a (dyn StdError + 'static)) -> Self {
        ResponseOutcome {
            status_code: None,
            error: Some(error),
        }
    }

    /// The response status code, when one was produced.
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }
}

impl std::fmt::Debug for ResponseOutcome<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseOutcome")
            .field("status_code", &self.status_code)
            .field("error", &self.error.map(|e| e.to_string()))
            .finish()
    }
}

/// Copies the outcome onto the span. Server errors (5xx) and escaped
/// handler errors both mark the span as failed; client errors (4xx) are the
/// caller's problem and leave the span status untouched.
pub(crate) fn record_response(span: &SpanRef<'_>, outcome: &ResponseOutcome<'_>) {
    if let Some(code) = outcome.status_code {
        span.set_attribute(KeyValue::new(HTTP_RESPONSE_STATUS_CODE, i64::from(code)));
        if code >= 500 {
            span.set_attribute(KeyValue::new(ERROR_TYPE, code.to_string()));
            span.set_status(Status::error(format!("HTTP {code}")));
        }
    }
    if let Some(error) = outcome.error {
        span.record_error(error);
        span.set_status(Status::error(error.to_string()));
    }
}
