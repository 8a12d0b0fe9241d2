//! Static configuration for the boundary filters.
//!
//! Everything here is resolved once, when the filters are built. In
//! particular the set of suppressed client operations is a plain lookup at
//! call time; nothing is re-derived per request.

use std::borrow::Cow;
use std::collections::HashSet;

use regex::Regex;

use crate::error::Error;

/// Behavior switches shared by the server and client filters.
#[derive(Clone, Debug)]
pub struct InstrumentationConfig {
    enabled: bool,
    join_active_span: bool,
    operation_name: Option<Cow<'static, str>>,
    skip_pattern: Option<Regex>,
    suppressed_operations: HashSet<String>,
}

impl InstrumentationConfig {
    /// Starts building a configuration.
    pub fn builder() -> InstrumentationConfigBuilder {
        InstrumentationConfigBuilder::default()
    }

    pub(crate) fn enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn join_active_span(&self) -> bool {
        self.join_active_span
    }

    pub(crate) fn operation_name(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }

    pub(crate) fn should_skip(&self, path: &str) -> bool {
        self.skip_pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(path))
    }

    pub(crate) fn is_suppressed(&self, operation: &str) -> bool {
        self.suppressed_operations.contains(operation)
    }
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        InstrumentationConfig {
            enabled: true,
            join_active_span: false,
            operation_name: None,
            skip_pattern: None,
            suppressed_operations: HashSet::new(),
        }
    }
}

/// Builder for [`InstrumentationConfig`].
#[derive(Debug, Default)]
pub struct InstrumentationConfigBuilder {
    disabled: bool,
    join_active_span: bool,
    operation_name: Option<Cow<'static, str>>,
    skip_pattern: Option<String>,
    suppressed_operations: HashSet<String>,
}

impl InstrumentationConfigBuilder {
    /// Disables span creation entirely; the filters become pass-throughs.
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Parents inbound spans on a span already active on the handling
    /// thread, in preference to the propagated context of the carrier.
    pub fn with_join_active_span(mut self, join: bool) -> Self {
        self.join_active_span = join;
        self
    }

    /// Fixes the server span name instead of deriving it from the route.
    pub fn with_operation_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Suppresses spans for request paths matching this pattern, e.g.
    /// health or readiness probes.
    pub fn with_skip_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.skip_pattern = Some(pattern.into());
        self
    }

    /// Marks a client operation as not traced. Resolved here, once; the
    /// client filter only performs a set lookup per call.
    pub fn suppress_operation(mut self, operation: impl Into<String>) -> Self {
        self.suppressed_operations.insert(operation.into());
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<InstrumentationConfig, Error> {
        let skip_pattern = self.skip_pattern.as_deref().map(Regex::new).transpose()?;
        Ok(InstrumentationConfig {
            enabled: !self.disabled,
            join_active_span: self.join_active_span,
            operation_name: self.operation_name,
            skip_pattern,
            suppressed_operations: self.suppressed_operations,
        })
    }
}
