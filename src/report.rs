//! Owned error values carried through the dispatch pipeline.
//!
//! Sinks receive errors as plain data rather than live `&dyn Error` references
//! so that reports can be cloned into detached delivery tasks and wrapped
//! without mutating the caller's error.

use std::error::Error;
use std::fmt;

/// An error report: a message, an optional originating component, and an
/// optional cause chain.
///
/// The cause chain mirrors `std::error::Error::source()`: outermost first,
/// innermost last. The deduplicator derives its signature from this chain, so
/// two reports with the same messages (and the same innermost component)
/// coalesce even when they were built from distinct error values.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorReport {
    message: String,
    source_component: Option<String>,
    cause: Option<Box<ErrorReport>>,
}

impl ErrorReport {
    /// Create a report with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), source_component: None, cause: None }
    }

    /// Attach the component that raised the error (e.g. a module or service
    /// name). Only the innermost report's component participates in the
    /// deduplication signature.
    pub fn with_source(mut self, component: impl Into<String>) -> Self {
        self.source_component = Some(component.into());
        self
    }

    /// Attach a cause, making `self` the outer report.
    pub fn caused_by(mut self, cause: ErrorReport) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Build a report from any `std::error::Error`, walking `source()` into a
    /// cause chain.
    pub fn from_error(error: &(dyn Error + 'static)) -> Self {
        let mut report = ErrorReport::new(error.to_string());
        if let Some(source) = error.source() {
            report.cause = Some(Box::new(ErrorReport::from_error(source)));
        }
        report
    }

    /// The report's own message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The component that raised the error, if recorded.
    pub fn source_component(&self) -> Option<&str> {
        self.source_component.as_deref()
    }

    /// The direct cause, if any.
    pub fn cause(&self) -> Option<&ErrorReport> {
        self.cause.as_deref()
    }

    /// The innermost report in the cause chain (`self` when there is none).
    pub fn root_cause(&self) -> &ErrorReport {
        let mut current = self;
        while let Some(cause) = current.cause.as_deref() {
            current = cause;
        }
        current
    }

    /// Iterate the chain outermost to innermost, `self` included.
    pub fn chain(&self) -> Chain<'_> {
        Chain { next: Some(self) }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(cause) = self.cause.as_deref() {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

impl<E: Error + 'static> From<&E> for ErrorReport {
    fn from(error: &E) -> Self {
        ErrorReport::from_error(error)
    }
}

/// Iterator over a report's cause chain.
#[derive(Debug, Clone)]
pub struct Chain<'a> {
    next: Option<&'a ErrorReport>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a ErrorReport;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.cause();
        Some(current)
    }
}
