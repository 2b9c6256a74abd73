use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Who needs to see a message at the end of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    /// The person who submitted the track
    Submitter,
    /// Staff who maintain the import
    Maintainer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub audience: Audience,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        write!(f, "{label}: {}", self.message)
    }
}

/// Messages gathered while processing one submission, handed back to the
/// caller instead of being kept in shared state. Every message is also
/// emitted through `tracing` when it is recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.push(Severity::Info, Audience::Submitter, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.push(Severity::Warning, Audience::Submitter, message);
    }

    /// A warning only staff need to act on
    pub fn warn_maintainer(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.push(Severity::Warning, Audience::Maintainer, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", message);
        self.push(Severity::Error, Audience::Maintainer, message);
    }

    fn push(&mut self, severity: Severity, audience: Audience, message: String) {
        self.entries.push(Diagnostic {
            severity,
            audience,
            message,
        });
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn for_audience(&self, audience: Audience) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.audience == audience)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.severity >= Severity::Warning)
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings().next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// One line per message, for receipts and email bodies
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collectors_are_independent() {
        let mut a = Diagnostics::new();
        let b = Diagnostics::new();
        a.warn("placeholder registration used");
        assert_eq!(a.len(), 1);
        assert!(b.is_empty());
    }

    #[test]
    fn test_merge_and_filter() {
        let mut a = Diagnostics::new();
        a.info("3 flight tracks imported");
        let mut b = Diagnostics::new();
        b.warn_maintainer("archive failed");
        b.error("insert failed");
        a.merge(b);

        assert_eq!(a.len(), 3);
        assert_eq!(a.for_audience(Audience::Maintainer).count(), 2);
        assert_eq!(a.warnings().count(), 2);
        assert_eq!(
            a.render(),
            "INFO: 3 flight tracks imported\nWARNING: archive failed\nERROR: insert failed"
        );
    }
}
