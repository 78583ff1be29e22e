//! Status events emitted while installing libraries
//!
//! Core operations never print directly. They report human-readable events
//! through a [`Reporter`], and the caller decides how to show them. Warnings
//! are informational and never change the outcome of a run; errors mark the
//! library they belong to as failed.

use std::sync::Mutex;

/// Kind of a status event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventKind {
    Info,
    Success,
    Warning,
    Error,
}

/// Receiver for status events
pub trait Reporter {
    fn report(&self, kind: EventKind, message: &str);

    fn info(&self, message: &str) {
        self.report(EventKind::Info, message);
    }

    fn success(&self, message: &str) {
        self.report(EventKind::Success, message);
    }

    fn warning(&self, message: &str) {
        self.report(EventKind::Warning, message);
    }

    fn error(&self, message: &str) {
        self.report(EventKind::Error, message);
    }
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, kind: EventKind, message: &str) {
        match kind {
            EventKind::Info | EventKind::Success => log::info!("{}", message),
            EventKind::Warning => log::warn!("{}", message),
            EventKind::Error => log::error!("{}", message),
        }
    }
}

/// Records events in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<(EventKind, String)>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events
    pub fn events(&self) -> Vec<(EventKind, String)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Messages of the given kind
    pub fn messages(&self, kind: EventKind) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, message)| message)
            .collect()
    }

    /// Whether any message of the given kind contains `needle`
    pub fn contains(&self, kind: EventKind, needle: &str) -> bool {
        self.messages(kind).iter().any(|m| m.contains(needle))
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, kind: EventKind, message: &str) {
        if let Ok(mut events) = self.events.lock() {
            events.push((kind, message.to_string()));
        }
    }
}

impl<R: Reporter + ?Sized> Reporter for &R {
    fn report(&self, kind: EventKind, message: &str) {
        (**self).report(kind, message);
    }
}

impl<R: Reporter + ?Sized> Reporter for Box<R> {
    fn report(&self, kind: EventKind, message: &str) {
        (**self).report(kind, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_reporter_records_in_order() {
        let reporter = MemoryReporter::new();
        reporter.info("Installing [SDL]...");
        reporter.warning("Pattern base path not found");
        reporter.success("[SDL] installed.");

        let events = reporter.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].0, EventKind::Info);
        assert_eq!(events[1].0, EventKind::Warning);
        assert_eq!(events[2], (EventKind::Success, "[SDL] installed.".to_string()));
    }

    #[test]
    fn test_memory_reporter_filters_by_kind() {
        let reporter = MemoryReporter::new();
        reporter.error("first");
        reporter.info("second");
        reporter.error("third");

        assert_eq!(reporter.messages(EventKind::Error), vec!["first", "third"]);
        assert!(reporter.contains(EventKind::Info, "sec"));
        assert!(!reporter.contains(EventKind::Warning, "sec"));
    }

    #[test]
    fn test_reporter_through_box() {
        let reporter: Box<dyn Reporter> = Box::new(LogReporter);
        // Must not panic without an installed logger.
        reporter.error("boxed");
    }

    #[test]
    fn test_event_kind_ordering() {
        assert!(EventKind::Warning < EventKind::Error);
        assert!(EventKind::Info < EventKind::Success);
    }
}
