//! Leveled feedback and progress reporting for running operations.
//!
//! Worker code reports through a [`FeedbackChannel`]; the display side
//! observes through a [`FeedbackSink`]. Keeping emission separate from
//! display lets operation bodies run and be asserted on headlessly.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::cancel::CancelToken;

/// Message severity levels, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        };
        write!(f, "{name}")
    }
}

/// One entry in the append-only feedback log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackMessage {
    /// Severity level of this entry.
    pub severity: Severity,
    /// Message text.
    pub text: String,
}

impl FeedbackMessage {
    /// Creates a message.
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
        }
    }
}

/// Display-side consumer of feedback. Implementations must be cheap; they
/// run on the worker thread.
pub trait FeedbackSink: Send + Sync {
    /// A message was appended to the log.
    fn message(&self, message: &FeedbackMessage) {
        let _ = message;
    }

    /// Progress moved to a new integer percentage.
    fn progress(&self, percent: u8) {
        let _ = percent;
    }
}

struct Inner {
    log: Mutex<Vec<FeedbackMessage>>,
    /// Current progress in integer percent, plus the last percent the sink
    /// was notified of (writes that round to the same percent coalesce).
    progress: AtomicU32,
    notified: AtomicU32,
    sink: Mutex<Option<Arc<dyn FeedbackSink>>>,
}

/// Structured logging and progress sink for one operation run.
///
/// Clones share the same log, progress value, and cancellation mirror. The
/// worker is the only writer of progress; the foreground only observes.
#[derive(Clone)]
pub struct FeedbackChannel {
    inner: Arc<Inner>,
    cancel: CancelToken,
}

impl FeedbackChannel {
    /// Creates a channel mirroring the given cancellation token.
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                log: Mutex::new(Vec::new()),
                progress: AtomicU32::new(0),
                notified: AtomicU32::new(0),
                sink: Mutex::new(None),
            }),
            cancel,
        }
    }

    /// Installs (or replaces) the display sink.
    pub fn set_sink(&self, sink: Arc<dyn FeedbackSink>) {
        *self.inner.sink.lock().expect("sink lock poisoned") = Some(sink);
    }

    /// Appends a debug-severity message.
    pub fn debug(&self, text: impl Into<String>) {
        self.push(Severity::Debug, text.into());
    }

    /// Appends an info-severity message.
    pub fn info(&self, text: impl Into<String>) {
        self.push(Severity::Info, text.into());
    }

    /// Appends a warning-severity message.
    pub fn warning(&self, text: impl Into<String>) {
        self.push(Severity::Warning, text.into());
    }

    /// Appends an error-severity message.
    pub fn error(&self, text: impl Into<String>) {
        self.push(Severity::Error, text.into());
    }

    /// Appends a critical-severity message.
    pub fn critical(&self, text: impl Into<String>) {
        self.push(Severity::Critical, text.into());
    }

    /// Current progress in percent, 0..=100.
    pub fn progress(&self) -> u8 {
        let value = self.inner.progress.load(Ordering::SeqCst);
        u8::try_from(value.min(100)).unwrap_or(100)
    }

    /// Sets progress. The value is clamped to `[0, 100]`; the sink is only
    /// notified when the value rounds to a different integer percent than
    /// the previous notification, so tight loops may write freely.
    pub fn set_progress(&self, value: f64) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percent = value.clamp(0.0, 100.0).round() as u32;
        self.inner.progress.store(percent, Ordering::SeqCst);
        let previous = self.inner.notified.swap(percent, Ordering::SeqCst);
        if previous != percent {
            self.notify_progress(percent);
        }
    }

    /// Resets progress to 0 and notifies the sink unconditionally.
    ///
    /// This is the visible bar reset on cancel. It is a named operation on
    /// purpose: cancellation itself does not touch progress.
    pub fn reset_progress(&self) {
        self.inner.progress.store(0, Ordering::SeqCst);
        self.inner.notified.store(0, Ordering::SeqCst);
        self.notify_progress(0);
    }

    /// Mirrors the cancellation token so step bodies can branch without a
    /// reference to the controller.
    pub fn canceled(&self) -> bool {
        self.cancel.is_canceled()
    }

    /// Snapshot of the log so far, in emission order.
    pub fn messages(&self) -> Vec<FeedbackMessage> {
        self.inner.log.lock().expect("log lock poisoned").clone()
    }

    /// Number of messages at or above `severity`.
    pub fn count_at_least(&self, severity: Severity) -> usize {
        self.inner
            .log
            .lock()
            .expect("log lock poisoned")
            .iter()
            .filter(|m| m.severity >= severity)
            .count()
    }

    fn push(&self, severity: Severity, text: String) {
        let message = FeedbackMessage { severity, text };
        self.inner
            .log
            .lock()
            .expect("log lock poisoned")
            .push(message.clone());
        if let Some(sink) = self.inner.sink.lock().expect("sink lock poisoned").as_ref() {
            sink.message(&message);
        }
    }

    fn notify_progress(&self, percent: u32) {
        if let Some(sink) = self.inner.sink.lock().expect("sink lock poisoned").as_ref() {
            sink.progress(u8::try_from(percent.min(100)).unwrap_or(100));
        }
    }
}

impl Default for FeedbackChannel {
    fn default() -> Self {
        Self::new(CancelToken::new())
    }
}

impl std::fmt::Debug for FeedbackChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackChannel")
            .field("progress", &self.progress())
            .field("canceled", &self.canceled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<FeedbackMessage>>,
        percents: Mutex<Vec<u8>>,
    }

    impl FeedbackSink for RecordingSink {
        fn message(&self, message: &FeedbackMessage) {
            self.messages.lock().unwrap().push(message.clone());
        }

        fn progress(&self, percent: u8) {
            self.percents.lock().unwrap().push(percent);
        }
    }

    #[test]
    fn test_messages_keep_emission_order() {
        let channel = FeedbackChannel::default();
        channel.info("one");
        channel.warning("two");
        channel.error("three");

        let log = channel.messages();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].text, "one");
        assert_eq!(log[1].severity, Severity::Warning);
        assert_eq!(log[2].severity, Severity::Error);
    }

    #[test]
    fn test_progress_coalesces_to_integer_percent() {
        let channel = FeedbackChannel::default();
        let sink = Arc::new(RecordingSink::default());
        channel.set_sink(sink.clone());

        channel.set_progress(10.2);
        channel.set_progress(10.4); // rounds to the same percent
        channel.set_progress(10.6);
        channel.set_progress(100.0);

        assert_eq!(*sink.percents.lock().unwrap(), vec![10, 11, 100]);
        assert_eq!(channel.progress(), 100);
    }

    #[test]
    fn test_reset_progress_always_notifies() {
        let channel = FeedbackChannel::default();
        let sink = Arc::new(RecordingSink::default());
        channel.set_sink(sink.clone());

        channel.set_progress(40.0);
        channel.reset_progress();
        channel.reset_progress();

        assert_eq!(*sink.percents.lock().unwrap(), vec![40, 0, 0]);
        assert_eq!(channel.progress(), 0);
    }

    #[test]
    fn test_canceled_mirrors_token() {
        let token = CancelToken::new();
        let channel = FeedbackChannel::new(token.clone());
        assert!(!channel.canceled());
        token.request_cancel();
        assert!(channel.canceled());
    }

    #[test]
    fn test_progress_clamped() {
        let channel = FeedbackChannel::default();
        channel.set_progress(250.0);
        assert_eq!(channel.progress(), 100);
        channel.set_progress(-5.0);
        assert_eq!(channel.progress(), 0);
    }
}
