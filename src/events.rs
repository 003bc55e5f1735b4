//! # Events
//!
//! Progress, log and completion notifications emitted by the scan engine
//! and the marker pipeline. Workers never touch UI state directly; they
//! talk to an [`Observer`].

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Receives notifications from a worker thread
///
/// `T` is the terminal payload: a [`ScanResult`](crate::matching::ScanResult)
/// for scans, a [`MarkerOutcome`](crate::marker::MarkerOutcome) for markers.
/// `on_finished` is called exactly once per run.
pub trait Observer<T>: Send + Sync {
    fn on_progress(&self, _percent: u8) {}

    fn on_log(&self, _level: LogLevel, _message: &str) {}

    fn on_finished(&self, _outcome: &T) {}
}

/// Observer that ignores everything
pub struct NullObserver;

impl<T> Observer<T> for NullObserver {}

impl<T, O: Observer<T> + ?Sized> Observer<T> for Arc<O> {
    fn on_progress(&self, percent: u8) {
        (**self).on_progress(percent)
    }

    fn on_log(&self, level: LogLevel, message: &str) {
        (**self).on_log(level, message)
    }

    fn on_finished(&self, outcome: &T) {
        (**self).on_finished(outcome)
    }
}

/// Typed event forwarded by [`ChannelObserver`]
#[derive(Debug, Clone, PartialEq)]
pub enum Event<T> {
    Progress(u8),
    Log(LogLevel, String),
    Finished(T),
}

/// Forwards every notification into a tokio channel
///
/// Sending on an unbounded channel never blocks, so the worker thread is
/// never held up by a slow consumer. A dropped receiver is ignored.
pub struct ChannelObserver<T> {
    sender: UnboundedSender<Event<T>>,
}

impl<T> ChannelObserver<T> {
    pub fn new(sender: UnboundedSender<Event<T>>) -> Self {
        Self { sender }
    }
}

impl<T: Clone + Send> Observer<T> for ChannelObserver<T> {
    fn on_progress(&self, percent: u8) {
        let _ = self.sender.send(Event::Progress(percent));
    }

    fn on_log(&self, level: LogLevel, message: &str) {
        let _ = self.sender.send(Event::Log(level, message.to_string()));
    }

    fn on_finished(&self, outcome: &T) {
        let _ = self.sender.send(Event::Finished(outcome.clone()));
    }
}

/// Mirrors observer log lines into `tracing` and filters progress
pub(crate) struct Reporter<'a, T> {
    observer: &'a dyn Observer<T>,
    last_progress: Option<u8>,
}

impl<'a, T> Reporter<'a, T> {
    pub(crate) fn new(observer: &'a dyn Observer<T>) -> Self {
        Self {
            observer,
            last_progress: None,
        }
    }

    pub(crate) fn info(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!("{}", message);
        self.observer.on_log(LogLevel::Info, message);
    }

    pub(crate) fn warn(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        warn!("{}", message);
        self.observer.on_log(LogLevel::Warn, message);
    }

    pub(crate) fn error(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        error!("{}", message);
        self.observer.on_log(LogLevel::Error, message);
    }

    /// Forward progress, dropping repeats and values that would go backwards
    pub(crate) fn progress(&mut self, percent: u8) {
        let percent = percent.min(100);
        if self.last_progress.is_some_and(|last| percent <= last) {
            return;
        }
        self.last_progress = Some(percent);
        self.observer.on_progress(percent);
    }

    pub(crate) fn finished(&self, outcome: &T) {
        self.observer.on_finished(outcome);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every notification for assertions
    pub(crate) struct RecordingObserver<T> {
        pub progress: Mutex<Vec<u8>>,
        pub logs: Mutex<Vec<(LogLevel, String)>>,
        pub finished: Mutex<Vec<T>>,
    }

    impl<T> RecordingObserver<T> {
        pub(crate) fn new() -> Self {
            Self {
                progress: Mutex::new(Vec::new()),
                logs: Mutex::new(Vec::new()),
                finished: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn progress(&self) -> Vec<u8> {
            self.progress.lock().unwrap().clone()
        }

        pub(crate) fn messages(&self) -> Vec<String> {
            self.logs.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
        }

        pub(crate) fn has_log(&self, level: LogLevel, needle: &str) -> bool {
            self.logs.lock().unwrap().iter().any(|(l, m)| *l == level && m.contains(needle))
        }
    }

    impl<T: Clone + Send> Observer<T> for RecordingObserver<T> {
        fn on_progress(&self, percent: u8) {
            self.progress.lock().unwrap().push(percent);
        }

        fn on_log(&self, level: LogLevel, message: &str) {
            self.logs.lock().unwrap().push((level, message.to_string()));
        }

        fn on_finished(&self, outcome: &T) {
            self.finished.lock().unwrap().push(outcome.clone());
        }
    }

    #[test]
    fn test_reporter_progress_is_monotonic() {
        let observer = RecordingObserver::<()>::new();
        let mut reporter: Reporter<()> = Reporter::new(&observer);

        for p in [0, 5, 5, 3, 40, 250] {
            reporter.progress(p);
        }

        assert_eq!(observer.progress(), vec![0, 5, 40, 100]);
    }

    #[test]
    fn test_reporter_logs_reach_observer() {
        let observer = RecordingObserver::<()>::new();
        let reporter: Reporter<()> = Reporter::new(&observer);

        reporter.info("hello");
        reporter.warn("careful");
        reporter.error("broken");

        assert!(observer.has_log(LogLevel::Info, "hello"));
        assert!(observer.has_log(LogLevel::Warn, "careful"));
        assert!(observer.has_log(LogLevel::Error, "broken"));
    }

    #[test]
    fn test_channel_observer_forwards_events() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let observer = ChannelObserver::new(tx);

        observer.on_progress(10);
        observer.on_log(LogLevel::Warn, "skipped");
        observer.on_finished(&7u32);

        assert_eq!(rx.try_recv().unwrap(), Event::Progress(10));
        assert_eq!(rx.try_recv().unwrap(), Event::Log(LogLevel::Warn, "skipped".to_string()));
        assert_eq!(rx.try_recv().unwrap(), Event::Finished(7));
    }

    #[test]
    fn test_channel_observer_survives_dropped_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Event<()>>();
        drop(rx);

        let observer = ChannelObserver::new(tx);
        observer.on_progress(50);
        observer.on_finished(&());
    }
}
