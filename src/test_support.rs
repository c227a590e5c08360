//! Log capture for unit tests.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt as _};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LogRecord {
    pub level: Level,
    pub message: String,
}

/// Events recorded while a closure ran under [`with_logs`].
#[derive(Debug, Clone, Default)]
pub(crate) struct Logs(Arc<Mutex<Vec<LogRecord>>>);

impl Logs {
    pub(crate) fn records(&self) -> Vec<LogRecord> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn count(&self, level: Level, message: &str) -> usize {
        self.records()
            .iter()
            .filter(|r| r.level == level && r.message == message)
            .count()
    }

    pub(crate) fn count_level(&self, level: Level) -> usize {
        self.records().iter().filter(|r| r.level == level).count()
    }
}

struct Capture(Logs);

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for Capture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        (self.0).0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LogRecord {
                level: *event.metadata().level(),
                message: visitor.0,
            });
    }
}

/// Run `f` with a thread-local subscriber that records every event.
pub(crate) fn with_logs<R>(f: impl FnOnce() -> R) -> (R, Logs) {
    let logs = Logs::default();
    let subscriber = tracing_subscriber::registry().with(Capture(logs.clone()));
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs)
}
