//! Shell lifecycle events.
//!
//! Handlers are fire-and-forget: they observe, they can't fail the cycle.

use std::sync::{Arc, Mutex, PoisonError};

/// Receives lifecycle events from the execution session.
pub trait EventBus {
    /// A compiled unit is about to run.
    fn on_precommand(&mut self, _source: &str) {}

    /// A unit finished and its history record is final.
    fn on_postcommand(&mut self, _inp: &str, _rtn: Option<i32>, _out: Option<&str>, _ts: [f64; 2]) {
    }

    /// The working directory changed. `old` is `None` the first time.
    fn on_chdir(&mut self, _old: Option<&str>, _new: &str) {}
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEvents;

impl EventBus for NullEvents {}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEvents;

impl EventBus for TracingEvents {
    fn on_precommand(&mut self, source: &str) {
        tracing::debug!(source = source.trim_end(), "precommand");
    }

    fn on_postcommand(&mut self, inp: &str, rtn: Option<i32>, out: Option<&str>, ts: [f64; 2]) {
        tracing::debug!(
            inp = inp.trim_end(),
            rtn,
            out_len = out.map_or(0, str::len),
            elapsed = ts[1] - ts[0],
            "postcommand"
        );
    }

    fn on_chdir(&mut self, old: Option<&str>, new: &str) {
        tracing::info!(old, new, "working directory changed");
    }
}

/// One recorded event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// See [`EventBus::on_precommand`].
    Precommand {
        /// Source about to run.
        source: String,
    },
    /// See [`EventBus::on_postcommand`].
    Postcommand {
        /// Executed source.
        inp: String,
        /// Return code.
        rtn: Option<i32>,
        /// Output.
        out: Option<String>,
        /// Start and end.
        ts: [f64; 2],
    },
    /// See [`EventBus::on_chdir`].
    Chdir {
        /// Previous directory.
        old: Option<String>,
        /// New directory.
        new: String,
    },
}

/// Records events into a shared list. Clones share the list.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the events so far.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl EventBus for EventLog {
    fn on_precommand(&mut self, source: &str) {
        self.push(Event::Precommand {
            source: source.to_string(),
        });
    }

    fn on_postcommand(&mut self, inp: &str, rtn: Option<i32>, out: Option<&str>, ts: [f64; 2]) {
        self.push(Event::Postcommand {
            inp: inp.to_string(),
            rtn,
            out: out.map(str::to_string),
            ts,
        });
    }

    fn on_chdir(&mut self, old: Option<&str>, new: &str) {
        self.push(Event::Chdir {
            old: old.map(str::to_string),
            new: new.to_string(),
        });
    }
}
