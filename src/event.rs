//! Progress events emitted while a job runs.
//!
//! Backup and restore report what they are doing as a stream of
//! `{stage, message}` events instead of printing. The binary forwards them to
//! `tracing`; tests and embedders can collect them into a `Vec<Event>`.

use std::fmt;

/// The step of a job an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Inspect,
    Delete,
    Copy,
    Archive,
    Verify,
    Complete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Start => "start",
            Stage::Inspect => "inspect",
            Stage::Delete => "delete",
            Stage::Copy => "copy",
            Stage::Archive => "archive",
            Stage::Verify => "verify",
            Stage::Complete => "complete",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub stage: Stage,
    pub message: String,
}

impl Event {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// Receiver of job progress events.
pub trait Reporter {
    fn report(&mut self, event: Event);

    fn emit(&mut self, stage: Stage, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.report(Event::new(stage, message));
    }
}

/// Logs every event at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&mut self, event: Event) {
        tracing::info!(stage = %event.stage, "{}", event.message);
    }
}

impl Reporter for Vec<Event> {
    fn report(&mut self, event: Event) {
        self.push(event);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&mut self, _event: Event) {}
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn report(&mut self, event: Event) {
        (**self).report(event);
    }
}
