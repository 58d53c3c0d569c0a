//! Display events emitted by the session manager
//!
//! Events are ephemeral and consumed once; the sink (the display layer)
//! decides how to render them. Within one session the order is always:
//! started notice, transcript line, stopped notice.

use chrono::{DateTime, Local};

/// What kind of line the display should render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Status or error message from the manager itself
    SystemNotice,
    /// Transcript text for a finished session
    TranscriptLine,
}

/// One status or transcript notification
#[derive(Debug, Clone)]
pub struct DisplayEvent {
    pub kind: EventKind,
    pub text: String,
    pub timestamp: DateTime<Local>,
}

impl DisplayEvent {
    pub(crate) fn notice(text: impl Into<String>) -> Self {
        Self {
            kind: EventKind::SystemNotice,
            text: text.into(),
            timestamp: Local::now(),
        }
    }

    pub(crate) fn transcript(text: impl Into<String>) -> Self {
        Self {
            kind: EventKind::TranscriptLine,
            text: text.into(),
            timestamp: Local::now(),
        }
    }
}

/// Consumer of display events, implemented by the display layer
///
/// Called synchronously on whichever thread produced the event; in
/// practice that is always the controller thread, never the capture
/// worker. The core imposes no limit on event volume.
pub trait EventSink {
    fn on_event(&self, event: DisplayEvent);
}
