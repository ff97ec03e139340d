use ferry_vt::VtEvent;
use tokio::sync::mpsc;

/// Unique identifier for a terminal session.
pub type SessionId = String;

/// What happened in a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEventKind {
    /// The transcript changed; carries the whole current transcript text.
    TextChanged(String),
    TitleChanged(String),
    /// The shell process exited with this status.
    Finished(i32),
    Bell,
    CopyToClipboard(String),
    /// The program wants clipboard contents; the caller supplies them as input.
    PasteFromClipboard,
}

impl From<VtEvent> for SessionEventKind {
    fn from(event: VtEvent) -> Self {
        match event {
            VtEvent::TitleChanged(title) => SessionEventKind::TitleChanged(title),
            VtEvent::Bell => SessionEventKind::Bell,
            VtEvent::CopyToClipboard(text) => SessionEventKind::CopyToClipboard(text),
            VtEvent::PasteFromClipboard => SessionEventKind::PasteFromClipboard,
        }
    }
}

/// A session event tagged with the session it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionEvent {
    pub session_id: SessionId,
    pub kind: SessionEventKind,
}

/// Shared, bounded channel every session posts its events into.
pub type EventSink = mpsc::Sender<SessionEvent>;
