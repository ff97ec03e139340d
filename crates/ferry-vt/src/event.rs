/// Notifications raised by the emulator while it parses PTY output.
///
/// Events are queued in the order the parser produced them and drained with
/// [`VtTerminal::take_events`](crate::VtTerminal::take_events).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VtEvent {
    /// The shell set the window title (OSC 0/2). A reset reports an empty title.
    TitleChanged(String),
    /// BEL was received.
    Bell,
    /// The program asked to place text on the clipboard (OSC 52 store).
    CopyToClipboard(String),
    /// The program asked for the clipboard contents (OSC 52 load).
    PasteFromClipboard,
}
