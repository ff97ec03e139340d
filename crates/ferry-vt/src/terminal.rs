use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alacritty_terminal::event::{Event, EventListener};
use alacritty_terminal::grid::Dimensions;
use alacritty_terminal::term::{Config, Osc52, Term};
use alacritty_terminal::vte::ansi;

use crate::event::VtEvent;
use crate::screen::ScreenView;

/// Scrollback lines kept when the caller does not choose a bound.
pub const DEFAULT_SCROLLBACK: usize = 2000;

/// Shared event state captured from the terminal.
#[derive(Default)]
struct EventState {
    title: Option<String>,
    events: Vec<VtEvent>,
    pty_writes: Vec<String>,
}

/// Event proxy that captures terminal events.
///
/// Must be `Clone` because `Term` requires `T: EventListener`. We use interior
/// mutability via `Arc<Mutex<_>>`.
#[derive(Clone)]
pub struct EventProxy {
    state: Arc<Mutex<EventState>>,
}

impl EventProxy {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EventState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EventState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventListener for EventProxy {
    fn send_event(&self, event: Event) {
        let mut state = self.lock();
        match event {
            Event::Title(title) => {
                state.title = Some(title.clone());
                state.events.push(VtEvent::TitleChanged(title));
            }
            Event::ResetTitle => {
                state.title = None;
                state.events.push(VtEvent::TitleChanged(String::new()));
            }
            Event::Bell => {
                state.events.push(VtEvent::Bell);
            }
            Event::ClipboardStore(_, text) => {
                state.events.push(VtEvent::CopyToClipboard(text));
            }
            Event::ClipboardLoad(..) => {
                state.events.push(VtEvent::PasteFromClipboard);
            }
            Event::PtyWrite(data) => {
                state.pty_writes.push(data);
            }
            // Colors, cursor blinking and redraw hints are not relayed.
            _ => {}
        }
    }
}

/// Dimensions helper for creating / resizing the terminal.
struct TermSize {
    columns: usize,
    screen_lines: usize,
}

impl Dimensions for TermSize {
    fn total_lines(&self) -> usize {
        self.screen_lines
    }

    fn screen_lines(&self) -> usize {
        self.screen_lines
    }

    fn columns(&self) -> usize {
        self.columns
    }
}

/// The core terminal emulator.
///
/// Wraps `alacritty_terminal::Term` and a VTE parser. Scrollback is bounded by
/// the `scrollback` value given at construction; the oldest lines are evicted
/// once it is full.
pub struct VtTerminal {
    term: Term<EventProxy>,
    parser: ansi::Processor,
    event_proxy: EventProxy,
}

impl VtTerminal {
    /// Create a new terminal with the given dimensions and scrollback bound.
    pub fn new(cols: u16, rows: u16, scrollback: usize) -> Self {
        let config = Config {
            scrolling_history: scrollback,
            osc52: Osc52::CopyPaste,
            ..Config::default()
        };

        let size = TermSize {
            columns: cols.max(1) as usize,
            screen_lines: rows.max(1) as usize,
        };

        let event_proxy = EventProxy::new();
        let term = Term::new(config, &size, event_proxy.clone());

        Self {
            term,
            parser: ansi::Processor::new(),
            event_proxy,
        }
    }

    /// Feed raw PTY output bytes into the terminal.
    pub fn write(&mut self, bytes: &[u8]) {
        self.parser.advance(&mut self.term, bytes);
    }

    /// Resize the terminal to new dimensions. Zero is clamped to one.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        let size = TermSize {
            columns: cols.max(1) as usize,
            screen_lines: rows.max(1) as usize,
        };
        self.term.resize(size);
    }

    /// Get a read-only view of the terminal screen.
    pub fn screen(&self) -> ScreenView<'_> {
        ScreenView::new(&self.term)
    }

    /// Full transcript (scrollback followed by the visible screen) as text.
    pub fn transcript_text(&self) -> String {
        self.screen().transcript_text()
    }

    /// Get the current window title, if set by OSC escape sequences.
    pub fn title(&self) -> Option<String> {
        self.event_proxy.lock().title.clone()
    }

    /// Drain the notifications raised since the last call, oldest first.
    pub fn take_events(&mut self) -> Vec<VtEvent> {
        std::mem::take(&mut self.event_proxy.lock().events)
    }

    /// Drain any write-back data from the terminal (e.g., device status responses).
    ///
    /// The terminal sometimes needs to respond to queries by writing data back
    /// to the PTY. This method returns and clears that buffer.
    pub fn take_pty_writes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.event_proxy.lock().pty_writes)
    }
}
