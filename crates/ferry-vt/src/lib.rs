//! ferry-vt: Terminal emulation engine for Ferry sessions.
//!
//! Wraps `alacritty_terminal` so the rest of Ferry never touches the emulator
//! directly. Shell output is parsed into a grid with bounded scrollback, the
//! whole transcript can be read back as plain text, and emulator notifications
//! (title, bell, clipboard) are queued as [`VtEvent`]s for the session layer.

pub mod event;
pub mod screen;
pub mod terminal;

pub use event::VtEvent;
pub use screen::ScreenView;
pub use terminal::{VtTerminal, DEFAULT_SCROLLBACK};
