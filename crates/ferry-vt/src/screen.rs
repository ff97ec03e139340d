use alacritty_terminal::grid::{Dimensions, Row};
use alacritty_terminal::index::{Column, Line};
use alacritty_terminal::term::cell::{Cell, Flags};
use alacritty_terminal::term::Term;

use crate::terminal::EventProxy;

/// A read-only view into the terminal screen and its scrollback.
pub struct ScreenView<'a> {
    term: &'a Term<EventProxy>,
}

impl<'a> ScreenView<'a> {
    pub(crate) fn new(term: &'a Term<EventProxy>) -> Self {
        Self { term }
    }

    /// Number of visible rows.
    pub fn rows(&self) -> u16 {
        self.term.screen_lines() as u16
    }

    /// Number of columns.
    pub fn cols(&self) -> u16 {
        self.term.columns() as u16
    }

    /// Lines currently held in scrollback, above the visible screen.
    pub fn history_size(&self) -> usize {
        self.term.grid().history_size()
    }

    /// Text of a visible row with trailing blanks removed.
    ///
    /// Row 0 is the top of the visible screen. Out-of-range rows are empty.
    pub fn line_text(&self, row: u16) -> String {
        if (row as usize) >= self.term.screen_lines() {
            return String::new();
        }
        let (text, _) = row_text(&self.term.grid()[Line(row as i32)], self.term.columns());
        text.trim_end().to_string()
    }

    /// The whole transcript: scrollback then screen, one line per row.
    ///
    /// Soft-wrapped rows are joined back into a single line and the result is
    /// trimmed, so an empty terminal yields an empty string.
    pub fn transcript_text(&self) -> String {
        let grid = self.term.grid();
        let columns = grid.columns();
        let top = -(grid.history_size() as i32);
        let bottom = grid.screen_lines() as i32;

        let mut out = String::new();
        for line in top..bottom {
            let (text, wrapped) = row_text(&grid[Line(line)], columns);
            if wrapped {
                out.push_str(&text);
            } else {
                out.push_str(text.trim_end());
                out.push('\n');
            }
        }

        out.trim().to_string()
    }
}

/// Collect the characters of one grid row and whether it soft-wraps.
fn row_text(row: &Row<Cell>, columns: usize) -> (String, bool) {
    let mut text = String::with_capacity(columns);
    for col in 0..columns {
        let cell = &row[Column(col)];
        if cell
            .flags
            .intersects(Flags::WIDE_CHAR_SPACER | Flags::LEADING_WIDE_CHAR_SPACER)
        {
            continue;
        }
        text.push(cell.c);
    }

    let wrapped = columns > 0 && row[Column(columns - 1)].flags.contains(Flags::WRAPLINE);
    (text, wrapped)
}
