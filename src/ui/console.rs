//! Console presentation using crossterm
//!
//! A character cell cannot show two glyphs at once, so the console keeps the
//! last glyph struck at each column and repaints the visible window of paper
//! on refresh. The platen is centred in the console.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::time::Duration;

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event, execute, queue,
    style::{Attribute, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use tracing::{debug, warn};
use unicode_width::UnicodeWidthChar;

use super::keymapper::KeyMapper;
use crate::config::PaperScheme;
use crate::core::contracts::{Frontend, Outbox, Presentation, UserEvent};

/// Drawn in place of glyphs that do not occupy exactly one cell
const SUBSTITUTE: char = '?';

/// Full-screen console frontend
pub struct ConsoleFrontend {
    outbox: Outbox,
    paper: PaperScheme,
    /// Platen width
    columns: usize,
    /// Fixed page height; 0 fits the console
    lines_override: usize,
    /// Console size (cols, rows)
    size: (u16, u16),
    /// Top glyph per line and column
    page: BTreeMap<usize, Vec<char>>,
    /// Lines struck since the last repaint
    dirty: BTreeSet<usize>,
    /// Scroll base of the last repaint
    last_base: Option<usize>,
    full_redraw: bool,
    initialized: bool,
}

impl ConsoleFrontend {
    pub fn new(outbox: Outbox, paper: PaperScheme, columns: usize, lines_override: usize) -> Self {
        let size = Self::size().unwrap_or((80, 24));
        Self {
            outbox,
            paper,
            columns: columns.max(1),
            lines_override,
            size,
            page: BTreeMap::new(),
            dirty: BTreeSet::new(),
            last_base: None,
            full_redraw: true,
            initialized: false,
        }
    }

    /// Replace the detected console size
    pub fn with_size(mut self, cols: u16, rows: u16) -> Self {
        self.size = (cols, rows);
        self.full_redraw = true;
        self
    }

    /// Get terminal size
    pub fn size() -> io::Result<(u16, u16)> {
        terminal::size()
    }

    /// Left margin that centres the platen
    fn margin(&self) -> usize {
        (self.size.0 as usize).saturating_sub(self.columns) / 2
    }

    /// Visible width of the paper, cut to the console
    fn paper_width(&self) -> usize {
        self.columns.min(self.size.0 as usize)
    }

    /// What a line of paper shows, padded to the paper width
    pub fn paper_row(&self, line: usize) -> String {
        let width = self.paper_width();
        let mut row: String = self
            .page
            .get(&line)
            .map(|glyphs| glyphs.iter().take(width).collect())
            .unwrap_or_default();
        let used = row.chars().count();
        row.extend(std::iter::repeat(' ').take(width - used));
        row
    }

    /// Text of the visible window, one line per row (for debugging)
    #[allow(dead_code)]
    pub fn snapshot(&self, scroll_base: usize) -> Vec<String> {
        (scroll_base..scroll_base + self.lines_per_screen())
            .map(|line| self.paper_row(line).trim_end().to_string())
            .collect()
    }

    /// Initialize the terminal for rendering
    fn enter(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            DisableLineWrap,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        stdout.flush()?;
        self.initialized = true;
        self.full_redraw = true;
        debug!("Console initialized at {}x{}", self.size.0, self.size.1);
        Ok(())
    }

    /// Cleanup the terminal
    fn leave(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let mut stdout = io::stdout();
        let _ = execute!(stdout, ResetColor, SetAttribute(Attribute::Reset));
        let _ = execute!(stdout, Show);
        let _ = execute!(stdout, EnableLineWrap);
        let _ = execute!(stdout, LeaveAlternateScreen);
        let _ = stdout.flush();

        terminal::disable_raw_mode()?;
        println!();
        Ok(())
    }

    /// Repaint the window starting at `scroll_base`
    fn render(&mut self, scroll_base: usize, cursor_line: usize, cursor_column: usize) -> io::Result<()> {
        let rows = self.lines_per_screen();
        let full = self.full_redraw || self.last_base != Some(scroll_base);
        let margin = self.margin();

        let stdout = io::stdout();
        let mut stdout = io::BufWriter::with_capacity(65536, stdout.lock());

        // Begin synchronized update (reduces flicker)
        write!(stdout, "\x1b[?2026h")?;
        queue!(stdout, Hide)?;
        if full {
            queue!(stdout, ResetColor, Clear(ClearType::All))?;
        }

        for row in 0..rows {
            let line = scroll_base + row;
            if !full && !self.dirty.contains(&line) {
                continue;
            }
            queue!(
                stdout,
                MoveTo(margin as u16, row as u16),
                SetBackgroundColor(self.paper.background.to_crossterm()),
                SetForegroundColor(self.paper.ink.to_crossterm()),
                Print(self.paper_row(line)),
                ResetColor
            )?;
        }

        if cursor_line >= scroll_base && cursor_line < scroll_base + rows {
            let x = (margin + cursor_column).min(self.size.0.saturating_sub(1) as usize);
            queue!(stdout, MoveTo(x as u16, (cursor_line - scroll_base) as u16), Show)?;
        }

        // End synchronized update
        write!(stdout, "\x1b[?2026l")?;
        stdout.flush()?;

        self.dirty.clear();
        self.last_base = Some(scroll_base);
        self.full_redraw = false;
        Ok(())
    }
}

impl Frontend for ConsoleFrontend {
    fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    fn draw_char(&mut self, line: usize, column: usize, ch: char) {
        let glyph = match ch.width() {
            Some(1) => ch,
            _ => SUBSTITUTE,
        };
        let cells = self.page.entry(line).or_default();
        if cells.len() <= column {
            cells.resize(column + 1, ' ');
        }
        cells[column] = glyph;
        self.dirty.insert(line);
    }

    fn refresh_screen(&mut self, scroll_base: usize, cursor_line: usize, cursor_column: usize) {
        if !self.initialized {
            return;
        }
        if let Err(e) = self.render(scroll_base, cursor_line, cursor_column) {
            warn!("Render failed: {}", e);
        }
    }

    fn lines_per_screen(&self) -> usize {
        let rows = (self.size.1 as usize).max(1);
        if self.lines_override > 0 {
            self.lines_override.min(rows)
        } else {
            rows
        }
    }

    fn reinit(&mut self) {
        self.page.clear();
        self.dirty.clear();
        self.full_redraw = true;
    }
}

impl Presentation for ConsoleFrontend {
    fn init(&mut self) -> io::Result<()> {
        self.enter()
    }

    fn cleanup(&mut self) -> io::Result<()> {
        self.leave()
    }

    fn poll_event(&mut self, timeout: Duration) -> io::Result<Option<UserEvent>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        let evt = event::read()?;
        if let event::Event::Resize(cols, rows) = evt {
            debug!("Console resized to {}x{}", cols, rows);
            self.size = (cols, rows);
            self.full_redraw = true;
        }
        Ok(KeyMapper::map_event(&evt))
    }
}

impl Drop for ConsoleFrontend {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::contracts::mailbox;

    fn console(cols: u16, rows: u16, lines: usize) -> ConsoleFrontend {
        let (outbox, _inbox) = mailbox();
        ConsoleFrontend::new(outbox, PaperScheme::canary(), 8, lines).with_size(cols, rows)
    }

    #[test]
    fn test_last_strike_wins() {
        let mut console = console(20, 5, 0);
        console.draw_char(0, 0, 'B');
        console.draw_char(0, 0, '_');
        console.draw_char(0, 3, 'X');
        assert_eq!(console.paper_row(0), "_  X    ");
        assert_eq!(console.paper_row(1), "        ");
    }

    #[test]
    fn test_wide_glyphs_substituted() {
        let mut console = console(20, 5, 0);
        console.draw_char(2, 1, '漢');
        assert_eq!(console.paper_row(2), " ?      ");
    }

    #[test]
    fn test_reinit_clears_page() {
        let mut console = console(20, 5, 0);
        console.draw_char(0, 0, 'A');
        console.reinit();
        assert_eq!(console.snapshot(0), vec![""; 5]);
    }

    #[test]
    fn test_lines_per_screen() {
        assert_eq!(console(80, 24, 0).lines_per_screen(), 24);
        assert_eq!(console(80, 24, 10).lines_per_screen(), 10);
        assert_eq!(console(80, 24, 66).lines_per_screen(), 24);
        assert_eq!(console(80, 0, 0).lines_per_screen(), 1);
    }

    #[test]
    fn test_platen_centred_and_cut() {
        assert_eq!(console(20, 5, 0).margin(), 6);
        let narrow = console(5, 5, 0);
        assert_eq!(narrow.margin(), 0);
        assert_eq!(narrow.paper_row(0).len(), 5);
    }

    #[test]
    fn test_refresh_before_init_is_ignored() {
        let mut console = console(20, 5, 0);
        console.draw_char(0, 0, 'A');
        console.refresh_screen(0, 0, 1);
        assert!(console.dirty.contains(&0));
    }
}
