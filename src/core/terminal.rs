//! Teletype terminal engine
//!
//! Tracks the print head (line, column), the scroll base of the visible page
//! and the paper itself: a sparse map from line index to overstruck [`Line`].
//! Output never fails; every transition is in memory and the frontend is told
//! what to draw.

use std::collections::BTreeMap;

use super::contracts::Frontend;
use super::line::{is_printable, next_tab_stop, Line};

/// Platen width of an ASR-33
pub const DEFAULT_COLUMNS: usize = 72;

/// Fold to the upper case only machine. Only the 7-bit alphabet is folded.
pub fn fold_upper(ch: char) -> char {
    ch.to_ascii_uppercase()
}

/// Terminal state for one session
pub struct Terminal<F: Frontend> {
    width: usize,
    line: usize,
    column: usize,
    scroll_base: usize,
    max_line: usize,
    lines: BTreeMap<usize, Line>,
    frontend: F,
}

impl<F: Frontend> Terminal<F> {
    pub fn new(frontend: F, width: usize) -> Self {
        Self {
            width: width.max(1),
            line: 0,
            column: 0,
            scroll_base: 0,
            max_line: 0,
            lines: BTreeMap::new(),
            frontend,
        }
    }

    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    pub fn frontend_mut(&mut self) -> &mut F {
        &mut self.frontend
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Print head position as (line, column)
    pub fn cursor(&self) -> (usize, usize) {
        (self.line, self.column)
    }

    pub fn scroll_base(&self) -> usize {
        self.scroll_base
    }

    /// Highest line the print head has reached since the last reinit
    pub fn max_line(&self) -> usize {
        self.max_line
    }

    pub fn line(&self, index: usize) -> Option<&Line> {
        self.lines.get(&index)
    }

    pub fn lines(&self) -> &BTreeMap<usize, Line> {
        &self.lines
    }

    fn lines_per_screen(&self) -> usize {
        self.frontend.lines_per_screen().max(1)
    }

    /// Discard all paper and return to the origin
    pub fn reinit(&mut self) {
        self.frontend.reinit();
        self.line = 0;
        self.column = 0;
        self.scroll_base = 0;
        self.max_line = 0;
        self.lines.clear();
    }

    /// Print one character and refresh
    pub fn output_char(&mut self, ch: char) {
        self.step(ch);
        self.refresh_screen();
    }

    /// Print a run of characters in order, refreshing once at the end
    pub fn output_chars(&mut self, text: &str) {
        for ch in text.chars() {
            self.step(ch);
        }
        self.refresh_screen();
    }

    fn step(&mut self, ch: char) {
        match ch {
            '\n' => self.line += 1,
            '\r' => self.column = 0,
            '\t' => self.column = next_tab_stop(self.column),
            '\x08' => self.column = self.column.saturating_sub(1),
            '\x0c' => self.reinit(),
            c if is_printable(c) => {
                let c = fold_upper(c);
                let (line, column) = (self.line, self.column);
                self.lines.entry(line).or_default().place_char(column, c);
                if c != ' ' {
                    self.frontend.draw_char(line, column, c);
                }
                self.column += 1;
            }
            _ => {}
        }
        self.constrain_cursor();
        self.scroll_into_view();
    }

    fn constrain_cursor(&mut self) {
        self.column = self.column.min(self.width - 1);
        self.max_line = self.max_line.max(self.line);
    }

    /// Move the scroll base the least distance that shows the print head
    pub fn scroll_into_view(&mut self) {
        let lines = self.lines_per_screen();
        if self.line < self.scroll_base {
            self.scroll_base = self.line;
        }
        if self.line >= self.scroll_base + lines {
            self.scroll_base = self.line + 1 - lines;
        }
    }

    pub fn refresh_screen(&mut self) {
        self.frontend
            .refresh_screen(self.scroll_base, self.line, self.column);
    }

    /// Roll the paper forward half a page
    pub fn page_down(&mut self) {
        self.scroll_base += self.lines_per_screen() / 2;
        self.constrain_scroll();
        self.refresh_screen();
    }

    /// Roll the paper back half a page
    pub fn page_up(&mut self) {
        self.scroll_base = self.scroll_base.saturating_sub(self.lines_per_screen() / 2);
        self.constrain_scroll();
        self.refresh_screen();
    }

    /// Keep the print head on the visible page: the page may be rolled
    /// forward until the head's line is at the top, and back until it is at
    /// the bottom.
    fn constrain_scroll(&mut self) {
        let lowest = (self.line + 1).saturating_sub(self.lines_per_screen());
        self.scroll_base = self.scroll_base.clamp(lowest, self.line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::contracts::mailbox;
    use crate::core::contracts::testing::{RecordingFrontend, Refresh};
    use proptest::prelude::*;

    fn terminal(lines: usize) -> Terminal<RecordingFrontend> {
        let (outbox, _inbox) = mailbox();
        Terminal::new(RecordingFrontend::new(outbox, lines), DEFAULT_COLUMNS)
    }

    #[test]
    fn test_printable_folds_and_draws() {
        let mut term = terminal(24);
        term.output_chars("hi {x}");
        assert_eq!(term.frontend().drawn_text(), "HI{X}");
        assert_eq!(term.frontend().draws[0], (0, 0, 'H'));
        assert_eq!(term.frontend().draws[2], (0, 3, '{'));
        assert_eq!(term.cursor(), (0, 6));
        assert_eq!(term.line(0).unwrap().extents()[0].text(), "HI {X}");
    }

    #[test]
    fn test_control_characters() {
        let mut term = terminal(24);
        term.output_chars("abc\r");
        assert_eq!(term.cursor(), (0, 0));
        term.output_chars("\n");
        assert_eq!(term.cursor(), (1, 0));
        term.output_chars("\t");
        assert_eq!(term.cursor(), (1, 8));
        term.output_chars("\x08\x08");
        assert_eq!(term.cursor(), (1, 6));
        term.output_chars("\x07");
        assert_eq!(term.cursor(), (1, 6));
    }

    #[test]
    fn test_batch_refreshes_once() {
        let mut term = terminal(24);
        term.output_chars("hello\r\nworld");
        assert_eq!(term.frontend().refreshes.len(), 1);
        assert_eq!(
            term.frontend().last_refresh(),
            Some(Refresh {
                scroll_base: 0,
                cursor_line: 1,
                cursor_column: 5
            })
        );

        term.output_char('!');
        assert_eq!(term.frontend().refreshes.len(), 2);
    }

    #[test]
    fn test_batch_overstrikes_in_order() {
        let mut term = terminal(24);
        term.output_chars("bold\rbold");
        let line = term.line(0).unwrap();
        assert_eq!(line.extents().len(), 1);
        assert_eq!(line.glyphs_at(0), Some("BB"));
        assert_eq!(term.frontend().draws.len(), 8);
    }

    #[test]
    fn test_column_clamps_at_right_margin() {
        let mut term = terminal(24);
        term.output_chars(&"x".repeat(100));
        assert_eq!(term.cursor(), (0, DEFAULT_COLUMNS - 1));
        assert_eq!(term.line(0).unwrap().extents()[0].end(), DEFAULT_COLUMNS);
    }

    #[test]
    fn test_form_feed_reinitializes() {
        let mut term = terminal(4);
        term.output_chars("one\r\ntwo\r\nthree\r\nfour\r\nfive");
        assert!(term.scroll_base() > 0);
        term.output_char('\x0c');
        assert!(term.lines().is_empty());
        assert_eq!(term.cursor(), (0, 0));
        assert_eq!(term.scroll_base(), 0);
        assert_eq!(term.max_line(), 0);
        assert_eq!(term.frontend().reinits, 1);
    }

    #[test]
    fn test_scrolls_to_follow_output() {
        let mut term = terminal(4);
        term.output_chars(&"x\r\n".repeat(10));
        assert_eq!(term.cursor(), (10, 0));
        assert_eq!(term.scroll_base(), 7);
        assert_eq!(term.max_line(), 10);
    }

    #[test]
    fn test_page_down_and_up() {
        let mut term = terminal(10);
        term.output_chars(&"\n".repeat(30));
        assert_eq!(term.scroll_base(), 21);

        term.page_down();
        assert_eq!(term.scroll_base(), 26);
        term.page_down();
        assert_eq!(term.scroll_base(), 30);
        term.page_down();
        assert_eq!(term.scroll_base(), 30);

        term.page_up();
        assert_eq!(term.scroll_base(), 25);
        term.page_up();
        assert_eq!(term.scroll_base(), 21);
        assert_eq!(term.frontend().last_refresh().unwrap().scroll_base, 21);
    }

    #[test]
    fn test_new_output_after_paging_stays_visible() {
        let mut term = terminal(10);
        term.output_chars(&"\n".repeat(30));
        term.page_down();
        term.output_chars("\n\n");
        assert_eq!(term.cursor().0, 32);
        assert!(term.scroll_base() <= 32 && 32 < term.scroll_base() + 10);
    }

    fn operations() -> impl Strategy<Value = Vec<Op>> {
        proptest::collection::vec(
            prop_oneof![
                proptest::char::range(' ', '~').prop_map(Op::Char),
                Just(Op::Char('\n')),
                Just(Op::Char('\r')),
                Just(Op::Char('\t')),
                Just(Op::Char('\x08')),
                Just(Op::Char('\x0c')),
                Just(Op::PageUp),
                Just(Op::PageDown),
            ],
            0..300,
        )
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Char(char),
        PageUp,
        PageDown,
    }

    proptest! {
        #[test]
        fn cursor_stays_visible(ops in operations(), lines in 1usize..30) {
            let mut term = terminal(lines);
            for op in ops {
                match op {
                    Op::Char(ch) => term.output_char(ch),
                    Op::PageUp => term.page_up(),
                    Op::PageDown => term.page_down(),
                }
                let (line, column) = term.cursor();
                prop_assert!(column < DEFAULT_COLUMNS);
                prop_assert!(term.scroll_base() <= line);
                prop_assert!(line <= term.scroll_base() + lines - 1);
                prop_assert!(term.max_line() >= line);
            }
        }
    }
}
