//! Overstrike line model
//!
//! A teletype has no way to erase paper. Every glyph struck on a row stays,
//! so a row is stored as extents: runs of adjacent columns whose cells keep
//! every glyph struck at that column in strike order. Blank columns are gaps
//! between extents (or empty interior cells), never stored spaces.

/// Columns between horizontal tab stops
pub const TAB_WIDTH: usize = 8;

/// Next tab stop strictly to the right of `column`
pub fn next_tab_stop(column: usize) -> usize {
    (column / TAB_WIDTH + 1) * TAB_WIDTH
}

/// Characters that strike the paper
pub fn is_printable(ch: char) -> bool {
    !ch.is_control()
}

/// A contiguous run of struck columns
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Extent {
    start: usize,
    /// One entry per column; each holds every glyph struck there
    cells: Vec<String>,
}

impl Extent {
    fn new(start: usize, ch: char) -> Self {
        Self {
            start,
            cells: vec![ch.to_string()],
        }
    }

    /// First column
    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the last column
    pub fn end(&self) -> usize {
        self.start + self.cells.len()
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn contains(&self, column: usize) -> bool {
        column >= self.start && column < self.end()
    }

    /// Glyphs struck at `column`, oldest first
    pub fn cell(&self, column: usize) -> Option<&str> {
        if self.contains(column) {
            Some(self.cells[column - self.start].as_str())
        } else {
            None
        }
    }

    /// The last glyph struck in each column, with gaps shown as spaces
    pub fn text(&self) -> String {
        self.cells
            .iter()
            .map(|cell| cell.chars().last().unwrap_or(' '))
            .collect()
    }
}

/// One row of paper
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Line {
    /// Ordered by start column, never overlapping
    extents: Vec<Extent>,
}

impl Line {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extents(&self) -> &[Extent] {
        &self.extents
    }

    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }

    fn covers(&self, column: usize) -> bool {
        self.extents.iter().any(|e| e.contains(column))
    }

    /// Glyphs struck at `column`, oldest first
    pub fn glyphs_at(&self, column: usize) -> Option<&str> {
        self.extents.iter().find_map(|e| e.cell(column))
    }

    /// The glyph that would be visible on a display that cannot superimpose
    pub fn top_glyph(&self, column: usize) -> Option<char> {
        self.glyphs_at(column).and_then(|cell| cell.chars().last())
    }

    /// Strike a character at a column.
    ///
    /// A strike inside an extent overstrikes that cell. A strike at an
    /// extent's end, or one column past it, grows that extent (the skipped
    /// column becomes an empty cell). Anything else starts a new extent.
    /// A strike just left of an extent does not merge into it.
    pub fn place_char(&mut self, column: usize, ch: char) {
        if ch == ' ' {
            return;
        }

        if let Some(extent) = self.extents.iter_mut().find(|e| e.contains(column)) {
            extent.cells[column - extent.start].push(ch);
            return;
        }

        if let Some(extent) = self.extents.iter_mut().find(|e| e.end() == column) {
            extent.cells.push(ch.to_string());
            return;
        }

        if column > 0 && !self.covers(column - 1) {
            if let Some(extent) = self.extents.iter_mut().find(|e| e.end() + 1 == column) {
                extent.cells.push(String::new());
                extent.cells.push(ch.to_string());
                return;
            }
        }

        let at = self.extents.partition_point(|e| e.start < column);
        self.extents.insert(at, Extent::new(column, ch));
    }

    /// Feed a string through the carriage, starting at `start_column`.
    ///
    /// Tab, carriage return and backspace move the carriage; other printable
    /// characters strike and advance. The column is clamped to the platen
    /// after every step, so typing past the right edge overstrikes the last
    /// column. Returns the final column.
    pub fn apply(&mut self, text: &str, start_column: usize, width: usize) -> usize {
        let last = width.saturating_sub(1);
        let mut column = start_column.min(last);
        for ch in text.chars() {
            column = match ch {
                '\t' => next_tab_stop(column),
                '\r' => 0,
                '\x08' => column.saturating_sub(1),
                c if is_printable(c) => {
                    self.place_char(column, c);
                    column + 1
                }
                _ => column,
            };
            column = column.min(last);
        }
        column
    }
}
