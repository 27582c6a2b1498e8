use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// Mouse-drag selection over one pane. Coordinates are raw screen
/// cells, stored exactly as reported; normalization into reading order
/// happens at read time so an in-progress drag is never rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    active: bool,
    start_x: u16,
    start_y: u16,
    end_x: u16,
    end_y: u16,
    extracted: String,
}

impl SelectionState {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn extracted_text(&self) -> &str {
        &self.extracted
    }

    /// Starts a drag. Presses outside the terminal rectangle are
    /// rejected and leave the selection inactive.
    pub fn begin(&mut self, x: u16, y: u16, term_width: u16, term_height: u16) -> bool {
        if x >= term_width || y >= term_height {
            self.reset();
            return false;
        }
        self.active = true;
        self.start_x = x;
        self.start_y = y;
        self.end_x = x;
        self.end_y = y;
        self.extracted.clear();
        true
    }

    pub fn drag_to(&mut self, x: u16, y: u16) {
        if self.active {
            self.end_x = x;
            self.end_y = y;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Recomputes the extracted text from the pane's logical backing
    /// text. Called on every drag motion for the live preview.
    pub fn update_extraction(&mut self, text: &str, scroll_offset: usize, origin_y: u16) {
        self.extracted = self.extract(text, scroll_offset, origin_y);
    }

    /// Ends the drag: re-extracts, then trims per-line whitespace and
    /// drops lines that become empty, preserving order. A selection
    /// that ends up empty deactivates so the caller falls back to
    /// whole-pane copy semantics.
    pub fn release(&mut self, x: u16, y: u16, text: &str, scroll_offset: usize, origin_y: u16) {
        if !self.active {
            return;
        }
        self.end_x = x;
        self.end_y = y;
        self.extracted = finalize_extraction(&self.extract(text, scroll_offset, origin_y));
        if self.extracted.is_empty() {
            self.active = false;
        }
    }

    /// Consumes the selection for a copy action.
    pub fn take_extracted(&mut self) -> Option<String> {
        if !self.active || self.extracted.is_empty() {
            return None;
        }
        let text = std::mem::take(&mut self.extracted);
        self.reset();
        Some(text)
    }

    /// Drag rectangle in reading order, or None for an empty drag.
    pub fn normalized(&self) -> Option<(u16, u16, u16, u16)> {
        if !self.active {
            return None;
        }
        let (mut sx, mut sy) = (self.start_x, self.start_y);
        let (mut ex, mut ey) = (self.end_x, self.end_y);
        if sy > ey || (sy == ey && sx > ex) {
            std::mem::swap(&mut sx, &mut ex);
            std::mem::swap(&mut sy, &mut ey);
        }
        if sx == ex && sy == ey {
            return None;
        }
        Some((sx, sy, ex, ey))
    }

    /// Maps the drag rectangle back onto the pane's logical lines. A
    /// logical line `i` sits on screen row `origin_y + i − scroll` and
    /// contributes only when that row falls inside the selection.
    fn extract(&self, text: &str, scroll_offset: usize, origin_y: u16) -> String {
        let Some((sx, sy, ex, ey)) = self.normalized() else {
            return String::new();
        };

        let mut parts = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let row = origin_y as i64 + index as i64 - scroll_offset as i64;
            if row < sy as i64 || row > ey as i64 {
                continue;
            }
            if sy == ey {
                parts.push(slice_columns(line, sx as usize, ex as usize));
            } else if row == sy as i64 {
                parts.push(slice_columns(line, sx as usize, usize::MAX));
            } else if row == ey as i64 {
                parts.push(slice_columns(line, 0, ex as usize));
            } else if line.is_empty() {
                // A single space keeps the selection visibly spanning
                // blank lines in the live preview.
                parts.push(" ".to_string());
            } else {
                parts.push(line.to_string());
            }
        }

        parts.join("\n")
    }
}

fn slice_columns(line: &str, start: usize, end: usize) -> String {
    if start >= end {
        return String::new();
    }
    line.chars()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect()
}

fn finalize_extraction(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// OSC 52 clipboard escape; works through SSH and most terminal
/// emulators.
pub fn osc52_sequence(text: &str) -> String {
    let encoded = STANDARD.encode(text.as_bytes());
    format!("\x1b]52;c;{encoded}\x1b\\")
}

#[cfg(test)]
mod tests {
    use super::{SelectionState, osc52_sequence};

    const TERM_W: u16 = 120;
    const TERM_H: u16 = 40;

    fn selection(from: (u16, u16), to: (u16, u16)) -> SelectionState {
        let mut state = SelectionState::default();
        assert!(state.begin(from.0, from.1, TERM_W, TERM_H));
        state.drag_to(to.0, to.1);
        state
    }

    #[test]
    fn single_row_drag_extracts_column_range() {
        // Pane content starts at screen row 3; logical line 0 is row 3.
        let text = "0123456789abcdefghijklmnop";
        let mut state = selection((5, 3), (20, 3));
        state.update_extraction(text, 0, 3);
        assert_eq!(state.extracted_text(), "56789abcdefghij");
    }

    #[test]
    fn full_line_drag_round_trips_the_line() {
        let text = "alpha\n  beta  \ngamma";
        let mut state = selection((0, 4), (120, 4));
        state.release(120, 4, text, 0, 3);
        assert_eq!(state.extracted_text(), "beta");
    }

    #[test]
    fn backward_drag_normalizes_to_reading_order() {
        let text = "0123456789";
        let mut state = selection((8, 3), (2, 3));
        state.update_extraction(text, 0, 3);
        assert_eq!(state.extracted_text(), "234567");
    }

    #[test]
    fn multi_row_drag_takes_head_tail_and_middle() {
        let text = "first line\nmiddle line\nlast line";
        let mut state = selection((6, 3), (4, 5));
        state.update_extraction(text, 0, 3);
        assert_eq!(state.extracted_text(), "line\nmiddle line\nlast");
    }

    #[test]
    fn scroll_offset_shifts_the_mapping() {
        let text = (0..10).map(|i| format!("line-{i}")).collect::<Vec<_>>().join("\n");
        // With two lines scrolled off, row 3 shows logical line 2.
        let mut state = selection((0, 3), (120, 3));
        state.update_extraction(&text, 2, 3);
        assert_eq!(state.extracted_text(), "line-2");
    }

    #[test]
    fn blank_middle_lines_span_in_preview_and_drop_on_release() {
        let text = "top\n\nbottom";
        let mut state = selection((0, 3), (6, 5));
        state.update_extraction(text, 0, 3);
        assert_eq!(state.extracted_text(), "top\n \nbottom");

        state.release(6, 5, text, 0, 3);
        assert_eq!(state.extracted_text(), "top\nbottom");
    }

    #[test]
    fn out_of_bounds_press_is_rejected() {
        let mut state = SelectionState::default();
        assert!(!state.begin(TERM_W, 5, TERM_W, TERM_H));
        assert!(!state.is_active());
        assert!(!state.begin(10, TERM_H + 3, TERM_W, TERM_H));
        assert!(!state.is_active());
    }

    #[test]
    fn zero_length_drag_yields_empty_selection() {
        let mut state = SelectionState::default();
        assert!(state.begin(7, 7, TERM_W, TERM_H));
        state.release(7, 7, "some text", 0, 3);
        assert!(!state.is_active());
        assert_eq!(state.extracted_text(), "");
    }

    #[test]
    fn start_beyond_line_end_contributes_nothing() {
        let text = "short";
        let mut state = selection((40, 3), (60, 3));
        state.update_extraction(text, 0, 3);
        assert_eq!(state.extracted_text(), "");
    }

    #[test]
    fn take_extracted_consumes_and_resets() {
        let text = "copy me please";
        let mut state = selection((0, 3), (7, 3));
        state.release(7, 3, text, 0, 3);
        assert_eq!(state.take_extracted().as_deref(), Some("copy me"));
        assert!(!state.is_active());
        assert_eq!(state.take_extracted(), None);
    }

    #[test]
    fn osc52_wraps_base64_payload() {
        let sequence = osc52_sequence("hi");
        assert_eq!(sequence, "\x1b]52;c;aGk=\x1b\\");
    }
}
