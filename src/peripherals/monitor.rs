/*!
Monitor: the optional 40x20 grid display variant. Shares the LCD's
command set but adds a dedicated newline command and scrolls the grid up
one row instead of wrapping when the cursor runs past the last row.
*/

use crate::word::Word;

use super::{command, ctrl_bit, CharacterSink, DisplayMode, EntryMode};

const ROWS: usize = 20;
const COLS: usize = 40;

#[derive(Debug, Clone)]
pub struct Monitor {
    buffer: Vec<u8>,
    cols: usize,
    rows: usize,
    cursor: usize,
    entry: EntryMode,
    mode: DisplayMode,
    prev_enable: bool,
}

impl Default for Monitor {
    fn default() -> Self {
        Monitor::new(ROWS, COLS)
    }
}

impl Monitor {
    pub fn new(rows: usize, cols: usize) -> Self {
        Monitor {
            buffer: vec![b' '; rows * cols],
            cols,
            rows,
            cursor: 0,
            entry: EntryMode::default(),
            mode: DisplayMode::default(),
            prev_enable: false,
        }
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn observe(&mut self, screen_data: Word, screen_ctrl: Word, sink: &mut dyn CharacterSink) {
        let enable = screen_ctrl & ctrl_bit::E != 0;
        let rising = enable && !self.prev_enable;
        self.prev_enable = enable;
        if !rising {
            return;
        }

        let data = screen_data as u8;
        let rs = screen_ctrl & ctrl_bit::RS != 0;
        if rs {
            self.write_data(data);
        } else if data & command::NEWLINE != 0 {
            self.newline();
        } else {
            self.apply_command(data);
        }
        sink.redraw(&self.buffer, self.cols, self.cursor);
    }

    fn write_data(&mut self, byte: u8) {
        if let Some(slot) = self.buffer.get_mut(self.cursor) {
            *slot = byte;
        }
        if self.entry.increment {
            self.cursor += 1;
            if self.cursor >= self.buffer.len() {
                self.scroll_up();
                self.cursor = (self.rows - 1) * self.cols;
            }
        } else {
            self.cursor = self.cursor.saturating_sub(1);
        }
    }

    fn newline(&mut self) {
        let row = self.cursor / self.cols;
        if row + 1 >= self.rows {
            self.scroll_up();
            self.cursor = (self.rows - 1) * self.cols;
        } else {
            self.cursor = (row + 1) * self.cols;
        }
    }

    /// Shifts every row up by one, clearing the last row, and leaves the
    /// cursor's row index unchanged (caller repositions it).
    fn scroll_up(&mut self) {
        let cols = self.cols;
        self.buffer.drain(0..cols);
        self.buffer.extend(std::iter::repeat(b' ').take(cols));
    }

    fn apply_command(&mut self, byte: u8) {
        if byte & command::CLEAR_DISPLAY != 0 {
            self.buffer.iter_mut().for_each(|c| *c = b' ');
            self.cursor = 0;
            self.entry = EntryMode::default();
        } else if byte & command::RETURN_HOME != 0 {
            self.cursor = 0;
        } else if byte & command::ENTRY_MODE_SET != 0 {
            self.entry.increment = byte & 0b10 != 0;
            self.entry.shift_display = byte & 0b01 != 0;
        } else if byte & command::DISPLAY_CONTROL != 0 {
            self.mode.display_on = byte & 0b100 != 0;
            self.mode.cursor_on = byte & 0b010 != 0;
            self.mode.blink_on = byte & 0b001 != 0;
        } else if byte & command::CURSOR_SHIFT != 0 {
            // Grid cursor/display shift is not meaningfully distinct from
            // a plain cursor move at this grid's scale; treat both the
            // same way the LCD variant treats a cursor-only move.
            let right = byte & 0b0100 != 0;
            if right {
                self.cursor = (self.cursor + 1).min(self.buffer.len() - 1);
            } else {
                self.cursor = self.cursor.saturating_sub(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripherals::NullSink;

    fn feed(mon: &mut Monitor, data: u8, ctrl: u32) {
        let mut sink = NullSink;
        mon.observe(data as Word, ctrl as Word, &mut sink);
        mon.observe(data as Word, 0, &mut sink);
    }

    #[test]
    fn newline_moves_cursor_to_next_row_start() {
        let mut mon = Monitor::new(20, 40);
        mon.observe(0, ctrl_bit::RS as Word, &mut NullSink);
        mon.observe(0, 0, &mut NullSink);
        feed(&mut mon, command::NEWLINE, ctrl_bit::E);
        assert_eq!(mon.cursor(), 40);
    }

    #[test]
    fn newline_on_last_row_scrolls_up() {
        let mut mon = Monitor::new(2, 4);
        mon.buffer[0] = b'A';
        mon.cursor = 4; // second (last) row
        feed(&mut mon, command::NEWLINE, ctrl_bit::E);
        assert_eq!(mon.buffer()[0], b' ');
        assert_eq!(mon.cursor(), 4);
    }

    #[test]
    fn clear_resets_grid() {
        let mut mon = Monitor::new(2, 4);
        feed(&mut mon, b'Z', ctrl_bit::RS);
        feed(&mut mon, command::CLEAR_DISPLAY, ctrl_bit::E);
        assert!(mon.buffer().iter().all(|&c| c == b' '));
        assert_eq!(mon.cursor(), 0);
    }
}
