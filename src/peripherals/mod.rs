/*!
Memory-mapped peripherals: everything driven by the `ScreenData`/
`ScreenCtrl` registers plus the trivial keyboard/output ports.

Overview
========
The keyboard and numeric output ports are plain registers already living
on `cpu::Registers` (`output`) and `cpu::Cpu` (`keyboard`) — there is no
state machine to model beyond "the UI reads/writes a Word before each
step", so no peripheral type exists for them here.

The character LCD and monitor *are* state machines: a rising edge on the
`E` line of `ScreenCtrl` latches whatever is on `ScreenData` as either a
command or a data byte, depending on `RS`. `CharacterDisplay` in `lcd.rs`
implements that state machine; `Monitor` in `monitor.rs` is the 40x20
grid variant with an added newline command and scroll-up. Both are
*state*, not *rendering* — rendering characters to a screen is an
external collaborator's job, reached through the `CharacterSink` trait
so this crate never needs a font, a framebuffer, or a windowing toolkit.
*/

pub mod lcd;
pub mod monitor;

pub use lcd::CharacterDisplay;
pub use monitor::Monitor;

/// `ScreenCtrl` bit layout. Only 3 bits are meaningful; the CPU's `DCI`
/// latch pulls them from the top of the bus and right-shifts them down
/// into bits 0-2 before storing, so they land here already aligned.
pub mod ctrl_bit {
    /// Register select: 0 = command, 1 = data.
    pub const RS: u32 = 1 << 0;
    /// Read/write select. The emulated LCD is write-only from the CPU's
    /// perspective, so this bit is latched but otherwise unused.
    pub const RW: u32 = 1 << 1;
    /// Enable: a transition from 0 to 1 latches the current command/data.
    pub const E: u32 = 1 << 2;
}

/// `ScreenData` command byte patterns recognized when `RS=0`.
pub mod command {
    pub const CLEAR_DISPLAY: u8 = 0b0000_0001;
    pub const RETURN_HOME: u8 = 0b0000_0010;
    pub const ENTRY_MODE_SET: u8 = 0b0000_0100;
    pub const DISPLAY_CONTROL: u8 = 0b0000_1000;
    pub const CURSOR_SHIFT: u8 = 0b0001_0000;
    /// Monitor-only: move to the start of the next row, scrolling if the
    /// cursor was already on the last row.
    pub const NEWLINE: u8 = 0b0010_0000;
}

/// A host-side consumer of character-display effects. Rendering to an
/// actual screen (fonts, pixels, a window) is out of scope here; this
/// trait is the seam where that lives, external to the crate.
pub trait CharacterSink {
    /// The full display contents changed; `cols` is the row stride.
    fn redraw(&mut self, buffer: &[u8], cols: usize, cursor: usize);
}

/// A `CharacterSink` that discards every update — the default when no UI
/// is attached (e.g. headless `eduvm-run` invocations without `--lcd`).
#[derive(Debug, Default)]
pub struct NullSink;

impl CharacterSink for NullSink {
    fn redraw(&mut self, _buffer: &[u8], _cols: usize, _cursor: usize) {}
}

/// Entry-mode state shared by both display variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMode {
    pub increment: bool,
    pub shift_display: bool,
}

impl Default for EntryMode {
    fn default() -> Self {
        EntryMode {
            increment: true,
            shift_display: false,
        }
    }
}

/// Display-control state shared by both display variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayMode {
    pub display_on: bool,
    pub cursor_on: bool,
    pub blink_on: bool,
}
