//! Line-editing state machine over a single bounded buffer.
//!
//! The cursor sits implicitly at the end of the buffer; there is no
//! mid-line movement. Each input byte maps to one [`EditorAction`] the node
//! turns into echo/redraw output and, on a completed line, dispatch.

/// Maximum command length in bytes.
pub const COMMAND_BUF_LEN: usize = 512;
/// Prompt printed at the start of every input line.
pub const PROMPT: &str = "> ";

const KEY_ESC: u8 = 27;
const KEY_TAB: u8 = b'\t';
const KEY_BACKSPACE: u8 = 8;
const KEY_DELETE: u8 = 127;

/// What the node should do with the byte just fed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    /// Printable byte appended; echo it.
    Echo(char),
    /// Line terminator on a non-empty buffer; dispatch this command.
    /// The buffer has been cleared.
    Submit(String),
    /// Tab pressed; run autocomplete against the current buffer.
    Tab,
    /// Cancel key; the buffer (previously this many bytes) was discarded.
    /// Blank the line visually and redraw an empty prompt.
    Cancel { discarded: usize },
    /// One character removed; erase it visually.
    Erase,
    /// Buffer was full; it has been cleared. Report "command too long".
    Overflow,
    /// Nothing to do (terminator on empty buffer, backspace on empty
    /// buffer, non-printable byte).
    None,
}

/// Bounded single-line input buffer.
#[derive(Debug, Default)]
pub struct LineEditor {
    buf: String,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> &str {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Replace the buffer contents (autocomplete rewrite).
    pub fn set_buffer(&mut self, text: String) {
        self.buf = text;
        self.buf.truncate(COMMAND_BUF_LEN);
    }

    /// Feed one input byte through the state machine.
    pub fn feed(&mut self, byte: u8) -> EditorAction {
        match byte {
            b'\r' | b'\n' => {
                if self.buf.is_empty() {
                    EditorAction::None
                } else {
                    EditorAction::Submit(std::mem::take(&mut self.buf))
                }
            }
            KEY_TAB => EditorAction::Tab,
            KEY_ESC => {
                let discarded = self.buf.len();
                self.buf.clear();
                EditorAction::Cancel { discarded }
            }
            KEY_BACKSPACE | KEY_DELETE => {
                if self.buf.pop().is_some() {
                    EditorAction::Erase
                } else {
                    EditorAction::None
                }
            }
            b if (0x20..0x7F).contains(&b) => {
                if self.buf.len() >= COMMAND_BUF_LEN {
                    self.buf.clear();
                    EditorAction::Overflow
                } else {
                    let ch = b as char;
                    self.buf.push(ch);
                    EditorAction::Echo(ch)
                }
            }
            _ => EditorAction::None,
        }
    }
}
