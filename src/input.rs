use crossterm::event::{poll, read, Event, KeyCode};
use crossterm::terminal;
use log::warn;
use std::collections::HashMap;
use std::io;
use std::time::Duration;

/// conventional keymap: the left-hand block of a qwerty keyboard stands in
/// for the COSMAC's 4x4 hex pad
///
/// ```text
///   1 2 3 4        1 2 3 C
///   q w e r   =>   4 5 6 D
///   a s d f        7 8 9 E
///   z x c v        A 0 B F
/// ```
const CHIP8_QWERTY_KEYMAP: [(char, u8); 16] = [
    ('1', 0x01),
    ('2', 0x02),
    ('3', 0x03),
    ('4', 0x0c),
    ('q', 0x04),
    ('w', 0x05),
    ('e', 0x06),
    ('r', 0x0d),
    ('a', 0x07),
    ('s', 0x08),
    ('d', 0x09),
    ('f', 0x0e),
    ('z', 0x0a),
    ('x', 0x00),
    ('c', 0x0b),
    ('v', 0x0f),
];

/// Input seam. Once per driver cycle the core asks which logical keys were
/// observed down since it last asked, and stamps its own recency table from
/// the answer. Terminals only report presses, never releases, which is
/// exactly why the core debounces through a recency window instead of
/// expecting up/down state from here.
pub trait Input {
    /// chip-8 key symbols seen since the last poll; drains the buffer
    fn poll_keys(&mut self) -> Result<Vec<u8>, io::Error>;

    /// has the user asked to stop the run?
    fn quit_requested(&self) -> bool;
}

/// reads the terminal keyboard through crossterm's event queue
pub struct TermInput {
    keymap: HashMap<char, u8>,
    quit: bool,
}

impl TermInput {
    pub fn new() -> Result<Self, io::Error> {
        terminal::enable_raw_mode()?;
        Ok(TermInput {
            keymap: HashMap::from(CHIP8_QWERTY_KEYMAP),
            quit: false,
        })
    }
}

impl Drop for TermInput {
    fn drop(&mut self) {
        // best effort; nothing sensible to do if this fails on the way out
        let _ = terminal::disable_raw_mode();
    }
}

impl Input for TermInput {
    fn poll_keys(&mut self) -> Result<Vec<u8>, io::Error> {
        let mut keys = Vec::new();
        while poll(Duration::from_millis(0))? {
            match read()? {
                Event::Key(evt) => match evt.code {
                    KeyCode::Char(key) => match self.keymap.get(&key) {
                        Some(mapped) => keys.push(*mapped),
                        None => warn!("no COSMAC key for {:?}", key),
                    },
                    KeyCode::Esc => self.quit = true,
                    _ => {}
                },
                // resize and mouse events are none of our business
                _ => {}
            }
        }
        Ok(keys)
    }

    fn quit_requested(&self) -> bool {
        self.quit
    }
}

/// scripted Input implementation for testing
pub struct DummyInput {
    keys: Vec<u8>,
}

impl DummyInput {
    pub fn new(keys: &[u8]) -> Self {
        DummyInput {
            keys: Vec::from(keys),
        }
    }
}

impl Input for DummyInput {
    fn poll_keys(&mut self) -> Result<Vec<u8>, io::Error> {
        Ok(std::mem::take(&mut self.keys))
    }

    fn quit_requested(&self) -> bool {
        false
    }
}
