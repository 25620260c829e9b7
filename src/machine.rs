use log::warn;
use std::io;
use std::io::Read;
use std::time::{Duration, Instant};

// NB. addresses are u16 as per the chip-8; indexes into arrays are usize to
//     stop endless casting

/// how much RAM we have. exactly 4096 bytes, not a power-of-two ring: access
/// past the end is checked and refused, never wrapped
pub const RAM_SIZE: usize = 4096;

/// where programs are loaded, and where PC starts
pub const ROM_START: u16 = 0x200;

/// where the font glyphs live
pub const FONT_START: u16 = 0x050;

/// bytes per font glyph
pub const GLYPH_LEN: u16 = 5;

pub const SCREEN_WIDTH: usize = 64;
pub const SCREEN_HEIGHT: usize = 32;

/// the timers tick down at 60Hz regardless of instruction rate
const TIMER_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / 60);

const STACK_DEPTH: usize = 16;

/// CALL/RETURN linkage: up to sixteen return addresses. overflow and
/// underflow are non-fatal; the offending operation is refused with a
/// warning and execution carries on (the emulated program is trusted to be
/// mostly sensible, the interpreter's job is to keep running)
#[derive(Debug)]
pub struct Stack {
    frames: [u16; STACK_DEPTH],
    depth: usize,
}

impl Stack {
    pub fn new() -> Self {
        Stack {
            frames: [0; STACK_DEPTH],
            depth: 0,
        }
    }

    /// append a return address; refused with a warning when full
    pub fn push(&mut self, addr: u16) {
        if self.depth == STACK_DEPTH {
            warn!("stack overflow: push of {:#05x} discarded", addr);
            return;
        }
        self.frames[self.depth] = addr;
        self.depth += 1;
    }

    /// remove and return the top; 0 with a warning when empty
    pub fn pop(&mut self) -> u16 {
        if self.depth == 0 {
            warn!("stack underflow: pop on empty stack returns 0");
            return 0;
        }
        self.depth -= 1;
        self.frames[self.depth]
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

/// contemporary font, one 5-byte glyph per hex digit, baked in at 0x050
#[rustfmt::skip]
const FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// The whole of the emulated machine: memory, registers, stack, timers,
/// display buffer and key recency table. Owned by the driver for the length
/// of a run and lent mutably to the dispatcher one instruction at a time.
pub struct Machine {
    memory: [u8; RAM_SIZE],
    /// general registers; V[0xF] doubles as the carry/borrow/collision flag
    pub v: [u8; 16],
    /// index register. writes may legally exceed the addressable range;
    /// memory access is range-checked at dereference instead
    pub i: u16,
    pub pc: u16,
    pub stack: Stack,
    pub delay_timer: u8,
    pub sound_timer: u8,
    /// counts sprite draws since the last rendered frame; only consulted
    /// when the display-wait quirk is on
    pub display_wait_counter: u8,
    display: [bool; SCREEN_WIDTH * SCREEN_HEIGHT],
    display_dirty: bool,
    /// when each key was last observed down; None until first pressed, so
    /// nothing registers as pressed at boot
    key_last_pressed: [Option<Instant>; 16],
    /// maximum age for a press to still count as "currently down"
    key_window: Duration,
    last_timer_update: Instant,
}

impl Machine {
    pub fn new(key_window: Duration) -> Self {
        let mut m = Machine {
            memory: [0; RAM_SIZE],
            v: [0; 16],
            i: 0,
            pc: ROM_START,
            stack: Stack::new(),
            delay_timer: 0,
            sound_timer: 0,
            display_wait_counter: 0,
            display: [false; SCREEN_WIDTH * SCREEN_HEIGHT],
            // dirty from the start so the first due frame paints the blank
            // screen
            display_dirty: true,
            key_last_pressed: [None; 16],
            key_window,
            last_timer_update: Instant::now(),
        };
        let font_at = FONT_START as usize;
        m.memory[font_at..font_at + FONT.len()].copy_from_slice(&FONT);
        m
    }

    /// load a chip-8 program at 0x200 and return its length in bytes. a ROM
    /// that doesn't fit in RAM is a fatal setup error
    pub fn load_rom(&mut self, reader: &mut impl Read) -> Result<usize, io::Error> {
        let mut buf = Vec::new();
        let len = reader.read_to_end(&mut buf)?;
        let start = ROM_START as usize;
        if len > RAM_SIZE - start {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("ROM of {} bytes exceeds the {} available", len, RAM_SIZE - start),
            ));
        }
        self.memory[start..start + len].copy_from_slice(&buf);
        Ok(len)
    }

    /// read the two-byte instruction at PC (big-endian) and advance PC past
    /// it, so skips and returns operate on the following instruction
    pub fn fetch(&mut self) -> u16 {
        let hi = self.read_byte(self.pc);
        let lo = self.read_byte(self.pc.wrapping_add(1));
        self.pc = self.pc.wrapping_add(2);
        ((hi as u16) << 8) | lo as u16
    }

    /// checked memory read; out-of-range reads 0 with a warning
    pub fn read_byte(&self, addr: u16) -> u8 {
        match self.memory.get(addr as usize) {
            Some(b) => *b,
            None => {
                warn!("read past end of memory at {:#06x}", addr);
                0
            }
        }
    }

    /// checked memory write; out-of-range writes are dropped with a warning
    pub fn write_byte(&mut self, addr: u16, value: u8) {
        match self.memory.get_mut(addr as usize) {
            Some(b) => *b = value,
            None => warn!("write past end of memory at {:#06x}", addr),
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.display[y * SCREEN_WIDTH + x]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, on: bool) {
        self.display[y * SCREEN_WIDTH + x] = on;
        self.display_dirty = true;
    }

    pub fn clear_display(&mut self) {
        self.display.fill(false);
        self.display_dirty = true;
    }

    /// the 64x32 cells, row-major, for the renderer
    pub fn display(&self) -> &[bool] {
        &self.display
    }

    /// check and clear the dirty flag
    pub fn take_dirty(&mut self) -> bool {
        let dirty = self.display_dirty;
        self.display_dirty = false;
        dirty
    }

    /// record key `k` as observed down at `now`
    pub fn press_key(&mut self, k: u8, now: Instant) {
        if let Some(slot) = self.key_last_pressed.get_mut(k as usize) {
            *slot = Some(now);
        } else {
            warn!("ignoring press of nonexistent key {:#04x}", k);
        }
    }

    /// the single most recently pressed key, provided that press is younger
    /// than the recency window. collapses simultaneous multi-key states to
    /// one winner, which is what EX9E/EXA1/FX0A want
    pub fn most_recent_key(&self, now: Instant) -> Option<u8> {
        let mut winner = None;
        let mut best_age = self.key_window;
        for (k, pressed) in self.key_last_pressed.iter().enumerate() {
            if let Some(at) = pressed {
                let age = now.saturating_duration_since(*at);
                if age < best_age {
                    best_age = age;
                    winner = Some(k as u8);
                }
            }
        }
        winner
    }

    /// "is key K down" for the skip opcodes
    pub fn is_key_pressed(&self, k: u8, now: Instant) -> bool {
        self.most_recent_key(now) == Some(k)
    }

    /// decrement both timers once if a sixtieth of a second has passed.
    /// threshold check, not an accumulator: drift under load is accepted
    pub fn update_timers(&mut self, now: Instant) {
        if now.saturating_duration_since(self.last_timer_update) > TIMER_INTERVAL {
            if self.delay_timer > 0 {
                self.delay_timer -= 1;
            }
            if self.sound_timer > 0 {
                self.sound_timer -= 1;
            }
            self.last_timer_update = now;
        }
    }
}
