//! # cosmac8
//!
//! A CHIP-8 interpreter: 4K of RAM, sixteen V registers, a sixteen-deep
//! call stack, two 60Hz countdown timers, a 64x32 monochrome display and a
//! hex keypad, fed by a fetch/decode/execute loop over a ROM loaded at
//! 0x200.
//!
//! ## Design
//!
//! * one single-threaded driver loop; "blocking" opcodes (FX0A key wait,
//!   display-wait draws) rewind PC by 2 and retry next cycle instead of
//!   really blocking
//! * instruction-level faults never abort the run: stack overflow and
//!   underflow, unknown opcodes and out-of-range memory access are logged
//!   warnings and otherwise no-ops
//! * ambiguous opcode semantics (shift source, I increment, VF reset,
//!   sprite clipping, jump offset register, FX1E carry) sit behind an
//!   immutable [`quirks::Quirks`] record built once at startup; the
//!   defaults match the original COSMAC VIP interpreter
//! * the display, input and sound devices hide behind traits so the core
//!   never knows it is drawing into a terminal; pressed keys are judged by
//!   a recency window because terminals report key-down events only
//! * pacing aims at 660 instructions/second times a speed multiplier,
//!   self-correcting against host scheduling jitter and measuring the
//!   achieved rate once a second

pub mod display;
pub mod emulator;
pub mod exec;
pub mod input;
pub mod instruction;
pub mod machine;
pub mod quirks;
pub mod sound;
pub mod timing;
