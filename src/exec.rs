use log::warn;
use rand::Rng;
use std::time::Instant;

use crate::instruction::Instruction;
use crate::machine::{Machine, FONT_START, GLYPH_LEN, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::quirks::Quirks;

/// Execute one decoded instruction against the machine. PC has already been
/// advanced past the instruction by the fetch, so skips add another 2 and
/// the blocking opcodes rewind by 2 to retry the same instruction on the
/// next driver cycle.
///
/// `now` is the driver's timestamp for this cycle; the key opcodes test
/// recency against it rather than re-reading the clock mid-instruction.
pub fn execute(
    m: &mut Machine,
    instr: Instruction,
    quirks: &Quirks,
    rng: &mut impl Rng,
    now: Instant,
) {
    use Instruction::*;

    match instr {
        Clear => m.clear_display(),
        Return => m.pc = m.stack.pop(),
        Jump(nnn) => m.pc = nnn,
        Call(nnn) => {
            // the address pushed is the instruction after the CALL
            m.stack.push(m.pc);
            m.pc = nnn;
        }
        SkipEqImm { x, nn } => {
            if m.v[x] == nn {
                m.pc += 2;
            }
        }
        SkipNeImm { x, nn } => {
            if m.v[x] != nn {
                m.pc += 2;
            }
        }
        SkipEqReg { x, y } => {
            if m.v[x] == m.v[y] {
                m.pc += 2;
            }
        }
        LoadImm { x, nn } => m.v[x] = nn,
        AddImm { x, nn } => m.v[x] = m.v[x].wrapping_add(nn), // no flag
        Move { x, y } => m.v[x] = m.v[y],
        Or { x, y } => {
            m.v[x] |= m.v[y];
            if quirks.vf_reset {
                m.v[0xf] = 0;
            }
        }
        And { x, y } => {
            m.v[x] &= m.v[y];
            if quirks.vf_reset {
                m.v[0xf] = 0;
            }
        }
        Xor { x, y } => {
            m.v[x] ^= m.v[y];
            if quirks.vf_reset {
                m.v[0xf] = 0;
            }
        }
        Add { x, y } => {
            // operands read before the flag write, so VF as X or Y works
            let (sum, carried) = m.v[x].overflowing_add(m.v[y]);
            m.v[x] = sum;
            m.v[0xf] = carried as u8;
        }
        Sub { x, y } => {
            // "not borrow": computed before the subtraction clobbers VX
            let no_borrow = (m.v[x] >= m.v[y]) as u8;
            m.v[x] = m.v[x].wrapping_sub(m.v[y]);
            m.v[0xf] = no_borrow;
        }
        SubFrom { x, y } => {
            let no_borrow = (m.v[y] >= m.v[x]) as u8;
            m.v[x] = m.v[y].wrapping_sub(m.v[x]);
            m.v[0xf] = no_borrow;
        }
        ShiftRight { x, y } => {
            // legacy: shift VY into VX; quirk: shift VX in place
            let src = if quirks.shifting { m.v[x] } else { m.v[y] };
            m.v[x] = src >> 1;
            m.v[0xf] = src & 1;
        }
        ShiftLeft { x, y } => {
            let src = if quirks.shifting { m.v[x] } else { m.v[y] };
            m.v[x] = src << 1;
            m.v[0xf] = src >> 7;
        }
        SkipNeReg { x, y } => {
            if m.v[x] != m.v[y] {
                m.pc += 2;
            }
        }
        LoadIndex(nnn) => m.i = nnn,
        JumpOffset(nnn) => {
            let reg = if quirks.jumping {
                (nnn >> 8) as usize
            } else {
                0
            };
            m.pc = nnn.wrapping_add(m.v[reg] as u16);
        }
        Random { x, nn } => m.v[x] = rng.gen::<u8>() & nn,
        Draw { x, y, n } => draw_sprite(m, quirks, x, y, n),
        SkipKeyDown { x } => {
            if m.is_key_pressed(m.v[x], now) {
                m.pc += 2;
            }
        }
        SkipKeyUp { x } => {
            if !m.is_key_pressed(m.v[x], now) {
                m.pc += 2;
            }
        }
        ReadDelay { x } => m.v[x] = m.delay_timer,
        WaitKey { x } => match m.most_recent_key(now) {
            Some(k) => m.v[x] = k,
            // no key yet: rewind so this instruction re-executes next cycle
            None => m.pc -= 2,
        },
        SetDelay { x } => m.delay_timer = m.v[x],
        SetSound { x } => m.sound_timer = m.v[x],
        AddIndex { x } => {
            let sum = m.i.wrapping_add(m.v[x] as u16);
            if quirks.index_overflow && sum > 0xfff {
                m.v[0xf] = 1;
            }
            // deliberately unclamped; dereferences are checked instead
            m.i = sum;
        }
        LoadGlyph { x } => m.i = FONT_START + m.v[x] as u16 * GLYPH_LEN,
        StoreBcd { x } => {
            let val = m.v[x];
            m.write_byte(m.i, val / 100);
            m.write_byte(m.i.wrapping_add(1), (val / 10) % 10);
            m.write_byte(m.i.wrapping_add(2), val % 10);
        }
        StoreRegs { x } => {
            for offset in 0..=x as u16 {
                m.write_byte(m.i.wrapping_add(offset), m.v[offset as usize]);
            }
            if quirks.memory_increment {
                m.i = m.i.wrapping_add(x as u16 + 1);
            }
        }
        LoadRegs { x } => {
            for offset in 0..=x as u16 {
                m.v[offset as usize] = m.read_byte(m.i.wrapping_add(offset));
            }
            if quirks.memory_increment {
                m.i = m.i.wrapping_add(x as u16 + 1);
            }
        }
        Unknown(word) => warn!("unknown instruction {:#06x}, skipping", word),
    }
}

/// DXYN. The origin is masked on-screen; whether the rest of the sprite
/// clips or wraps at the edges is the clipping quirk. Pixels are XORed in,
/// VF reporting any on->off collision. With the display-wait quirk on, a
/// second draw in the same frame is deferred by PC rewind, mimicking the
/// original hardware's one-draw-per-frame ceiling.
fn draw_sprite(m: &mut Machine, quirks: &Quirks, x: usize, y: usize, n: u8) {
    if quirks.display_wait && m.display_wait_counter != 0 {
        m.pc -= 2;
        return;
    }

    let x0 = (m.v[x] & 63) as usize;
    let y0 = (m.v[y] & 31) as usize;
    m.v[0xf] = 0;

    for row in 0..n as usize {
        let py = match (y0 + row, quirks.clipping) {
            (py, _) if py < SCREEN_HEIGHT => py,
            (_, true) => continue, // whole row off the bottom
            (py, false) => py % SCREEN_HEIGHT,
        };
        let bits = m.read_byte(m.i.wrapping_add(row as u16));
        for col in 0..8 {
            if bits & (0x80 >> col) == 0 {
                continue;
            }
            let px = match (x0 + col, quirks.clipping) {
                (px, _) if px < SCREEN_WIDTH => px,
                (_, true) => continue, // this pixel off the right edge
                (px, false) => px % SCREEN_WIDTH,
            };
            if m.pixel(px, py) {
                m.set_pixel(px, py, false);
                m.v[0xf] = 1;
            } else {
                m.set_pixel(px, py, true);
            }
        }
    }

    if quirks.display_wait {
        m.display_wait_counter = m.display_wait_counter.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::ROM_START;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    fn machine() -> Machine {
        Machine::new(Duration::from_millis(200))
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0x1234)
    }

    /// decode and execute one instruction as the driver would
    fn step(m: &mut Machine, word: u16, quirks: &Quirks) {
        m.pc += 2; // stand-in for the fetch
        execute(
            m,
            Instruction::decode(word),
            quirks,
            &mut rng(),
            Instant::now(),
        );
    }

    #[test]
    fn test_add_sets_carry() {
        let q = Quirks::default();
        for (a, b, sum, carry) in [
            (0x05u8, 0x03u8, 0x08u8, 0u8),
            (0xff, 0x01, 0x00, 1),
            (0xf0, 0x11, 0x01, 1),
            (0xff, 0x00, 0xff, 0),
        ] {
            let mut m = machine();
            m.v[1] = a;
            m.v[2] = b;
            step(&mut m, 0x8124, &q);
            assert_eq!(m.v[1], sum, "{:#04x} + {:#04x}", a, b);
            assert_eq!(m.v[0xf], carry);
        }
    }

    #[test]
    fn test_add_with_vf_operand_reads_before_flag() {
        let q = Quirks::default();
        let mut m = machine();
        m.v[0xf] = 0x80;
        m.v[2] = 0x81;
        // 8F24: VF as destination still reads its old value first
        step(&mut m, 0x8f24, &q);
        assert_eq!(m.v[0xf], 1); // carry, not the 0x01 sum
    }

    #[test]
    fn test_sub_borrow_flag_before_subtraction() {
        let q = Quirks::default();
        for (a, b, diff, flag) in [
            (0x08u8, 0x03u8, 0x05u8, 1u8),
            (0x03, 0x08, 0xfb, 0),
            (0x07, 0x07, 0x00, 1), // equal counts as no borrow
        ] {
            let mut m = machine();
            m.v[1] = a;
            m.v[2] = b;
            step(&mut m, 0x8125, &q);
            assert_eq!(m.v[1], diff);
            assert_eq!(m.v[0xf], flag);
        }
    }

    #[test]
    fn test_subfrom_mirrors_sub() {
        let q = Quirks::default();
        let mut m = machine();
        m.v[1] = 0x03;
        m.v[2] = 0x08;
        step(&mut m, 0x8127, &q);
        assert_eq!(m.v[1], 0x05);
        assert_eq!(m.v[0xf], 1);
    }

    #[test]
    fn test_shift_right_legacy_uses_vy() {
        let q = Quirks {
            shifting: false,
            ..Quirks::default()
        };
        let mut m = machine();
        m.v[1] = 0xff; // must not influence the result
        m.v[2] = 0b0000_0101;
        step(&mut m, 0x8126, &q);
        assert_eq!(m.v[1], 0b0000_0010);
        assert_eq!(m.v[0xf], 1);
    }

    #[test]
    fn test_shift_right_quirk_uses_vx() {
        let q = Quirks {
            shifting: true,
            ..Quirks::default()
        };
        let mut m = machine();
        m.v[1] = 0b0000_0100;
        m.v[2] = 0xff; // must not influence the result
        step(&mut m, 0x8126, &q);
        assert_eq!(m.v[1], 0b0000_0010);
        assert_eq!(m.v[0xf], 0);
    }

    #[test]
    fn test_shift_left_mirrors_with_bit_seven() {
        let mut m = machine();
        m.v[2] = 0b1100_0000;
        step(&mut m, 0x812e, &Quirks::default());
        assert_eq!(m.v[1], 0b1000_0000);
        assert_eq!(m.v[0xf], 1);
    }

    #[test]
    fn test_logic_ops_vf_reset_quirk() {
        let on = Quirks::default();
        let off = Quirks {
            vf_reset: false,
            ..Quirks::default()
        };
        for word in [0x8121u16, 0x8122, 0x8123] {
            let mut m = machine();
            m.v[0xf] = 0xaa;
            m.v[1] = 0x0f;
            m.v[2] = 0x3c;
            step(&mut m, word, &on);
            assert_eq!(m.v[0xf], 0);

            let mut m = machine();
            m.v[0xf] = 0xaa;
            step(&mut m, word, &off);
            assert_eq!(m.v[0xf], 0xaa);
        }
    }

    #[test]
    fn test_call_pushes_following_address() {
        let q = Quirks::default();
        let mut m = machine();
        step(&mut m, 0x2400, &q); // CALL 0x400 from 0x200
        assert_eq!(m.pc, 0x400);
        step(&mut m, 0x00ee, &q); // RET
        assert_eq!(m.pc, 0x202);
    }

    #[test]
    fn test_skip_families() {
        let q = Quirks::default();
        let mut m = machine();
        m.v[3] = 0x42;
        m.v[4] = 0x42;
        step(&mut m, 0x3342, &q); // 3XNN taken
        assert_eq!(m.pc, 0x204);
        step(&mut m, 0x4342, &q); // 4XNN not taken
        assert_eq!(m.pc, 0x206);
        step(&mut m, 0x5340, &q); // 5XY0 taken
        assert_eq!(m.pc, 0x20a);
        step(&mut m, 0x9340, &q); // 9XY0 not taken
        assert_eq!(m.pc, 0x20c);
    }

    #[test]
    fn test_jump_offset_modes() {
        let legacy = Quirks::default();
        let quirky = Quirks {
            jumping: true,
            ..Quirks::default()
        };

        let mut m = machine();
        m.v[0] = 0x10;
        m.v[2] = 0x04;
        step(&mut m, 0xb234, &legacy);
        assert_eq!(m.pc, 0x244); // NNN + V0

        let mut m = machine();
        m.v[0] = 0x10;
        m.v[2] = 0x04;
        step(&mut m, 0xb234, &quirky);
        assert_eq!(m.pc, 0x238); // NNN + V2
    }

    #[test]
    fn test_random_is_masked() {
        let q = Quirks::default();
        let mut m = machine();
        step(&mut m, 0xc10f, &q);
        assert_eq!(m.v[1] & 0xf0, 0);
        // NN = 0 forces zero whatever the rng says
        step(&mut m, 0xc2ff, &q);
        step(&mut m, 0xc300, &q);
        assert_eq!(m.v[3], 0);
    }

    #[test]
    fn test_draw_xor_erase_round_trip() {
        // no display-wait so both draws land in the same "frame"
        let q = Quirks {
            display_wait: false,
            ..Quirks::default()
        };
        let mut m = machine();
        m.i = 0x300;
        m.write_byte(0x300, 0b1010_0000);
        m.write_byte(0x301, 0b0100_0000);
        m.v[0] = 4;
        m.v[1] = 2;

        step(&mut m, 0xd012, &q);
        assert!(m.pixel(4, 2) && m.pixel(6, 2) && m.pixel(5, 3));
        assert!(!m.pixel(5, 2) && !m.pixel(4, 3));
        assert_eq!(m.v[0xf], 0);

        // identical draw erases everything and reports the collision
        step(&mut m, 0xd012, &q);
        assert!(m.display().iter().all(|p| !*p));
        assert_eq!(m.v[0xf], 1);
    }

    #[test]
    fn test_draw_clips_at_right_edge() {
        let q = Quirks {
            display_wait: false,
            clipping: true,
            ..Quirks::default()
        };
        let mut m = machine();
        m.i = 0x300;
        m.write_byte(0x300, 0xff);
        m.v[0] = 63;
        m.v[1] = 0;
        step(&mut m, 0xd011, &q);
        assert!(m.pixel(63, 0));
        // nothing wrapped to the left side
        assert!((0..8).all(|x| !m.pixel(x, 0)));
    }

    #[test]
    fn test_draw_wraps_at_right_edge() {
        let q = Quirks {
            display_wait: false,
            clipping: false,
            ..Quirks::default()
        };
        let mut m = machine();
        m.i = 0x300;
        m.write_byte(0x300, 0xff);
        m.v[0] = 63;
        m.v[1] = 0;
        step(&mut m, 0xd011, &q);
        assert!(m.pixel(63, 0));
        assert!((0..7).all(|x| m.pixel(x, 0)));
        assert!(!m.pixel(7, 0));
    }

    #[test]
    fn test_draw_clips_vs_wraps_at_bottom() {
        let mut sprite = |clipping| {
            let q = Quirks {
                display_wait: false,
                clipping,
                ..Quirks::default()
            };
            let mut m = machine();
            m.i = 0x300;
            m.write_byte(0x300, 0x80);
            m.write_byte(0x301, 0x80);
            m.v[0] = 0;
            m.v[1] = 31;
            step(&mut m, 0xd012, &q);
            (m.pixel(0, 31), m.pixel(0, 0))
        };
        assert_eq!(sprite(true), (true, false));
        assert_eq!(sprite(false), (true, true));
    }

    #[test]
    fn test_draw_origin_is_masked_on_screen() {
        let q = Quirks {
            display_wait: false,
            ..Quirks::default()
        };
        let mut m = machine();
        m.i = 0x300;
        m.write_byte(0x300, 0x80);
        m.v[0] = 64; // masks to column 0
        m.v[1] = 33; // masks to row 1
        step(&mut m, 0xd011, &q);
        assert!(m.pixel(0, 1));
    }

    #[test]
    fn test_draw_defers_until_frame_rendered() {
        let q = Quirks::default(); // display_wait on
        let mut m = machine();
        m.i = 0x300;
        m.write_byte(0x300, 0x80);

        step(&mut m, 0xd011, &q);
        assert_eq!(m.display_wait_counter, 1);
        assert_eq!(m.pc, 0x202);

        // second draw in the same frame: rewound, nothing drawn
        m.v[1] = 5;
        step(&mut m, 0xd011, &q);
        assert_eq!(m.pc, 0x202);
        assert!(!m.pixel(0, 5));

        // the driver resets the counter when it renders; the retry lands
        m.display_wait_counter = 0;
        step(&mut m, 0xd011, &q);
        assert!(m.pixel(0, 5));
    }

    #[test]
    fn test_bcd_decomposition() {
        let q = Quirks::default();
        for (val, digits) in [(159u8, [1u8, 5, 9]), (7, [0, 0, 7]), (40, [0, 4, 0])] {
            let mut m = machine();
            m.v[6] = val;
            m.i = 0x400;
            step(&mut m, 0xf633, &q);
            assert_eq!(
                [m.read_byte(0x400), m.read_byte(0x401), m.read_byte(0x402)],
                digits
            );
        }
    }

    #[test]
    fn test_store_load_round_trip_with_increment() {
        let q = Quirks::default(); // memory_increment on
        let mut m = machine();
        m.v[..5].copy_from_slice(&[0x11, 0x22, 0x33, 0x44, 0x55]);
        m.i = 0x400;
        step(&mut m, 0xf455, &q);
        assert_eq!(m.i, 0x405); // stepped once per byte copied

        m.v[..5].fill(0);
        m.i = 0x400;
        step(&mut m, 0xf465, &q);
        assert_eq!(&m.v[..5], &[0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(m.i, 0x405);
    }

    #[test]
    fn test_store_leaves_index_without_quirk() {
        let q = Quirks {
            memory_increment: false,
            ..Quirks::default()
        };
        let mut m = machine();
        m.v[..4].copy_from_slice(&[9, 8, 7, 6]);
        m.i = 0x400;
        step(&mut m, 0xf355, &q);
        assert_eq!(m.i, 0x400);
        assert_eq!(m.read_byte(0x403), 6);
        m.v[..4].fill(0);
        step(&mut m, 0xf365, &q);
        assert_eq!(&m.v[..4], &[9, 8, 7, 6]);
        assert_eq!(m.i, 0x400);
    }

    #[test]
    fn test_add_index_unflagged_by_default() {
        let q = Quirks::default();
        let mut m = machine();
        m.i = 0xfff;
        m.v[1] = 0x10;
        step(&mut m, 0xf11e, &q);
        assert_eq!(m.i, 0x100f); // unclamped
        assert_eq!(m.v[0xf], 0);
    }

    #[test]
    fn test_add_index_overflow_quirk_sets_flag() {
        let q = Quirks {
            index_overflow: true,
            ..Quirks::default()
        };
        let mut m = machine();
        m.i = 0xfff;
        m.v[1] = 0x10;
        step(&mut m, 0xf11e, &q);
        assert_eq!(m.v[0xf], 1);
    }

    #[test]
    fn test_glyph_address() {
        let q = Quirks::default();
        let mut m = machine();
        m.v[2] = 0xa;
        step(&mut m, 0xf229, &q);
        assert_eq!(m.i, FONT_START + 0xa * 5);
    }

    #[test]
    fn test_timer_transfer_ops() {
        let q = Quirks::default();
        let mut m = machine();
        m.v[1] = 42;
        step(&mut m, 0xf115, &q); // delay = V1
        step(&mut m, 0xf118, &q); // sound = V1
        assert_eq!(m.delay_timer, 42);
        assert_eq!(m.sound_timer, 42);
        step(&mut m, 0xf207, &q); // V2 = delay
        assert_eq!(m.v[2], 42);
    }

    #[test]
    fn test_wait_key_rewinds_until_pressed() {
        let q = Quirks::default();
        let mut m = machine();
        step(&mut m, 0xf30a, &q);
        assert_eq!(m.pc, 0x200); // rewound, will retry

        m.press_key(0xb, Instant::now());
        step(&mut m, 0xf30a, &q);
        assert_eq!(m.pc, 0x202);
        assert_eq!(m.v[3], 0xb);
    }

    #[test]
    fn test_skip_key_ops_respect_recency() {
        let q = Quirks::default();
        let mut m = machine();
        m.v[1] = 0x5;
        m.press_key(0x5, Instant::now());
        step(&mut m, 0xe19e, &q); // pressed: skip
        assert_eq!(m.pc, 0x204);
        step(&mut m, 0xe1a1, &q); // EXA1 must not skip
        assert_eq!(m.pc, 0x206);
    }

    #[test]
    fn test_skip_key_ops_ignore_stale_press() {
        let q = Quirks::default();
        let mut m = machine();
        m.v[1] = 0x5;
        m.press_key(0x5, Instant::now() - Duration::from_secs(2));
        step(&mut m, 0xe19e, &q);
        assert_eq!(m.pc, 0x202); // too old to count as down
        step(&mut m, 0xe1a1, &q);
        assert_eq!(m.pc, 0x206); // and EXA1 skips
    }

    #[test]
    fn test_unknown_instruction_is_a_noop() {
        let q = Quirks::default();
        let mut m = machine();
        step(&mut m, 0x0123, &q);
        step(&mut m, 0xf1ff, &q);
        assert_eq!(m.pc, 0x204);
        assert!(m.v.iter().all(|r| *r == 0));
        assert_eq!(m.i, 0);
    }

    #[test]
    fn test_three_instruction_scenario() {
        // 6005 / 6103 / 8014: V0=5, V1=3, V0+=V1
        let q = Quirks::default();
        let mut m = machine();
        let mut rom: &[u8] = &[0x60, 0x05, 0x61, 0x03, 0x80, 0x14, 0x00, 0x00];
        m.load_rom(&mut rom).unwrap();
        for _ in 0..3 {
            let word = m.fetch();
            execute(
                &mut m,
                Instruction::decode(word),
                &q,
                &mut rng(),
                Instant::now(),
            );
        }
        assert_eq!(m.v[0], 8);
        assert_eq!(m.v[0xf], 0);
        assert_eq!(m.pc, ROM_START + 6);
    }
}
