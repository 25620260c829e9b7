/// Behaviour toggles reconciling divergent historical interpreter semantics.
/// Built once from the command line, never mutated afterwards; the
/// dispatcher consults it by reference.
///
/// The defaults are the original COSMAC VIP profile, which is what the
/// common quirk test ROMs expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quirks {
    /// 8XY1/8XY2/8XY3 clear VF afterwards
    pub vf_reset: bool,
    /// FX55/FX65 leave I pointing past the copied block (I + X + 1)
    pub memory_increment: bool,
    /// DXYN draws at most once per rendered frame, deferring by PC rewind
    pub display_wait: bool,
    /// sprite rows/pixels falling off the display edge are skipped rather
    /// than wrapped
    pub clipping: bool,
    /// 8XY6/8XYE shift VX in place instead of shifting VY into VX
    pub shifting: bool,
    /// BNNN jumps to NNN + VX (X = top nibble of NNN) instead of NNN + V0
    pub jumping: bool,
    /// FX1E sets VF when I overflows past 0xFFF. no historical consensus;
    /// off preserves the unflagged addition
    pub index_overflow: bool,
}

impl Default for Quirks {
    fn default() -> Self {
        Quirks {
            vf_reset: true,
            memory_increment: true,
            display_wait: true,
            clipping: true,
            shifting: false,
            jumping: false,
            index_overflow: false,
        }
    }
}
