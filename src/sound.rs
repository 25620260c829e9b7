use beep::beep;
use std::error::Error;

/// frequency of the emulated buzzer. the original just loops a beep.wav;
/// a C above concert pitch is close enough
const BUZZER_PITCH: u16 = 2093;

/// Audio seam. The driver polls once per cycle with "should the tone be
/// playing", i.e. `sound_timer > 0`; implementations are edge-triggered so
/// the per-cycle poll stays cheap.
pub trait Sound {
    fn update(&mut self, active: bool) -> Result<(), Box<dyn Error>>;
}

/// square wave through the PC speaker
pub struct SimpleBeep {
    is_beeping: bool,
}

impl SimpleBeep {
    pub fn new() -> Self {
        SimpleBeep { is_beeping: false }
    }
}

impl Default for SimpleBeep {
    fn default() -> Self {
        Self::new()
    }
}

impl Sound for SimpleBeep {
    fn update(&mut self, active: bool) -> Result<(), Box<dyn Error>> {
        if active == self.is_beeping {
            return Ok(());
        }
        beep(if active { BUZZER_PITCH } else { 0 })?;
        self.is_beeping = active;
        Ok(())
    }
}

/// for machines without a speaker, and for tests
pub struct Mute {
    pub active_polls: usize,
}

impl Mute {
    pub fn new() -> Self {
        Mute { active_polls: 0 }
    }
}

impl Default for Mute {
    fn default() -> Self {
        Self::new()
    }
}

impl Sound for Mute {
    fn update(&mut self, active: bool) -> Result<(), Box<dyn Error>> {
        if active {
            self.active_polls += 1;
        }
        Ok(())
    }
}
