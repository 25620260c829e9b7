use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::error::Error;
use std::io;
use std::time::{Duration, Instant};

use crate::display::Display;
use crate::exec::execute;
use crate::input::Input;
use crate::instruction::Instruction;
use crate::machine::{Machine, ROM_START};
use crate::quirks::Quirks;
use crate::sound::Sound;
use crate::timing::{millis_since, Pacer};

/// The one logical actor in the system: owns the machine and runs
/// fetch -> decode/execute -> timer update -> frame-due check -> input
/// sampling -> pacing sleep, strictly in sequence, until PC passes the end
/// of the loaded ROM. The display, input and sound collaborators are
/// borrowed for the length of the run.
pub struct Emulator<'a> {
    machine: Machine,
    quirks: Quirks,
    pacer: Pacer,
    rng: StdRng,
    display: &'a mut dyn Display,
    input: &'a mut dyn Input,
    sound: &'a mut dyn Sound,
    rom_end: u16,
}

impl<'a> Emulator<'a> {
    pub fn new(
        display: &'a mut dyn Display,
        input: &'a mut dyn Input,
        sound: &'a mut dyn Sound,
        quirks: Quirks,
        speed_scale: f64,
        key_window: Duration,
    ) -> Self {
        Emulator {
            machine: Machine::new(key_window),
            quirks,
            pacer: Pacer::new(speed_scale),
            rng: StdRng::from_entropy(),
            display,
            input,
            sound,
            rom_end: ROM_START,
        }
    }

    /// load a chip-8 program; its extent becomes the termination bound
    pub fn load_program(&mut self, reader: &mut impl io::Read) -> Result<(), io::Error> {
        let len = self.machine.load_rom(reader)?;
        self.rom_end = ROM_START + len as u16;
        info!(
            "loaded {} byte ROM, running to {:#06x} at {:.0} instructions/s",
            len,
            self.rom_end,
            self.pacer.target_rate(),
        );
        Ok(())
    }

    /// the main loop. returns when the program counter runs off the end of
    /// the ROM or the user asks to quit
    pub fn run(&mut self) -> Result<(), Box<dyn Error>> {
        let started = Instant::now();

        while self.machine.pc < self.rom_end {
            let now = Instant::now();
            let word = self.machine.fetch();

            // tone on while the sound timer counts down
            self.sound.update(self.machine.sound_timer > 0)?;

            execute(
                &mut self.machine,
                Instruction::decode(word),
                &self.quirks,
                &mut self.rng,
                now,
            );

            self.machine.update_timers(Instant::now());

            if self.pacer.frame_due() {
                if self.machine.take_dirty() {
                    self.display.draw(self.machine.display())?;
                }
                // a new sprite draw may proceed next frame
                self.machine.display_wait_counter = 0;
                self.pacer.frame_rendered();
            }

            for key in self.input.poll_keys()? {
                self.machine.press_key(key, Instant::now());
            }
            if self.input.quit_requested() {
                info!("quit requested");
                break;
            }

            if let Some(ips) = self.pacer.track_instruction() {
                debug!("instructions per second: {:.0}", ips);
            }
            self.pacer.sleep_for_instruction();
        }

        self.sound.update(false)?;
        info!("run ended after {}ms at {:#06x}", millis_since(started), self.machine.pc);
        Ok(())
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }
}
