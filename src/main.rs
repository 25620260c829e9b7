use clap::Parser;
use std::error::Error;
use std::fs::File;
use std::time::Duration;

use cosmac8::display::{parse_color, MonoTermDisplay};
use cosmac8::emulator::Emulator;
use cosmac8::input::TermInput;
use cosmac8::quirks::Quirks;
use cosmac8::sound::{Mute, SimpleBeep, Sound};

/// CHIP-8 interpreter for the terminal
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// path to a chip-8 ROM (flat byte stream, loaded at 0x200)
    rom: std::path::PathBuf,

    /// speed multiplier over the 660 instructions/second base rate
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// foreground colour (white, green, red, blue, yellow, cyan, magenta,
    /// gray)
    #[arg(long, default_value = "green")]
    color: String,

    /// disable the buzzer
    #[arg(long)]
    mute: bool,

    /// how recently a key must have been seen down to count as pressed
    #[arg(long, default_value_t = 200)]
    key_window_ms: u64,

    /// 8XY1/8XY2/8XY3 leave VF alone instead of clearing it
    #[arg(long)]
    no_vf_reset: bool,

    /// FX55/FX65 leave I untouched instead of stepping past the block
    #[arg(long)]
    no_memory_increment: bool,

    /// allow more than one sprite draw per frame
    #[arg(long)]
    no_display_wait: bool,

    /// sprites wrap at the display edges instead of clipping
    #[arg(long)]
    no_clipping: bool,

    /// 8XY6/8XYE shift VX in place instead of shifting VY into VX
    #[arg(long)]
    shift_vx: bool,

    /// BNNN jumps to NNN + VX instead of NNN + V0
    #[arg(long)]
    jump_vx: bool,

    /// FX1E sets VF when I overflows past 0xFFF
    #[arg(long)]
    index_carry: bool,
}

impl Args {
    fn quirks(&self) -> Quirks {
        Quirks {
            vf_reset: !self.no_vf_reset,
            memory_increment: !self.no_memory_increment,
            display_wait: !self.no_display_wait,
            clipping: !self.no_clipping,
            shifting: self.shift_vx,
            jumping: self.jump_vx,
            index_overflow: self.index_carry,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    if !(args.speed.is_finite() && args.speed > 0.0) {
        return Err(format!("--speed must be positive, got {}", args.speed).into());
    }
    let color = parse_color(&args.color)
        .ok_or_else(|| format!("unknown colour {:?}", args.color))?;

    let mut rom = File::open(&args.rom)?;

    let mut display = MonoTermDisplay::new(color)?;
    let mut input = TermInput::new()?;
    let mut sound: Box<dyn Sound> = if args.mute {
        Box::new(Mute::new())
    } else {
        Box::new(SimpleBeep::new())
    };

    let mut emulator = Emulator::new(
        &mut display,
        &mut input,
        &mut *sound,
        args.quirks(),
        args.speed,
        Duration::from_millis(args.key_window_ms),
    );
    emulator.load_program(&mut rom)?;
    emulator.run()?;

    // shove some newlines at stdout so the prompt doesn't land inside the
    // last frame
    for _ in 0..12 {
        println!();
    }
    Ok(())
}
