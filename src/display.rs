use std::io;
use tui::backend::CrosstermBackend;
use tui::layout::Rect;
use tui::style::{Color, Style};
use tui::symbols::Marker;
use tui::widgets::canvas::{Canvas, Points};
use tui::widgets::{Block, Borders};
use tui::Terminal;

use crate::machine::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// Renderer seam. The driver hands over the 64x32 cells (row-major,
/// `y * 64 + x`) whenever the frame deadline hits and the buffer is dirty;
/// how they end up on an actual screen is this trait's problem.
pub trait Display {
    fn draw(&mut self, pixels: &[bool]) -> Result<(), io::Error>;
}

/// monochrome terminal renderer on a TUI canvas over crossterm
pub struct MonoTermDisplay {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    foreground: Color,
}

impl MonoTermDisplay {
    pub fn new(foreground: Color) -> Result<MonoTermDisplay, io::Error> {
        let backend = CrosstermBackend::new(io::stdout());
        let terminal = Terminal::new(backend)?;
        Ok(MonoTermDisplay {
            terminal,
            foreground,
        })
    }

    /// expand lit/unlit cells to canvas coordinates. TUI's canvas y axis
    /// points up, the chip-8's points down, hence the negation
    fn coords(pixels: &[bool], lit: bool) -> Vec<(f64, f64)> {
        pixels
            .iter()
            .enumerate()
            .filter(|(_, px)| **px == lit)
            .map(|(i, _)| {
                (
                    (i % SCREEN_WIDTH) as f64,
                    -1.0 * (i / SCREEN_WIDTH) as f64,
                )
            })
            .collect()
    }
}

impl Display for MonoTermDisplay {
    fn draw(&mut self, pixels: &[bool]) -> Result<(), io::Error> {
        assert_eq!(
            pixels.len(),
            SCREEN_WIDTH * SCREEN_HEIGHT,
            "MonoTermDisplay needs exactly one cell per pixel"
        );
        let foreground = self.foreground;
        self.terminal.draw(|f| {
            let size = Rect::new(0, 0, 2 + SCREEN_WIDTH as u16, 2 + SCREEN_HEIGHT as u16);
            let canvas = Canvas::default()
                .block(
                    Block::default()
                        .title("cosmac8")
                        .borders(Borders::ALL)
                        .style(Style::default().bg(Color::Black)),
                )
                .x_bounds([0.0, (SCREEN_WIDTH - 1) as f64])
                .y_bounds([-1.0 * (SCREEN_HEIGHT - 1) as f64, 0.0])
                .marker(Marker::Block)
                .paint(|ctx| {
                    ctx.draw(&Points {
                        coords: &Self::coords(pixels, false),
                        color: Color::Black,
                    });
                    ctx.draw(&Points {
                        coords: &Self::coords(pixels, true),
                        color: foreground,
                    });
                });
            f.render_widget(canvas, size);
        })?;
        Ok(())
    }
}

/// named colours accepted by --color
pub fn parse_color(name: &str) -> Option<Color> {
    match name.to_ascii_lowercase().as_str() {
        "white" => Some(Color::White),
        "green" => Some(Color::Green),
        "red" => Some(Color::Red),
        "blue" => Some(Color::Blue),
        "yellow" => Some(Color::Yellow),
        "cyan" => Some(Color::Cyan),
        "magenta" => Some(Color::Magenta),
        "gray" | "grey" => Some(Color::Gray),
        _ => None,
    }
}

/// useful for testing non-display routines
pub struct DummyDisplay {
    pub frames: usize,
}

impl DummyDisplay {
    pub fn new() -> Self {
        DummyDisplay { frames: 0 }
    }
}

impl Default for DummyDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for DummyDisplay {
    fn draw(&mut self, _pixels: &[bool]) -> Result<(), io::Error> {
        self.frames += 1;
        Ok(())
    }
}
