//! Stackfall: a falling-block stacking animation in the terminal.

mod app;
mod board;
mod input;
mod logging;
mod schedule;
mod shapes;
mod sim;
mod theme;
mod ui;

use anyhow::Result;
use app::App;
use clap::{Parser, ValueEnum};
use schedule::Timing;
use sim::{Placement, Simulator};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Settings derived from the CLI that shape the simulation (grid size, timing, drop sequence).
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub rows: usize,
    pub cols: usize,
    pub timing: Timing,
    pub sequence: Vec<Placement>,
    pub autostart: bool,
}

impl SimConfig {
    pub fn from_args(args: &Args) -> Result<Self, SequenceError> {
        let sequence = match args.sequence.as_deref() {
            Some(spec) => parse_sequence(spec)?,
            None => sim::DEFAULT_SEQUENCE.to_vec(),
        };
        Ok(Self {
            rows: args.rows as usize,
            cols: args.cols as usize,
            timing: Timing {
                fall: Duration::from_millis(args.fall_ms),
                settle: Duration::from_millis(args.settle_ms),
            },
            sequence,
            autostart: args.autostart,
        })
    }

    pub fn build_simulator(&self) -> Result<Simulator, sim::SimError> {
        Simulator::new(
            self.rows,
            self.cols,
            shapes::SHAPES.to_vec(),
            self.sequence.clone(),
        )
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = &args.log_file {
        logging::init_log_file(path)?;
    }
    let config = SimConfig::from_args(&args)?;
    let simulator = config.build_simulator()?;
    tracing::info!(
        rows = config.rows,
        cols = config.cols,
        pieces = config.sequence.len(),
        "simulator ready"
    );
    if args.headless {
        return run_headless(simulator, args.frames);
    }
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    App::new(config, simulator, theme).run()
}

/// No terminal UI: tick to the end and print snapshots as text.
fn run_headless(mut simulator: Simulator, frames: bool) -> Result<()> {
    use std::io::Write;
    let mut out = std::io::stdout().lock();
    let reason = if frames {
        simulator.start();
        let mut last = simulator.revision();
        writeln!(out, "{}", simulator.snapshot())?;
        loop {
            simulator.tick();
            if simulator.revision() != last {
                writeln!(out, "{}", simulator.snapshot())?;
                last = simulator.revision();
            }
            if let sim::Phase::Halted(reason) = simulator.phase() {
                break reason;
            }
        }
    } else {
        let reason = simulator.run_to_end();
        write!(out, "{}", simulator.grid())?;
        reason
    };
    match reason {
        sim::HaltReason::Exhausted => writeln!(out, "done: all {} pieces placed", simulator.committed())?,
        sim::HaltReason::BoardFull { step } => writeln!(out, "done: board full at piece {}", step + 1)?,
        sim::HaltReason::Rejected { step } => writeln!(out, "done: piece {} rejected", step + 1)?,
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("sequence item {index} ({item:?}): expected SHAPE@COLUMN")]
    Malformed { index: usize, item: String },
    #[error("sequence item {index}: unknown shape {shape:?} (use I, O, T, S, Z or 0-4)")]
    UnknownShape { index: usize, shape: String },
    #[error("sequence item {index}: invalid column {column:?}")]
    BadColumn { index: usize, column: String },
}

/// Parse `I@2,O@3,2@2,...`: shape letter or index, then the leftmost column.
pub fn parse_sequence(spec: &str) -> Result<Vec<Placement>, SequenceError> {
    spec.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .enumerate()
        .map(|(index, item)| {
            let (shape, column) = item.split_once('@').ok_or_else(|| SequenceError::Malformed {
                index,
                item: item.to_string(),
            })?;
            let (shape, column) = (shape.trim(), column.trim());
            let unknown = || SequenceError::UnknownShape {
                index,
                shape: shape.to_string(),
            };
            let shape_idx = match shape.parse::<usize>() {
                Ok(i) if i < shapes::SHAPES.len() => i,
                Ok(_) => return Err(unknown()),
                Err(_) => {
                    let mut chars = shape.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => shapes::index_of(c).ok_or_else(unknown)?,
                        _ => return Err(unknown()),
                    }
                }
            };
            let column = column.parse::<usize>().map_err(|_| SequenceError::BadColumn {
                index,
                column: column.to_string(),
            })?;
            Ok(Placement {
                shape: shape_idx,
                column,
            })
        })
        .collect()
}

/// Falling-block stacking animation in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "stackfall",
    version,
    about = "Falling-block stacking animation in the terminal. Pieces drop one at a time and settle where they land.",
    long_about = "Stackfall drops a fixed sequence of tetrominoes onto a small board. Each piece \
        falls to the lowest row it fits, commits, and after a short pause the next one drops. \
        There is no line clearing: the stack only grows until the sequence ends or a piece no \
        longer fits.\n\n\
        CONTROLS:\n  Space/Enter Start (restart when finished)   P  Pause\n  N / j / Down  Single step while paused   R  Reset   Q / Esc  Quit\n\n\
        The animation starts when the terminal gains focus, on Space, or immediately with --autostart."
)]
pub struct Args {
    /// Board height in rows.
    #[arg(long, default_value = "12", value_name = "ROWS", value_parser = clap::value_parser!(u16).range(1..=64))]
    pub rows: u16,

    /// Board width in columns.
    #[arg(long, default_value = "8", value_name = "COLS", value_parser = clap::value_parser!(u16).range(1..=64))]
    pub cols: u16,

    /// Time between fall steps of the active piece.
    #[arg(long, default_value = "100", value_name = "MS")]
    pub fall_ms: u64,

    /// Pause between a piece committing and the next one appearing.
    #[arg(long, default_value = "500", value_name = "MS")]
    pub settle_ms: u64,

    /// Drop sequence as SHAPE@COLUMN items, e.g. "I@2,O@3,T@2". Shapes: I O T S Z or 0-4.
    #[arg(short, long, value_name = "SPEC")]
    pub sequence: Option<String>,

    /// Path to theme file (btop-style theme[key]="value"). Built-in colours if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Start dropping immediately instead of waiting for focus or a key.
    #[arg(long)]
    pub autostart: bool,

    /// No terminal UI: run to the end and print the final board as text.
    #[arg(long)]
    pub headless: bool,

    /// With --headless, print every intermediate board too.
    #[arg(long, requires = "headless")]
    pub frames: bool,

    /// Write logs to this file (level from RUST_LOG, default info).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}
