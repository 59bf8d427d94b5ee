//! App: terminal init, main loop, visibility handling, key actions.

use crate::SimConfig;
use crate::input::{Action, key_to_action};
use crate::schedule::Driver;
use crate::sim::{Advance, Phase, Simulator};
use crate::theme::Theme;
use crate::ui::{self, Effects, Status};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Redraw at ~60 FPS while anything moves; idle screens poll slower.
const FRAME: Duration = Duration::from_millis(16);
const IDLE_FRAME: Duration = Duration::from_millis(100);

pub struct App {
    config: SimConfig,
    theme: Theme,
    driver: Driver,
    effects: Effects,
    /// Terminal reported focus loss; ticks are cancelled until focus returns.
    hidden: bool,
    /// Pause requested with the pause key (as opposed to a focus-loss pause).
    user_paused: bool,
}

impl App {
    pub fn new(config: SimConfig, simulator: Simulator, theme: Theme) -> Self {
        let driver = Driver::new(simulator, config.timing);
        Self {
            config,
            theme,
            driver,
            effects: Effects::default(),
            hidden: false,
            user_paused: false,
        }
    }

    pub fn run(mut self) -> Result<()> {
        use crossterm::{
            event::{DisableFocusChange, EnableFocusChange},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        // Focus events are the visibility signal; terminals without them fall back to Space.
        let _ = execute!(stdout, EnableFocusChange);

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;
        terminal.hide_cursor()?;

        if self.config.autostart {
            self.start(Instant::now());
        }

        let result = self.run_loop(&mut terminal);

        let grid = self.driver.teardown();
        info!(filled = grid.filled_count(), "board closed");

        let _ = execute!(std::io::stdout(), DisableFocusChange);
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;
        terminal.show_cursor()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            let status = Status {
                hidden: self.hidden,
            };
            terminal.draw(|f| ui::draw(f, &self.driver, &self.theme, &mut self.effects, status, now))?;

            let frame = if self.driver.is_armed() || self.effects.is_animating() {
                FRAME
            } else {
                IDLE_FRAME
            };
            let timeout = frame.saturating_sub(now.elapsed());

            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    match event::read()? {
                        Event::Key(key) if key.kind == KeyEventKind::Press => {
                            if !self.handle_action(key_to_action(key)) {
                                return Ok(());
                            }
                        }
                        Event::FocusGained => self.on_visible(),
                        Event::FocusLost => self.on_hidden(),
                        _ => {}
                    }
                }
            }

            if let Some(adv) = self.driver.poll(Instant::now()) {
                self.on_advance(adv);
            }
        }
    }

    /// Returns false when the app should exit.
    fn handle_action(&mut self, action: Action) -> bool {
        let now = Instant::now();
        match action {
            Action::Quit => return false,
            Action::Start => match self.driver.sim().phase() {
                Phase::Idle => self.start(now),
                Phase::Halted(_) => self.restart(now),
                _ => {}
            },
            Action::Pause => {
                if self.driver.sim().phase() == Phase::Idle || self.driver.sim().is_halted() {
                    return true;
                }
                self.user_paused = !self.user_paused;
                if self.user_paused {
                    self.driver.pause();
                } else if !self.hidden {
                    self.driver.resume(now);
                }
                debug!(paused = self.user_paused, "pause toggled");
            }
            Action::Reset => self.restart(now),
            Action::Step => {
                if self.user_paused {
                    let adv = self.driver.step();
                    self.on_advance(adv);
                }
            }
            Action::None => {}
        }
        true
    }

    fn start(&mut self, now: Instant) {
        self.effects.start_intro();
        self.driver.start(now);
        if let Some(piece) = self.driver.sim().active() {
            info!(landing_row = piece.landing_row, "simulation started");
        }
    }

    fn restart(&mut self, now: Instant) {
        self.effects.clear();
        self.effects.start_intro();
        self.user_paused = false;
        self.driver.resume(now);
        self.driver.restart(now);
        if self.hidden {
            self.driver.pause();
        }
    }

    fn on_visible(&mut self) {
        let now = Instant::now();
        let was_hidden = std::mem::replace(&mut self.hidden, false);
        debug!(was_hidden, "focus gained");
        if self.driver.sim().phase() == Phase::Idle {
            self.start(now);
        } else if was_hidden && !self.user_paused {
            self.driver.resume(now);
        }
    }

    fn on_hidden(&mut self) {
        debug!("focus lost");
        self.hidden = true;
        self.driver.pause();
    }

    fn on_advance(&mut self, adv: Advance) {
        match adv {
            Advance::Committed { step, row } => {
                let placement = self.driver.sim().sequence()[step];
                let shape = &self.driver.sim().shapes()[placement.shape];
                let cells = shape
                    .filled()
                    .map(|(r, c)| (row + r, placement.column + c))
                    .collect();
                self.effects.flash(cells);
            }
            Advance::Halted(reason) => info!(?reason, "animation finished"),
            Advance::Activated(_) | Advance::Fell { .. } | Advance::Idle => {}
        }
    }
}
