//! Layout and drawing: board, sidebar panels, overlays, commit flash and intro fade.

use crate::board::{Cell, Grid};
use crate::schedule::Driver;
use crate::shapes::Shape;
use crate::sim::{HaltReason, Phase};
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Gauge, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Each board cell is two terminal columns wide so it reads roughly square.
const CELL_WIDTH: u16 = 2;
const CELL_HEIGHT: u16 = 1;
const SIDEBAR_WIDTH: u16 = 26;
const PREVIEW_COUNT: usize = 3;

/// Commit flash (white → block colour).
const FLASH_MS: u32 = 250;
/// Board fade-in when the simulation starts.
const INTRO_MS: u32 = 600;

/// Board size in terminal cells including the border.
pub fn board_outer_size(rows: usize, cols: usize) -> (u16, u16) {
    (cols as u16 * CELL_WIDTH + 2, rows as u16 * CELL_HEIGHT + 2)
}

/// Running tachyonfx effects and the clock used to feed them deltas.
#[derive(Default)]
pub struct Effects {
    intro: Option<Effect>,
    intro_pending: bool,
    flash: Option<Effect>,
    flash_cells: Vec<(usize, usize)>,
    last_process: Option<Instant>,
}

impl Effects {
    pub fn start_intro(&mut self) {
        self.intro = None;
        self.intro_pending = true;
    }

    /// Flash the given board cells (row, col) on the next frame.
    pub fn flash(&mut self, cells: Vec<(usize, usize)>) {
        self.flash = None;
        self.flash_cells = cells;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_animating(&self) -> bool {
        self.intro_pending
            || !self.flash_cells.is_empty()
            || self.intro.as_ref().is_some_and(|e| !e.done())
            || self.flash.as_ref().is_some_and(|e| !e.done())
    }
}

/// What the app wants shown on top of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// Terminal lost focus; the schedule is cancelled until it comes back.
    pub hidden: bool,
}

/// Centred board (border included) and sidebar rects.
fn layout(area: Rect, grid: &Grid) -> (Rect, Rect) {
    let (bw, bh) = board_outer_size(grid.rows(), grid.cols());
    let total_w = bw + SIDEBAR_WIDTH;
    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(bh.max(20)),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(bw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert[1]);
    let board = Rect {
        height: bh.min(inner[0].height),
        ..inner[0]
    };
    (board, inner[1])
}

pub fn draw(
    frame: &mut Frame,
    driver: &Driver,
    theme: &Theme,
    effects: &mut Effects,
    status: Status,
    now: Instant,
) {
    let area = frame.area();
    Block::default()
        .style(Style::default().bg(theme.bg))
        .render(area, frame.buffer_mut());

    let sim = driver.sim();
    let snapshot = sim.snapshot();
    let (board_area, sidebar_area) = layout(area, &snapshot);
    let (need_w, need_h) = board_outer_size(snapshot.rows(), snapshot.cols());
    if area.width < need_w || area.height < need_h {
        draw_too_small(frame, theme, area, need_w, need_h);
        return;
    }

    let title = match sim.phase() {
        Phase::Halted(HaltReason::Exhausted) => Span::styled(" done ", Color::Green),
        Phase::Halted(HaltReason::BoardFull { .. }) => Span::styled(" board full ", Color::Red),
        Phase::Halted(HaltReason::Rejected { .. }) => Span::styled(" rejected ", Color::Red),
        _ => Span::styled(" stackfall ", theme.title),
    };
    let board_inner = draw_board(frame, theme, &snapshot, board_area, title);
    draw_sidebar(frame, driver, theme, sidebar_area);
    apply_effects(frame, theme, effects, board_inner, now);

    match sim.phase() {
        Phase::Idle => draw_popup(
            frame,
            theme,
            board_area,
            " Ready ",
            theme.title,
            &["Space — Start", "Q — Quit"],
        ),
        Phase::Halted(_) => {}
        _ if status.hidden => draw_popup(
            frame,
            theme,
            board_area,
            " Hidden ",
            theme.inactive_fg,
            &["Waiting for focus"],
        ),
        _ if driver.is_paused() => draw_popup(
            frame,
            theme,
            board_area,
            " Paused ",
            Color::Yellow,
            &["P — Resume", "N — Step"],
        ),
        _ => {}
    }
}

fn draw_too_small(frame: &mut Frame, theme: &Theme, area: Rect, w: u16, h: u16) {
    let msg = format!("Terminal too small: need {w}×{h}");
    Paragraph::new(Line::from(Span::styled(msg, Style::default().fg(theme.main_fg))))
        .alignment(Alignment::Center)
        .render(area, frame.buffer_mut());
}

/// Paint the snapshot; returns the inner (cells only) rect.
fn draw_board(
    frame: &mut Frame,
    theme: &Theme,
    grid: &Grid,
    area: Rect,
    title: Span<'_>,
) -> Rect {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(title);
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());

    let buf = frame.buffer_mut();
    for (r, row) in grid.iter_rows().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let color = match cell {
                Cell::Filled(tag) => theme.block_color(*tag),
                Cell::Empty => theme.empty,
            };
            let x = inner.x + c as u16 * CELL_WIDTH;
            let y = inner.y + r as u16 * CELL_HEIGHT;
            if x + 1 >= inner.x + inner.width || y >= inner.y + inner.height {
                continue;
            }
            buf[(x, y)]
                .set_symbol("█")
                .set_style(Style::default().fg(color).bg(theme.bg));
            // Right half leaves a sliver of background as the grid line.
            buf[(x + 1, y)]
                .set_symbol("▊")
                .set_style(Style::default().fg(color).bg(theme.bg));
        }
    }
    inner
}

fn draw_sidebar(frame: &mut Frame, driver: &Driver, theme: &Theme, area: Rect) {
    let sim = driver.sim();
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7), // Piece
            Constraint::Length(4), // Progress
            Constraint::Length(5), // Up next
            Constraint::Length(4), // Keys
        ])
        .split(area);

    // --- Piece ---
    let piece_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Span::styled(" Piece ", title_style));
    let piece_inner = piece_block.inner(chunks[0]);
    piece_block.render(chunks[0], frame.buffer_mut());
    let state = match sim.phase() {
        Phase::Idle => "waiting",
        Phase::Falling(_) => "falling",
        Phase::Settling { .. } => "settling",
        Phase::Halted(HaltReason::Exhausted) => "done",
        Phase::Halted(HaltReason::BoardFull { .. }) => "board full",
        Phase::Halted(HaltReason::Rejected { .. }) => "rejected",
    };
    let mut lines = vec![Line::from(vec![
        Span::styled("State: ", title_style),
        Span::styled(state, fg_style),
    ])];
    if let Some(piece) = sim.active() {
        let shape = &sim.shapes()[piece.shape];
        lines.extend([
            Line::from(vec![
                Span::styled("Shape: ", title_style),
                Span::styled(
                    shape.name.to_string(),
                    Style::default().fg(theme.block_color(shape.fill)).bold(),
                ),
            ]),
            Line::from(vec![
                Span::styled("Column: ", title_style),
                Span::styled(piece.column.to_string(), fg_style),
            ]),
            Line::from(vec![
                Span::styled("Row: ", title_style),
                Span::styled(format!("{} → {}", piece.row, piece.landing_row), fg_style),
            ]),
        ]);
    }
    let timing = driver.timing();
    lines.push(Line::from(Span::styled(
        format!(
            "{}ms fall / {}ms settle",
            timing.fall.as_millis(),
            timing.settle.as_millis()
        ),
        Style::default().fg(theme.inactive_fg),
    )));
    Paragraph::new(Text::from(lines)).render(piece_inner, frame.buffer_mut());

    // --- Progress ---
    let total = sim.sequence().len();
    let done = sim.committed();
    let progress_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Span::styled(format!(" Placed {done}/{total} "), title_style));
    let progress_inner = progress_block.inner(chunks[1]);
    progress_block.render(chunks[1], frame.buffer_mut());
    let ratio = if total > 0 {
        (done as f64 / total as f64).min(1.0)
    } else {
        1.0
    };
    let grid = sim.grid();
    let fill_ratio = grid.filled_count() as f64 / (grid.rows() * grid.cols()).max(1) as f64;
    let progress_rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(progress_inner);
    Gauge::default()
        .ratio(ratio)
        .label("")
        .gauge_style(Style::default().fg(theme.block_color(crate::shapes::FillTag(3))))
        .render(progress_rows[0], frame.buffer_mut());
    Paragraph::new(Line::from(Span::styled(
        format!("Board {:.0}% full", fill_ratio * 100.0),
        fg_style,
    )))
    .render(progress_rows[1], frame.buffer_mut());

    // --- Up next ---
    let next_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Span::styled(" Up next ", title_style));
    let next_inner = next_block.inner(chunks[2]);
    next_block.render(chunks[2], frame.buffer_mut());
    let first_pending = match sim.phase() {
        Phase::Idle => 0,
        Phase::Falling(p) => p.step + 1,
        Phase::Settling { next } => next,
        Phase::Halted(_) => total,
    };
    let upcoming = sim.sequence().iter().skip(first_pending).take(PREVIEW_COUNT);
    let slot_w = 8u16;
    for (i, placement) in upcoming.enumerate() {
        let slot = Rect {
            x: next_inner.x + i as u16 * slot_w,
            y: next_inner.y,
            width: slot_w.min(next_inner.width.saturating_sub(i as u16 * slot_w)),
            height: next_inner.height,
        };
        draw_shape_preview(frame, theme, &sim.shapes()[placement.shape], slot);
    }

    // --- Keys ---
    let keys_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let keys_inner = keys_block.inner(chunks[3]);
    keys_block.render(chunks[3], frame.buffer_mut());
    let hint = Style::default().fg(theme.inactive_fg);
    Paragraph::new(Text::from(vec![
        Line::from(Span::styled("Space start  P pause", hint)),
        Line::from(Span::styled("N step  R reset  Q quit", hint)),
    ]))
    .render(keys_inner, frame.buffer_mut());
}

/// Small block preview of a shape (one "██" per filled mask cell).
fn draw_shape_preview(frame: &mut Frame, theme: &Theme, shape: &Shape, area: Rect) {
    let color = theme.block_color(shape.fill);
    let w = shape.width() as u16 * CELL_WIDTH;
    let h = shape.height() as u16 * CELL_HEIGHT;
    let off_x = area.width.saturating_sub(w) / 2;
    let off_y = area.height.saturating_sub(h) / 2;
    let buf = frame.buffer_mut();
    for (r, c) in shape.filled() {
        let x = area.x + off_x + c as u16 * CELL_WIDTH;
        let y = area.y + off_y + r as u16 * CELL_HEIGHT;
        if x + 1 < area.x + area.width && y < area.y + area.height {
            buf.set_string(x, y, "██", Style::default().fg(color));
        }
    }
}

fn draw_popup(
    frame: &mut Frame,
    theme: &Theme,
    over: Rect,
    title: &str,
    title_color: Color,
    hints: &[&str],
) {
    let popup_w = 20u16.min(over.width);
    let popup_h = (hints.len() as u16 + 4).min(over.height);
    let popup = Rect {
        x: over.x + over.width.saturating_sub(popup_w) / 2,
        y: over.y + over.height.saturating_sub(popup_h) / 2,
        width: popup_w,
        height: popup_h,
    };
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            title.to_string(),
            Style::default().fg(Color::Black).bg(title_color),
        )),
        Line::from(""),
    ];
    lines.extend(
        hints
            .iter()
            .map(|h| Line::from(Span::styled(*h, Style::default().fg(theme.main_fg)))),
    );
    Clear.render(popup, frame.buffer_mut());
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::NONE)
                .style(Style::default().bg(theme.bg)),
        )
        .render(popup, frame.buffer_mut());
}

/// Buffer positions covered by the given board cells.
fn cell_positions(board: Rect, cells: &[(usize, usize)]) -> HashSet<(u16, u16)> {
    let mut set = HashSet::new();
    for &(r, c) in cells {
        let x0 = board.x + c as u16 * CELL_WIDTH;
        let y0 = board.y + r as u16 * CELL_HEIGHT;
        for x in x0..(x0 + CELL_WIDTH).min(board.x + board.width) {
            for y in y0..(y0 + CELL_HEIGHT).min(board.y + board.height) {
                set.insert((x, y));
            }
        }
    }
    set
}

/// Create pending effects and advance running ones by the time since the last frame.
fn apply_effects(frame: &mut Frame, theme: &Theme, effects: &mut Effects, board: Rect, now: Instant) {
    let delta = effects
        .last_process
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    effects.last_process = Some(now);
    let tfx_delta = TfxDuration::from_millis(delta.as_millis().min(u32::MAX as u128) as u32);

    if effects.intro_pending {
        effects.intro_pending = false;
        effects.intro = Some(
            fx::fade_from(theme.bg, theme.bg, (INTRO_MS, Interpolation::QuadOut)).with_area(board),
        );
    }
    if !effects.flash_cells.is_empty() {
        let positions = cell_positions(board, &std::mem::take(&mut effects.flash_cells));
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            positions.contains(&(pos.x, pos.y))
        }));
        effects.flash = Some(
            fx::fade_from(Color::White, Color::White, (FLASH_MS, Interpolation::Linear))
                .with_filter(filter)
                .with_area(board),
        );
    }

    for slot in [&mut effects.intro, &mut effects.flash] {
        let done = match slot.as_mut() {
            Some(effect) => {
                frame.render_effect(effect, board, tfx_delta);
                effect.done()
            }
            None => false,
        };
        if done {
            *slot = None;
        }
    }
}
