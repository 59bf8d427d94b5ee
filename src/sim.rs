//! Board stacking simulator: drops a fixed sequence of pieces one at a time.

use crate::board::{self, Grid, PlacementError};
use crate::shapes::Shape;
use thiserror::Error;
use tracing::{debug, info, warn};

/// One entry of the drop sequence: which shape, and the leftmost column of its bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub shape: usize,
    pub column: usize,
}

/// Sequence used by the hero animation: I, O, T, S, Z twice.
pub const DEFAULT_SEQUENCE: [Placement; 10] = [
    Placement { shape: 0, column: 2 },
    Placement { shape: 1, column: 3 },
    Placement { shape: 2, column: 2 },
    Placement { shape: 3, column: 2 },
    Placement { shape: 4, column: 3 },
    Placement { shape: 0, column: 2 },
    Placement { shape: 1, column: 3 },
    Placement { shape: 2, column: 2 },
    Placement { shape: 3, column: 2 },
    Placement { shape: 4, column: 3 },
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("grid must have at least one row and one column (got {rows}x{cols})")]
    EmptyGrid { rows: usize, cols: usize },
    #[error("placement {step}: unknown shape index {shape}")]
    UnknownShape { step: usize, shape: usize },
    #[error("placement {step}: {source}")]
    InvalidPlacement {
        step: usize,
        #[source]
        source: PlacementError,
    },
}

/// Piece currently falling. `row` is the top of its bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivePiece {
    pub step: usize,
    pub shape: usize,
    pub row: usize,
    pub column: usize,
    pub landing_row: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// Every placement was committed.
    Exhausted,
    /// Placement `step` had no valid landing row.
    BoardFull { step: usize },
    /// Placement `step` was refused by the grid (out of bounds or overlapping).
    Rejected { step: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Falling(ActivePiece),
    /// Waiting out the settle delay before placement `next` activates.
    Settling { next: usize },
    Halted(HaltReason),
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Nothing to do (idle or halted).
    Idle,
    Activated(ActivePiece),
    Fell { row: usize },
    Committed { step: usize, row: usize },
    Halted(HaltReason),
}

#[derive(Debug, Clone)]
pub struct Simulator {
    grid: Grid,
    shapes: Vec<Shape>,
    sequence: Vec<Placement>,
    phase: Phase,
    revision: u64,
}

impl Simulator {
    /// Validate every placement against the grid width up front; out-of-range columns are
    /// rejected rather than clipped.
    pub fn new(
        rows: usize,
        cols: usize,
        shapes: Vec<Shape>,
        sequence: Vec<Placement>,
    ) -> Result<Self, SimError> {
        if rows == 0 || cols == 0 {
            return Err(SimError::EmptyGrid { rows, cols });
        }
        let grid = Grid::new(rows, cols);
        for (step, p) in sequence.iter().enumerate() {
            let shape = shapes.get(p.shape).ok_or(SimError::UnknownShape {
                step,
                shape: p.shape,
            })?;
            board::landing_row(&grid, shape, p.column)
                .map_err(|source| SimError::InvalidPlacement { step, source })?;
        }
        Ok(Self {
            grid,
            shapes,
            sequence,
            phase: Phase::Idle,
            revision: 0,
        })
    }

    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn sequence(&self) -> &[Placement] {
        &self.sequence
    }

    pub fn active(&self) -> Option<&ActivePiece> {
        match &self.phase {
            Phase::Falling(piece) => Some(piece),
            _ => None,
        }
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.phase, Phase::Halted(_))
    }

    /// Number of placements committed so far.
    pub fn committed(&self) -> usize {
        match self.phase {
            Phase::Idle => 0,
            Phase::Falling(p) => p.step,
            Phase::Settling { next } => next,
            Phase::Halted(HaltReason::Exhausted) => self.sequence.len(),
            Phase::Halted(
                HaltReason::BoardFull { step } | HaltReason::Rejected { step },
            ) => step,
        }
    }

    /// Activate the first placement. No-op unless idle.
    pub fn start(&mut self) -> Advance {
        if self.phase != Phase::Idle {
            return Advance::Idle;
        }
        self.activate(0)
    }

    /// Back to idle with an empty grid; the sequence is kept.
    pub fn reset(&mut self) {
        self.grid = Grid::new(self.grid.rows(), self.grid.cols());
        self.phase = Phase::Idle;
        self.bump();
        debug!("simulator reset");
    }

    /// Advance the state machine by one discrete tick.
    pub fn tick(&mut self) -> Advance {
        match self.phase {
            Phase::Idle | Phase::Halted(_) => Advance::Idle,
            Phase::Settling { next } => self.activate(next),
            Phase::Falling(piece) => self.advance(piece),
        }
    }

    /// Falling piece step: one row lower, or commit once it reaches its landing row.
    fn advance(&mut self, mut piece: ActivePiece) -> Advance {
        if piece.row < piece.landing_row {
            piece.row += 1;
            self.phase = Phase::Falling(piece);
            self.bump();
            return Advance::Fell { row: piece.row };
        }
        let shape = &self.shapes[piece.shape];
        if let Err(err) = self.grid.commit(shape, piece.landing_row, piece.column) {
            warn!(step = piece.step, %err, "commit rejected; halting");
            return self.halt(HaltReason::Rejected { step: piece.step });
        }
        info!(
            step = piece.step,
            shape = %shape.name,
            row = piece.landing_row,
            column = piece.column,
            "piece committed"
        );
        self.phase = Phase::Settling {
            next: piece.step + 1,
        };
        self.bump();
        Advance::Committed {
            step: piece.step,
            row: piece.landing_row,
        }
    }

    fn activate(&mut self, step: usize) -> Advance {
        let Some(&placement) = self.sequence.get(step) else {
            return self.halt(HaltReason::Exhausted);
        };
        let shape = &self.shapes[placement.shape];
        let landing = match board::landing_row(&self.grid, shape, placement.column) {
            Ok(Some(row)) => row,
            Ok(None) => return self.halt(HaltReason::BoardFull { step }),
            Err(err) => {
                warn!(step, %err, "placement rejected; halting");
                return self.halt(HaltReason::Rejected { step });
            }
        };
        let piece = ActivePiece {
            step,
            shape: placement.shape,
            row: 0,
            column: placement.column,
            landing_row: landing,
        };
        debug!(
            step,
            shape = %shape.name,
            column = placement.column,
            landing_row = landing,
            "piece activated"
        );
        self.phase = Phase::Falling(piece);
        self.bump();
        Advance::Activated(piece)
    }

    fn halt(&mut self, reason: HaltReason) -> Advance {
        info!(?reason, filled = self.grid.filled_count(), "simulation halted");
        self.phase = Phase::Halted(reason);
        self.bump();
        Advance::Halted(reason)
    }

    fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Committed grid with the falling piece painted on top. The committed grid is not touched.
    pub fn snapshot(&self) -> Grid {
        match self.active() {
            Some(p) => self
                .grid
                .overlay(&self.shapes[p.shape], p.row as isize, p.column),
            None => self.grid.clone(),
        }
    }

    /// Start if idle, then tick until halted.
    pub fn run_to_end(&mut self) -> HaltReason {
        self.start();
        loop {
            if let Advance::Halted(reason) = self.tick() {
                return reason;
            }
            if let Phase::Halted(reason) = self.phase {
                return reason;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Cell;
    use crate::shapes::SHAPES;
    use proptest::prelude::*;

    fn sim(rows: usize, cols: usize, seq: &[(usize, usize)]) -> Simulator {
        let sequence = seq
            .iter()
            .map(|&(shape, column)| Placement { shape, column })
            .collect();
        Simulator::new(rows, cols, SHAPES.to_vec(), sequence).unwrap()
    }

    #[test]
    fn test_bar_falls_then_commits_on_bottom_row() {
        let mut s = sim(12, 8, &[(0, 2)]);
        let Advance::Activated(piece) = s.start() else {
            panic!("expected activation");
        };
        assert_eq!(piece.row, 0);
        assert_eq!(piece.landing_row, 11);
        for expected in 1..=11 {
            assert_eq!(s.tick(), Advance::Fell { row: expected });
            assert_eq!(s.grid().filled_count(), 0);
        }
        assert_eq!(s.tick(), Advance::Committed { step: 0, row: 11 });
        assert_eq!(s.grid().filled_count(), 4);
        for col in 2..=5 {
            assert_eq!(s.grid().get(11, col), Some(Cell::Filled(SHAPES[0].fill)));
        }
        assert_eq!(s.phase(), Phase::Settling { next: 1 });
        assert_eq!(s.tick(), Advance::Halted(HaltReason::Exhausted));
        assert_eq!(s.tick(), Advance::Idle);
    }

    #[test]
    fn test_snapshot_overlays_active_piece_only() {
        let mut s = sim(12, 8, &[(1, 3)]);
        s.start();
        s.tick();
        s.tick();
        let snap = s.snapshot();
        assert_eq!(s.grid().filled_count(), 0);
        assert_eq!(snap.get(2, 3), Some(Cell::Filled(SHAPES[1].fill)));
        assert_eq!(snap.get(3, 4), Some(Cell::Filled(SHAPES[1].fill)));
        assert_eq!(snap.filled_count(), 4);
    }

    #[test]
    fn test_grid_changes_once_per_piece() {
        let mut s = sim(6, 8, &[(0, 0), (1, 0)]);
        s.start();
        let mut commits = 0;
        let mut last = s.grid().clone();
        while !s.is_halted() {
            let adv = s.tick();
            if s.grid() != &last {
                assert!(matches!(adv, Advance::Committed { .. }));
                commits += 1;
                last = s.grid().clone();
            }
        }
        assert_eq!(commits, 2);
    }

    #[test]
    fn test_default_sequence_stacks_to_the_top() {
        let mut s = Simulator::new(12, 8, SHAPES.to_vec(), DEFAULT_SEQUENCE.to_vec()).unwrap();
        assert_eq!(s.run_to_end(), HaltReason::BoardFull { step: 7 });
        assert_eq!(s.committed(), 7);
        assert_eq!(s.grid().filled_count(), 28);
        let expected = "\
...OO...
...OO...
..IIII..
....ZZ..
...ZZ...
..SS....
...SS...
...T....
..TTT...
...OO...
...OO...
..IIII..
";
        assert_eq!(s.grid().to_string(), expected);
    }

    #[test]
    fn test_exhausted_sequence() {
        let mut s = sim(12, 8, &[(0, 0), (0, 4), (1, 0)]);
        assert_eq!(s.run_to_end(), HaltReason::Exhausted);
        assert_eq!(s.committed(), 3);
        assert_eq!(s.grid().filled_count(), 12);
    }

    #[test]
    fn test_board_full_halts_without_mutation() {
        // Squares stacked in one column of a 5-row grid: two fit, the third cannot.
        let mut s = sim(5, 4, &[(1, 0), (1, 0), (1, 0), (1, 2)]);
        let reason = s.run_to_end();
        assert_eq!(reason, HaltReason::BoardFull { step: 2 });
        assert_eq!(s.grid().filled_count(), 8);
        let frozen = s.grid().clone();
        assert_eq!(s.tick(), Advance::Idle);
        assert_eq!(s.grid(), &frozen);
        assert_eq!(s.committed(), 2);
    }

    #[test]
    fn test_landing_on_row_zero_commits_next_tick() {
        let mut s = sim(2, 4, &[(1, 0)]);
        let Advance::Activated(piece) = s.start() else {
            panic!("expected activation");
        };
        assert_eq!(piece.landing_row, 0);
        assert_eq!(s.tick(), Advance::Committed { step: 0, row: 0 });
    }

    #[test]
    fn test_rejects_huge_column() {
        let err = Simulator::new(
            12,
            8,
            SHAPES.to_vec(),
            vec![Placement {
                shape: 0,
                column: usize::MAX,
            }],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SimError::InvalidPlacement {
                step: 0,
                source: PlacementError::OutOfBounds {
                    column: usize::MAX,
                    width: 4,
                    cols: 8
                }
            }
        );
    }

    #[test]
    fn test_rejected_placement_has_its_own_halt_reason() {
        let mut s = sim(12, 8, &[(0, 0)]);
        s.sequence.push(Placement { shape: 0, column: 6 });
        assert_eq!(s.run_to_end(), HaltReason::Rejected { step: 1 });
        assert_eq!(s.committed(), 1);
        assert_eq!(s.grid().filled_count(), 4);
    }

    #[test]
    fn test_rejects_out_of_bounds_column() {
        let err = Simulator::new(12, 8, SHAPES.to_vec(), vec![Placement { shape: 0, column: 5 }])
            .unwrap_err();
        assert!(matches!(
            err,
            SimError::InvalidPlacement {
                step: 0,
                source: PlacementError::OutOfBounds { .. }
            }
        ));
    }

    #[test]
    fn test_rejects_unknown_shape_and_empty_grid() {
        let err = Simulator::new(12, 8, SHAPES.to_vec(), vec![Placement { shape: 7, column: 0 }])
            .unwrap_err();
        assert_eq!(err, SimError::UnknownShape { step: 0, shape: 7 });
        let err = Simulator::new(0, 8, SHAPES.to_vec(), Vec::new()).unwrap_err();
        assert_eq!(err, SimError::EmptyGrid { rows: 0, cols: 8 });
    }

    #[test]
    fn test_start_is_idempotent_and_reset_clears() {
        let mut s = sim(12, 8, &[(0, 0)]);
        assert_eq!(s.tick(), Advance::Idle);
        assert!(matches!(s.start(), Advance::Activated(_)));
        assert_eq!(s.start(), Advance::Idle);
        s.run_to_end();
        assert_ne!(s.grid().filled_count(), 0);
        let rev = s.revision();
        s.reset();
        assert_eq!(s.grid().filled_count(), 0);
        assert_eq!(s.phase(), Phase::Idle);
        assert!(s.revision() > rev);
    }

    #[test]
    fn test_empty_sequence_halts_on_start() {
        let mut s = sim(12, 8, &[]);
        assert_eq!(s.start(), Advance::Halted(HaltReason::Exhausted));
    }

    proptest! {
        #[test]
        fn prop_replay_is_deterministic(seq in prop::collection::vec((0usize..5, 0usize..5), 0..24)) {
            let mut a = sim(12, 8, &seq);
            let mut b = sim(12, 8, &seq);
            let ra = a.run_to_end();
            let rb = b.run_to_end();
            prop_assert_eq!(ra, rb);
            prop_assert_eq!(a.grid(), b.grid());
            a.reset();
            prop_assert_eq!(a.run_to_end(), rb);
            prop_assert_eq!(a.grid(), b.grid());
        }
    }
}
