//! The 3x3 game board.

use arena_protocol::{BoardSnapshot, Mark, Position};

/// The eight winning lines, as cell indices.
const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PlaceError {
    #[error("square {0} is already taken")]
    Occupied(Position),
}

/// Nine cells, each empty or holding a mark. Cells never change once set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    cells: [Option<Mark>; 9],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, position: Position) -> Option<Mark> {
        self.cells[position.index()]
    }

    /// Set an empty cell. An occupied cell is left as is.
    pub fn place(&mut self, position: Position, mark: Mark) -> Result<(), PlaceError> {
        let cell = &mut self.cells[position.index()];
        if cell.is_some() {
            return Err(PlaceError::Occupied(position));
        }
        *cell = Some(mark);
        Ok(())
    }

    pub fn has_win(&self, mark: Mark) -> bool {
        LINES
            .iter()
            .any(|line| line.iter().all(|&i| self.cells[i] == Some(mark)))
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Snapshot for one recipient, carrying that recipient's turn flag.
    pub fn snapshot(&self, your_turn: bool) -> BoardSnapshot {
        BoardSnapshot {
            cells: self.cells,
            your_turn,
        }
    }
}
