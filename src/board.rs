//! Board model.
//! Cell labels, the per-iteration board state grid and the move type.
//! A `BoardState` is built fresh from every capture and dropped once a move is chosen.

use anyhow::{bail, Result};
use std::fmt;

/// Visible state of one grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CellLabel {
    Unrevealed,
    Mine,
    /// Safe-looking blank cell; the only label the move selector clicks.
    Empty,
    Flagged,
    /// Revealed number, always in 1..=8.
    Digit(u8),
    Unknown,
}

impl CellLabel {
    pub fn is_digit(self) -> bool {
        matches!(self, CellLabel::Digit(_))
    }

    pub fn is_revealable(self) -> bool {
        self == CellLabel::Empty
    }

    /// Builds a digit label, rejecting values a cell can never show.
    pub fn digit(value: u8) -> Option<CellLabel> {
        (1..=8).contains(&value).then_some(CellLabel::Digit(value))
    }

    pub fn to_char(self) -> char {
        match self {
            CellLabel::Unrevealed => '.',
            CellLabel::Mine => 'M',
            CellLabel::Empty => 'E',
            CellLabel::Flagged => 'F',
            CellLabel::Digit(n) => char::from(b'0' + n),
            CellLabel::Unknown => '?',
        }
    }
}

impl TryFrom<char> for CellLabel {
    type Error = anyhow::Error;

    fn try_from(c: char) -> Result<Self> {
        match c {
            '.' => Ok(CellLabel::Unrevealed),
            'M' => Ok(CellLabel::Mine),
            'E' => Ok(CellLabel::Empty),
            'F' => Ok(CellLabel::Flagged),
            '?' => Ok(CellLabel::Unknown),
            '1'..='8' => Ok(CellLabel::Digit(c as u8 - b'0')),
            _ => bail!("Invalid cell label character '{}'", c),
        }
    }
}

impl fmt::Display for CellLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// A cell coordinate chosen for the next click.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Move {
    pub row: usize,
    pub col: usize,
}

impl Move {
    pub fn new(row: usize, col: usize) -> Self {
        Move { row, col }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(row {}, col {})", self.row, self.col)
    }
}

/// Row-major grid of cell labels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoardState {
    rows: usize,
    cols: usize,
    cells: Vec<CellLabel>,
}

impl BoardState {
    /// Wraps a row-major label vector. `cells.len()` must equal `rows * cols`.
    pub fn new(rows: usize, cols: usize, cells: Vec<CellLabel>) -> Result<Self> {
        if cells.len() != rows * cols {
            bail!(
                "Board of {}x{} needs {} cells, got {}",
                rows,
                cols,
                rows * cols,
                cells.len()
            );
        }
        Ok(BoardState { rows, cols, cells })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<CellLabel> {
        if row < self.rows && col < self.cols {
            Some(self.cells[row * self.cols + col])
        } else {
            None
        }
    }

    /// All coordinates with their labels, row-major.
    pub fn iter(&self) -> impl Iterator<Item = (Move, CellLabel)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, &label)| (Move::new(i / self.cols, i % self.cols), label))
    }

    /// Labels of the up-to-8 cells at Chebyshev distance 1, clipped at the board edge.
    pub fn neighbors(&self, row: usize, col: usize) -> impl Iterator<Item = CellLabel> + '_ {
        let row_range = row.saturating_sub(1)..=(row + 1).min(self.rows.saturating_sub(1));
        row_range.flat_map(move |r| {
            let col_range = col.saturating_sub(1)..=(col + 1).min(self.cols.saturating_sub(1));
            col_range
                .filter(move |&c| (r, c) != (row, col))
                .filter_map(move |c| self.get(r, c))
        })
    }
}

#[cfg(test)]
impl BoardState {
    /// Parses the text form produced by `Display`, one line per row.
    pub fn parse(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        let cols = lines.first().map_or(0, |l| l.chars().count());
        let mut cells = Vec::with_capacity(lines.len() * cols);
        for (row, line) in lines.iter().enumerate() {
            if line.chars().count() != cols {
                bail!("Row {} has {} cells, expected {}", row, line.chars().count(), cols);
            }
            for c in line.chars() {
                cells.push(CellLabel::try_from(c)?);
            }
        }
        BoardState::new(lines.len(), cols, cells)
    }
}

impl fmt::Display for BoardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .cells
            .chunks(self.cols.max(1))
            .map(|row| row.iter().map(|l| l.to_char()).collect::<String>())
            .collect::<Vec<String>>()
            .join("\n");
        write!(f, "{}", text)
    }
}
