//! Move selection.
//! `MoveStrategy` is the seam between classification and clicking; the default
//! `FrontierPicker` is a heuristic, not a solver: it clicks a random empty cell,
//! preferring ones that touch a revealed digit.

use crate::board::{BoardState, Move};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

pub trait MoveStrategy {
    /// Picks the next cell to click, or `None` when nothing is left to try.
    fn select_move(&mut self, board: &BoardState) -> Option<Move>;
}

/// Random pick among empty cells, digit-adjacent ones first.
pub struct FrontierPicker<R: Rng> {
    rng: R,
}

impl FrontierPicker<StdRng> {
    /// Seeded for reproducible runs, or from OS entropy.
    pub fn from_seed(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        FrontierPicker::new(rng)
    }
}

impl<R: Rng> FrontierPicker<R> {
    pub fn new(rng: R) -> Self {
        FrontierPicker { rng }
    }
}

impl<R: Rng> MoveStrategy for FrontierPicker<R> {
    fn select_move(&mut self, board: &BoardState) -> Option<Move> {
        let (frontier, empty) = candidates(board);
        let pool = if frontier.is_empty() { &empty } else { &frontier };
        pool.choose(&mut self.rng).copied()
    }
}

/// Returns (digit-adjacent empty cells, all empty cells), both row-major.
pub fn candidates(board: &BoardState) -> (Vec<Move>, Vec<Move>) {
    let empty: Vec<Move> = board
        .iter()
        .filter(|(_, label)| label.is_revealable())
        .map(|(mv, _)| mv)
        .collect();
    let frontier = empty
        .iter()
        .copied()
        .filter(|mv| board.neighbors(mv.row, mv.col).any(|l| l.is_digit()))
        .collect();
    (frontier, empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn picker(seed: u64) -> FrontierPicker<StdRng> {
        FrontierPicker::from_seed(Some(seed))
    }

    fn picks(board: &BoardState, n: u64) -> HashSet<Move> {
        (0..n)
            .map(|seed| picker(seed).select_move(board).unwrap())
            .collect()
    }

    #[test]
    fn test_priority_set_dominates() {
        let board = BoardState::parse(
            "EEEEE
             EEEEE
             EE2EE
             EEEEE
             EEEEE",
        )
        .unwrap();
        let (frontier, empty) = candidates(&board);
        assert_eq!(frontier.len(), 8);
        assert_eq!(empty.len(), 24);

        let frontier: HashSet<Move> = frontier.into_iter().collect();
        for mv in picks(&board, 200) {
            assert!(frontier.contains(&mv), "picked {} outside the frontier", mv);
        }
    }

    #[test]
    fn test_fallback_uses_any_empty_cell() {
        let board = BoardState::parse(
            "E..
             .MF
             ..E",
        )
        .unwrap();
        let seen = picks(&board, 100);
        assert_eq!(seen, HashSet::from([Move::new(0, 0), Move::new(2, 2)]));
    }

    #[test]
    fn test_no_empty_cells_means_no_move() {
        let board = BoardState::parse(
            "12.
             ?MF",
        )
        .unwrap();
        assert_eq!(picker(1).select_move(&board), None);
    }

    #[test]
    fn test_unknown_cells_are_never_picked() {
        let board = BoardState::parse("??3?\n??E?").unwrap();
        for mv in picks(&board, 50) {
            assert_eq!(mv, Move::new(1, 2));
        }
    }

    #[test]
    fn test_returned_move_is_always_empty() {
        let board = BoardState::parse(
            "1E.E
             EF?2
             .E3E",
        )
        .unwrap();
        for seed in 0..100 {
            let mv = picker(seed).select_move(&board).unwrap();
            assert!(board.get(mv.row, mv.col).unwrap().is_revealable());
        }
    }

    #[test]
    fn test_diagonal_digit_counts_as_adjacent() {
        let board = BoardState::parse(
            "1..
             .E.
             ..E",
        )
        .unwrap();
        let (frontier, _) = candidates(&board);
        assert_eq!(frontier, vec![Move::new(1, 1)]);
    }

    #[test]
    fn test_same_seed_same_move() {
        let board = BoardState::parse("EEEE\nEEEE").unwrap();
        assert_eq!(picker(42).select_move(&board), picker(42).select_move(&board));
    }

    #[test]
    fn test_digit_in_corner_of_two_by_two() {
        let board = BoardState::parse(".3\nEE").unwrap();
        let seen = picks(&board, 100);
        assert!(seen.iter().all(|mv| *mv == Move::new(1, 0) || *mv == Move::new(1, 1)));
    }
}
