//! Automation loop.
//! capture -> classify -> select -> click -> settle, until the window disappears, no move is
//! left, or shutdown is requested. The loop runs on one task; classification (template matching
//! and per-cell OCR processes) goes to the blocking pool so Ctrl+C can abandon a slow board.
//! The startup delay, the post-click settle and classification are all interruptible.

use crate::board::{BoardState, Move};
use crate::capture::{Frame, Screen};
use crate::classify::{CellObserver, Classifier, NoopObserver};
use crate::config::Config;
use crate::input::Pointer;
use crate::select::MoveStrategy;
use crate::shutdown::Shutdown;
use anyhow::{Context, Result};
use image::GrayImage;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    pub startup: Duration,
    pub settle: Duration,
    pub poll: Duration,
    pub max_polls: u32,
}

impl Timing {
    pub fn from_config(config: &Config) -> Self {
        Timing {
            startup: config.startup_delay(),
            settle: config.settle_delay(),
            poll: config.settle_poll(),
            max_polls: config.settle_max_polls,
        }
    }
}

/// Why the loop stopped. None of these are errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    WindowNotFound,
    NoMove,
    Cancelled,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::WindowNotFound => write!(f, "game window not found"),
            Outcome::NoMove => write!(f, "no move available"),
            Outcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Summary {
    pub outcome: Outcome,
    pub moves: usize,
    pub boards: usize,
}

enum State {
    WaitingToStart,
    Capturing,
    Classifying(Frame),
    Selecting(Frame, BoardState),
    Acting(Frame, Move),
    Finished(Outcome),
}

pub struct Bot<S: Screen, P: Pointer, M: MoveStrategy> {
    screen: S,
    pointer: P,
    strategy: M,
    classifier: Arc<Classifier>,
    observer: Box<dyn CellObserver>,
    timing: Timing,
    shutdown: Shutdown,
}

impl<S: Screen, P: Pointer, M: MoveStrategy> Bot<S, P, M> {
    pub fn new(
        screen: S,
        pointer: P,
        strategy: M,
        classifier: Classifier,
        timing: Timing,
        shutdown: Shutdown,
    ) -> Self {
        Bot {
            screen,
            pointer,
            strategy,
            classifier: Arc::new(classifier),
            observer: Box::new(NoopObserver),
            timing,
            shutdown,
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn CellObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Runs until a terminal state. Errors are fatal: capture backend failures,
    /// misaligned board images, failed input injection.
    pub async fn run(&mut self) -> Result<Summary> {
        let mut state = State::WaitingToStart;
        let mut moves = 0;
        let mut boards = 0;

        loop {
            if self.shutdown.is_requested() && !matches!(state, State::Finished(_)) {
                state = State::Finished(Outcome::Cancelled);
            }

            state = match state {
                State::WaitingToStart => {
                    if self.shutdown.sleep(self.timing.startup).await {
                        State::Capturing
                    } else {
                        State::Finished(Outcome::Cancelled)
                    }
                }
                State::Capturing => match self.screen.capture()? {
                    Some(frame) => State::Classifying(frame),
                    None => State::Finished(Outcome::WindowNotFound),
                },
                State::Classifying(frame) => {
                    let classifier = Arc::clone(&self.classifier);
                    let mut observer = std::mem::replace(&mut self.observer, Box::new(NoopObserver));
                    let task = tokio::task::spawn_blocking(move || {
                        let board = classifier.classify_with(&frame.image, observer.as_mut());
                        (frame, observer, board)
                    });

                    tokio::select! {
                        joined = task => {
                            let (frame, observer, board) = joined.context("Classification task failed")?;
                            self.observer = observer;
                            let board = board.context("Failed to classify board")?;
                            boards += 1;
                            log::debug!("Board {} ({}x{}):\n{}", boards, board.rows(), board.cols(), board);
                            State::Selecting(frame, board)
                        }
                        _ = self.shutdown.requested() => {
                            log::info!("Shutdown during classification, abandoning board");
                            State::Finished(Outcome::Cancelled)
                        }
                    }
                }
                State::Selecting(frame, board) => match self.strategy.select_move(&board) {
                    Some(mv) => State::Acting(frame, mv),
                    None => State::Finished(Outcome::NoMove),
                },
                State::Acting(frame, mv) => {
                    let (x, y) = frame.cell_center(mv, self.classifier.cell_size());
                    log::info!("Move {}: clicking {} at ({:.0}, {:.0})", moves + 1, mv, x, y);
                    self.pointer
                        .click(x, y)
                        .with_context(|| format!("Failed to click {}", mv))?;
                    moves += 1;
                    if self.settle().await? {
                        State::Capturing
                    } else {
                        State::Finished(Outcome::Cancelled)
                    }
                }
                State::Finished(outcome) => {
                    return Ok(Summary {
                        outcome,
                        moves,
                        boards,
                    });
                }
            };
        }
    }

    /// Waits the settle delay, then polls until two consecutive captures match or the
    /// poll budget runs out. Returns `false` if shutdown interrupted the wait.
    async fn settle(&mut self) -> Result<bool> {
        if !self.shutdown.sleep(self.timing.settle).await {
            return Ok(false);
        }

        let mut previous: Option<GrayImage> = None;
        for _ in 0..self.timing.max_polls {
            // A vanished window is reported by the next Capturing state.
            let Some(frame) = self.screen.capture()? else {
                break;
            };
            if previous.as_ref() == Some(&frame.image) {
                log::debug!("Board settled");
                break;
            }
            previous = Some(frame.image);
            if !self.shutdown.sleep(self.timing.poll).await {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
