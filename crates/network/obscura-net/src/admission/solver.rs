//! Background puzzle solving.
//!
//! Solving is CPU bound and unbounded in the worst case, so it runs on
//! tokio's blocking pool behind a shared cancel flag rather than on the task
//! that handles the relay request.

use crate::admission::pow::{Puzzle, Solution};
use crate::config::AdmissionConfig;
use crate::error::{AdmissionError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Shared cancellation signal for an in-flight solve.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Handle to a solve running on the blocking pool.
pub struct SolveTask {
    cancel: CancelFlag,
    handle: Option<JoinHandle<Result<Solution>>>,
}

impl SolveTask {
    /// Asks the worker to stop; `join` then yields `AdmissionError::Cancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub async fn join(mut self) -> Result<Solution> {
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| AdmissionError::Worker("solve task already joined".to_string()))?;
        let outcome = handle.await;
        self.handle = None;
        outcome.map_err(|e| AdmissionError::Worker(e.to_string()))?
    }
}

/// Spawns solves off the calling task and bounds them with a timeout.
#[derive(Debug, Clone)]
pub struct PuzzleSolver {
    timeout: Duration,
}

impl PuzzleSolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_config(config: &AdmissionConfig) -> Self {
        Self::new(config.solve_timeout)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Starts solving on the blocking pool. Must be called inside a tokio runtime.
    pub fn spawn(&self, puzzle: Puzzle) -> SolveTask {
        let cancel = CancelFlag::new();
        let worker_flag = cancel.clone();
        let handle = tokio::task::spawn_blocking(move || puzzle.solve_with_cancel(&worker_flag));
        SolveTask {
            cancel,
            handle: Some(handle),
        }
    }

    /// Solves within the configured timeout, cancelling the worker on expiry.
    pub async fn solve(&self, puzzle: Puzzle) -> Result<Solution> {
        let difficulty = puzzle.difficulty;
        let task = self.spawn(puzzle);
        let cancel = task.cancel_flag();

        match tokio::time::timeout(self.timeout, task.join()).await {
            Ok(result) => result,
            Err(_) => {
                cancel.cancel();
                warn!(difficulty, timeout_ms = self.timeout.as_millis() as u64, "puzzle solve timed out");
                Err(AdmissionError::TimedOut(self.timeout).into())
            }
        }
    }
}

impl Default for PuzzleSolver {
    fn default() -> Self {
        Self::from_config(&AdmissionConfig::default())
    }
}

impl Drop for SolveTask {
    fn drop(&mut self) {
        if self.handle.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("solve task dropped while running, cancelling worker");
            self.cancel.cancel();
        }
    }
}
