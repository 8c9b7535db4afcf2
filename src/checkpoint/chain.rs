//! Append-only checkpoint chain for one run.
//!
//! Checkpoints are addressed by index, and the index equals the step offset
//! from the first checkpoint in the chain.

use super::errors::{CheckpointError, CheckpointResult};
use super::models::{Checkpoint, CheckpointStatus};

/// Check that `next` may follow `previous` in the same run.
///
/// The first checkpoint of a run may start at any step (a run continued from
/// another lineage keeps its step numbering). Every later checkpoint must
/// take the next step number and strictly extend the previous messages.
pub fn validate_successor(previous: Option<&Checkpoint>, next: &Checkpoint) -> CheckpointResult<()> {
    let Some(previous) = previous else {
        return Ok(());
    };

    if previous.run_id != next.run_id {
        return Err(CheckpointError::RunMismatch {
            expected: previous.run_id.clone(),
            found: next.run_id.clone(),
        });
    }
    if closes_chain(previous.status) {
        return Err(CheckpointError::ChainClosed {
            status: previous.status.to_string(),
        });
    }
    if next.step_number != previous.step_number + 1 {
        return Err(CheckpointError::StepGap {
            expected: previous.step_number + 1,
            found: next.step_number,
        });
    }
    if next.messages.len() <= previous.messages.len() {
        return Err(CheckpointError::EmptySuffix {
            step_number: next.step_number,
        });
    }
    if next.messages[..previous.messages.len()] != previous.messages[..] {
        return Err(CheckpointError::NotAnExtension {
            step_number: next.step_number,
        });
    }
    Ok(())
}

// A delegation halt is resumed within the same run once the sub-runs settle.
fn closes_chain(status: CheckpointStatus) -> bool {
    status.is_terminal() && status != CheckpointStatus::StoppedByDelegate
}

/// Ordered checkpoints of a single run
#[derive(Debug, Clone, Default)]
pub struct CheckpointChain {
    checkpoints: Vec<Checkpoint>,
}

impl CheckpointChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a checkpoint after validating it against the current tail
    pub fn push(&mut self, checkpoint: Checkpoint) -> CheckpointResult<()> {
        validate_successor(self.checkpoints.last(), &checkpoint)?;
        self.checkpoints.push(checkpoint);
        Ok(())
    }

    pub fn latest(&self) -> Option<&Checkpoint> {
        self.checkpoints.last()
    }

    /// Checkpoint written at `step_number`
    pub fn get(&self, step_number: u32) -> Option<&Checkpoint> {
        let first = self.checkpoints.first()?.step_number;
        let index = step_number.checked_sub(first)? as usize;
        self.checkpoints.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Checkpoint> {
        self.checkpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }
}
