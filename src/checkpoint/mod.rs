//! Checkpoint System
//!
//! Durable snapshots of a run's conversation, one per step.
//!
//! This module provides:
//! - Checkpoint records and their constructors
//! - An append-only chain that enforces step continuity
//! - The `RunStore` storage contract with in-memory and filesystem stores
//!
//! ## Usage
//!
//! ```rust
//! use erk::checkpoint::{create_initial_checkpoint, create_next_step_checkpoint};
//! use erk::model::{Expert, Message};
//!
//! let expert = Expert::new("writer", "Writer", "You write things.");
//! let initial = create_initial_checkpoint(
//!     "job-1",
//!     "run-1",
//!     &expert,
//!     vec![Message::instruction("You write things."), Message::user("Write a haiku")],
//! );
//! let next = create_next_step_checkpoint(&initial, vec![Message::expert("done", vec![])]);
//! assert_eq!(next.step_number, 1);
//! assert_eq!(next.messages.len(), 3);
//! ```

pub mod backend;
pub mod chain;
pub mod errors;
pub mod models;

pub use backend::{InMemoryRunStore, RunStore, RunStoreBuilder, StorageError, StorageResult};
#[cfg(feature = "file-store")]
pub use backend::{EventsLog, FileRunStore};
pub use chain::{validate_successor, CheckpointChain};
pub use errors::{CheckpointError, CheckpointResult};
pub use models::{
    Checkpoint, CheckpointStatus, CheckpointSummary, DelegatedBy, DelegationTarget, ExpertRef,
};

use crate::model::{Expert, Message, Usage};
use chrono::Utc;

/// Step 0 checkpoint seeded with the instruction and user messages
pub fn create_initial_checkpoint(
    job_id: impl Into<String>,
    run_id: impl Into<String>,
    expert: &Expert,
    messages: Vec<Message>,
) -> Checkpoint {
    Checkpoint {
        id: uuid::Uuid::new_v4().to_string(),
        job_id: job_id.into(),
        run_id: run_id.into(),
        expert: ExpertRef::from(expert),
        step_number: 0,
        status: CheckpointStatus::Init,
        messages,
        usage: Usage::zero(),
        pending_tool_calls: Vec::new(),
        partial_tool_results: Vec::new(),
        delegate_to: Vec::new(),
        delegated_by: None,
        error: None,
        created_at: Utc::now(),
    }
}

/// Checkpoint for the step after `previous`, with `new_messages` appended.
///
/// Halt payloads (pending calls, delegation targets, error) are not carried
/// forward; the parent link and cumulative usage are.
pub fn create_next_step_checkpoint(previous: &Checkpoint, new_messages: Vec<Message>) -> Checkpoint {
    let mut messages = Vec::with_capacity(previous.messages.len() + new_messages.len());
    messages.extend(previous.messages.iter().cloned());
    messages.extend(new_messages);

    Checkpoint {
        id: uuid::Uuid::new_v4().to_string(),
        job_id: previous.job_id.clone(),
        run_id: previous.run_id.clone(),
        expert: previous.expert.clone(),
        step_number: previous.step_number + 1,
        status: CheckpointStatus::Proceeding,
        messages,
        usage: previous.usage,
        pending_tool_calls: Vec::new(),
        partial_tool_results: Vec::new(),
        delegate_to: Vec::new(),
        delegated_by: previous.delegated_by.clone(),
        error: None,
        created_at: Utc::now(),
    }
}
