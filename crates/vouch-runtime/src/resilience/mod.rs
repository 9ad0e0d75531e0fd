//! Resilience patterns for vouch-runtime.
//!
//! This module provides:
//! - The per-call repair budget
//! - Token usage accounting
//! - The bounded repair state machine

mod budget;
mod repair;

pub use budget::{LlmUsage, RepairAttemptCounter, MAX_REPAIR_ATTEMPTS};
pub use repair::{AttemptRecord, AttemptStatus, RepairCoordinator, RepairState};
