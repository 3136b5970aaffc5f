//! Completion evaluation for generation runs.
//!
//! The server exposes three independent completion signals that can disagree
//! transiently: the actions collection, the derived per-step states, and the
//! run status flag. All three are checked in a fixed order; collapsing them
//! into one loses real cases, so don't.

use chrono::Utc;

use crate::api::models::{derive_step_state, JobStatus, Snapshot, StepState};

/// What the watcher should do with the latest snapshot/status pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Server does not know this session; stop and report an error.
    InvalidSession,
    Completed,
    StillRunning,
}

/// Decide whether to keep watching. First applicable signal wins:
/// invalid-session sentinel, all actions completed, all steps derived
/// completed, then the run's finished flag.
///
/// Empty collections never count as completed; no data yet is not the same
/// as nothing left to do.
pub fn evaluate(snapshot: Option<&Snapshot>, status: Option<&JobStatus>) -> Verdict {
    if status.is_some_and(JobStatus::is_invalid_session) {
        return Verdict::InvalidSession;
    }

    if let Some(snapshot) = snapshot {
        if all_actions_completed(snapshot) || all_steps_completed(snapshot) {
            return Verdict::Completed;
        }
    }

    if status.is_some_and(|s| s.is_finished) {
        return Verdict::Completed;
    }

    Verdict::StillRunning
}

fn all_actions_completed(snapshot: &Snapshot) -> bool {
    !snapshot.all_actions.is_empty() && snapshot.all_actions.iter().all(|a| a.is_completed)
}

fn all_steps_completed(snapshot: &Snapshot) -> bool {
    let now = Utc::now();
    !snapshot.all_steps.is_empty()
        && snapshot
            .all_steps
            .iter()
            .all(|s| matches!(derive_step_state(s, snapshot, now), StepState::Completed { .. }))
}
