//! Step progression state machine.
//!
//! Derives `locked` / `active` / `completed` for every step of a fixed
//! [`Plan`] from the attempt history in a [`Progress`] record, and records
//! new attempts. Every operation takes the old progress by reference and
//! returns a new value; nothing is mutated in place.
//!
//! Gating rules, evaluated over the whole plan on every recompute:
//!
//! ```text
//! step completed   <=> at least one `success` attempt
//! level cleared    <=> every required step completed
//! level reachable  <=> every earlier level cleared (level 1 always)
//! reachable level  :  completed.. | first non-completed = active | locked..
//! current          =  active step of the first reachable, non-cleared level
//! ```

pub mod dispatch;
pub mod queries;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use ritual_model::{Attempt, AttemptOutcome, OutcomeMeta, Plan, Progress, StepRef, StepRunState};

/// Errors from progression operations. Progress is never modified when one
/// of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgressError {
    #[error("step {step_id:?} does not exist in level {level_id:?}")]
    InvalidStepReference { level_id: String, step_id: String },

    #[error("plan is finished: no step is currently available")]
    PlanFinished,
}

impl ProgressError {
    fn invalid(level_id: &str, step_id: &str) -> Self {
        Self::InvalidStepReference {
            level_id: level_id.to_string(),
            step_id: step_id.to_string(),
        }
    }
}

/// Derived state of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub step_id: String,
    pub required: bool,
    pub state: StepRunState,
}

/// Derived state of one level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelView {
    pub level_id: String,
    pub reachable: bool,
    pub cleared: bool,
    pub steps: Vec<StepView>,
}

/// Derived state of a whole plan for one progress record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanView {
    pub levels: Vec<LevelView>,
    pub current: Option<StepRef>,
}

impl PlanView {
    /// State of a step, or `None` if the reference is unknown.
    pub fn state_of(&self, level_id: &str, step_id: &str) -> Option<StepRunState> {
        self.levels
            .iter()
            .find(|level| level.level_id == level_id)?
            .steps
            .iter()
            .find(|step| step.step_id == step_id)
            .map(|step| step.state)
    }

    /// Whether every level is cleared.
    pub fn is_finished(&self) -> bool {
        self.levels.iter().all(|level| level.cleared)
    }
}

/// The progression state machine.
///
/// Stateless: the plan is read-only and progress flows through as values.
pub struct ProgressionEngine;

impl ProgressionEngine {
    /// Compute the derived state of every level and step.
    pub fn derive(plan: &Plan, progress: &Progress) -> PlanView {
        let mut reachable = true;
        let mut current = None;
        let mut levels = Vec::with_capacity(plan.levels.len());

        for level in &plan.levels {
            let completed: Vec<bool> = level
                .steps
                .iter()
                .map(|step| progress.is_completed(&step.id))
                .collect();
            let cleared = level
                .steps
                .iter()
                .zip(&completed)
                .all(|(step, done)| !step.required || *done);

            let active_index = if reachable {
                completed.iter().position(|done| !done)
            } else {
                None
            };

            let steps = level
                .steps
                .iter()
                .enumerate()
                .map(|(i, step)| {
                    let state = if !reachable {
                        StepRunState::Locked
                    } else {
                        match active_index {
                            Some(active) if i == active => StepRunState::Active,
                            Some(active) if i > active => StepRunState::Locked,
                            _ => StepRunState::Completed,
                        }
                    };
                    StepView {
                        step_id: step.id.clone(),
                        required: step.required,
                        state,
                    }
                })
                .collect();

            if reachable && !cleared && current.is_none() {
                current = active_index.map(|i| StepRef::new(&level.id, &level.steps[i].id));
            }

            levels.push(LevelView {
                level_id: level.id.clone(),
                reachable,
                cleared,
                steps,
            });
            reachable = reachable && cleared;
        }

        PlanView { levels, current }
    }

    /// Derived state of a single step.
    pub fn step_state(
        plan: &Plan,
        progress: &Progress,
        level_id: &str,
        step_id: &str,
    ) -> Result<StepRunState, ProgressError> {
        if plan.find_step(level_id, step_id).is_none() {
            return Err(ProgressError::invalid(level_id, step_id));
        }
        Self::derive(plan, progress)
            .state_of(level_id, step_id)
            .ok_or_else(|| ProgressError::invalid(level_id, step_id))
    }

    /// Whether the learner may open a step: it is `active`, or already
    /// `completed` and being re-viewed. Unknown references are never openable.
    pub fn can_open_step(plan: &Plan, progress: &Progress, level_id: &str, step_id: &str) -> bool {
        matches!(
            Self::step_state(plan, progress, level_id, step_id),
            Ok(StepRunState::Active | StepRunState::Completed)
        )
    }

    /// Refresh the cached `current` pointer. Idempotent; attempt history is
    /// left untouched. Also the way to bootstrap a freshly normalized plan
    /// with `Progress::default()`.
    pub fn recompute_states(plan: &Plan, progress: &Progress) -> Progress {
        Progress {
            attempts: progress.attempts.clone(),
            current: Self::derive(plan, progress).current,
        }
    }

    /// The next actionable step, or `None` when the plan is finished.
    pub fn get_next_available_step(plan: &Plan, progress: &Progress) -> Option<StepRef> {
        Self::derive(plan, progress).current
    }

    /// Record the start of a new attempt. Does not change completion.
    pub fn mark_step_started(
        plan: &Plan,
        progress: &Progress,
        level_id: &str,
        step_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Progress, ProgressError> {
        Self::record(plan, progress, level_id, step_id, |history| {
            history.push(Attempt::open(at));
        })
    }

    /// Record a successful attempt. The step becomes completed, which may
    /// clear its level and move `current` forward.
    pub fn mark_step_completed(
        plan: &Plan,
        progress: &Progress,
        level_id: &str,
        step_id: &str,
        at: DateTime<Utc>,
        meta: Option<OutcomeMeta>,
    ) -> Result<Progress, ProgressError> {
        Self::record(plan, progress, level_id, step_id, |history| {
            close_attempt(history, AttemptOutcome::Success, at, meta);
        })
    }

    /// Record a failed attempt. The step stays where it was and may be
    /// retried.
    pub fn mark_step_failed(
        plan: &Plan,
        progress: &Progress,
        level_id: &str,
        step_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Progress, ProgressError> {
        Self::record(plan, progress, level_id, step_id, |history| {
            close_attempt(history, AttemptOutcome::Fail, at, None);
        })
    }

    /// Validate the reference, apply `update` to a copy of the step's
    /// history, and return the recomputed copy.
    fn record(
        plan: &Plan,
        progress: &Progress,
        level_id: &str,
        step_id: &str,
        update: impl FnOnce(&mut Vec<Attempt>),
    ) -> Result<Progress, ProgressError> {
        if plan.find_step(level_id, step_id).is_none() {
            return Err(ProgressError::invalid(level_id, step_id));
        }

        if !Self::can_open_step(plan, progress, level_id, step_id) {
            tracing::warn!(
                level_id,
                step_id,
                "recording attempt on a step that is not open"
            );
        }

        let mut next = progress.clone();
        update(next.attempts.entry(step_id.to_string()).or_default());
        Ok(Self::recompute_states(plan, &next))
    }
}

/// Close the latest open attempt with `outcome`, or append a closed one if
/// none is open.
fn close_attempt(
    history: &mut Vec<Attempt>,
    outcome: AttemptOutcome,
    at: DateTime<Utc>,
    meta: Option<OutcomeMeta>,
) {
    match history.last_mut() {
        Some(last) if last.is_open() => {
            last.outcome = Some(outcome);
            last.finished_at = Some(at);
            last.meta = meta;
        }
        _ => history.push(Attempt {
            outcome: Some(outcome),
            started_at: at,
            finished_at: Some(at),
            meta,
        }),
    }
}
