//! Convenience helpers that act on the current step, wrapping
//! [`super::ProgressionEngine`] operations with semantic names.

use chrono::{DateTime, Utc};

use ritual_model::{OutcomeMeta, Plan, Progress, StepRef};

use super::{ProgressError, ProgressionEngine};

fn current_step(plan: &Plan, progress: &Progress) -> Result<StepRef, ProgressError> {
    ProgressionEngine::get_next_available_step(plan, progress).ok_or(ProgressError::PlanFinished)
}

/// Start a new attempt on the current step.
///
/// Returns the step that was started alongside the new progress.
pub fn start_current_step(
    plan: &Plan,
    progress: &Progress,
    at: DateTime<Utc>,
) -> Result<(StepRef, Progress), ProgressError> {
    let step = current_step(plan, progress)?;
    let next =
        ProgressionEngine::mark_step_started(plan, progress, &step.level_id, &step.step_id, at)?;
    Ok((step, next))
}

/// Record success on the current step.
pub fn complete_current_step(
    plan: &Plan,
    progress: &Progress,
    at: DateTime<Utc>,
    meta: Option<OutcomeMeta>,
) -> Result<(StepRef, Progress), ProgressError> {
    let step = current_step(plan, progress)?;
    let next = ProgressionEngine::mark_step_completed(
        plan,
        progress,
        &step.level_id,
        &step.step_id,
        at,
        meta,
    )?;
    Ok((step, next))
}

/// Record failure on the current step. `current` does not move.
pub fn fail_current_step(
    plan: &Plan,
    progress: &Progress,
    at: DateTime<Utc>,
) -> Result<(StepRef, Progress), ProgressError> {
    let step = current_step(plan, progress)?;
    let next =
        ProgressionEngine::mark_step_failed(plan, progress, &step.level_id, &step.step_id, at)?;
    Ok((step, next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ritual_test_utils::{at, plan_with_level_sizes};

    #[test]
    fn walks_the_plan_through_current_step() {
        let plan = plan_with_level_sizes(&[2, 1]);
        let mut progress = ProgressionEngine::recompute_states(&plan, &Progress::default());
        let mut visited = Vec::new();

        for minute in 0..3 {
            let (step, started) = start_current_step(&plan, &progress, at(minute)).unwrap();
            let (done, next) = complete_current_step(&plan, &started, at(minute), None).unwrap();
            assert_eq!(step, done);
            visited.push(step.step_id);
            progress = next;
        }

        assert_eq!(visited, vec!["step-1-1", "step-1-2", "step-2-1"]);
        assert_eq!(
            start_current_step(&plan, &progress, at(9)).unwrap_err(),
            ProgressError::PlanFinished
        );
    }

    #[test]
    fn failing_current_keeps_it_current() {
        let plan = plan_with_level_sizes(&[2]);
        let progress = ProgressionEngine::recompute_states(&plan, &Progress::default());
        let (step, failed) = fail_current_step(&plan, &progress, at(0)).unwrap();
        assert_eq!(failed.current, Some(step));
    }
}
