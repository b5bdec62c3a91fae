//! Progress summaries for a plan.

use serde::Serialize;

use ritual_model::{Plan, Progress, StepRunState};

use super::ProgressionEngine;

/// Step and level counts by derived state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanProgress {
    pub completed: u32,
    pub active: u32,
    pub locked: u32,
    pub total: u32,
    pub required_completed: u32,
    pub required_total: u32,
    pub levels_cleared: u32,
    pub levels_total: u32,
}

/// Summarize a plan's derived state for a progress record.
pub fn get_plan_progress(plan: &Plan, progress: &Progress) -> PlanProgress {
    let view = ProgressionEngine::derive(plan, progress);
    let mut summary = PlanProgress::default();

    for level in &view.levels {
        summary.levels_total += 1;
        if level.cleared {
            summary.levels_cleared += 1;
        }
        for step in &level.steps {
            summary.total += 1;
            match step.state {
                StepRunState::Completed => summary.completed += 1,
                StepRunState::Active => summary.active += 1,
                StepRunState::Locked => summary.locked += 1,
            }
            if step.required {
                summary.required_total += 1;
                if progress.is_completed(&step.step_id) {
                    summary.required_completed += 1;
                }
            }
        }
    }
    summary
}

/// Whether every level of the plan is cleared.
pub fn is_plan_complete(plan: &Plan, progress: &Progress) -> bool {
    ProgressionEngine::derive(plan, progress).is_finished()
}
