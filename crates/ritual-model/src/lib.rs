//! Shared data model for ritual plans and learner progress.
//!
//! Value types only: the canonical [`models::Plan`] produced by the
//! normalizer and the [`models::Progress`] record evolved by the
//! progression engine. Nothing here decides structure or gating.

pub mod models;

pub use models::{
    Attempt, AttemptOutcome, AutofillReason, Axis, EffortType, Level, OutcomeMeta,
    PLAN_SCHEMA_VERSION, Plan, Progress, Step, StepRef, StepRunState,
};
