//! Proposal -> canonical plan normalization.
//!
//! [`normalize`] always returns a structurally valid [`Plan`] with exactly
//! the requested number of steps. Malformed or missing proposal data
//! degrades to defaults; the only signal that this happened is the
//! [`NormalizationReport`].

use serde::{Deserialize, Serialize};

use ritual_model::{AutofillReason, Axis, EffortType, Level, PLAN_SCHEMA_VERSION, Plan, Step};

use super::labels::Locale;
use super::proposal::{RawPlan, RawStep};

/// Step count used when the request is not a finite number.
pub const DEFAULT_TOTAL_STEPS: u32 = 7;
/// Level size used when the option is not a finite number.
pub const DEFAULT_STEPS_PER_LEVEL: u32 = 7;
/// Duration given to synthesized steps and to steps without a usable one.
pub const AUTOFILL_DURATION_MIN: u32 = 5;
/// Competency used when neither the plan nor any step names one.
pub const DEFAULT_COMPETENCY_ID: &str = "core";
pub const DEFAULT_AXIS: Axis = Axis::Understand;
pub const DEFAULT_EFFORT_TYPE: EffortType = EffortType::Practice;

/// Knobs for [`normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOptions {
    pub locale: Locale,
    /// Requested level size; coerced like the total step count.
    pub steps_per_level: f64,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            locale: Locale::En,
            steps_per_level: f64::from(DEFAULT_STEPS_PER_LEVEL),
        }
    }
}

/// What normalization had to do to reach the canonical shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationReport {
    pub total_steps: u32,
    pub steps_per_level: u32,
    pub levels_count: u32,
    pub autofill_count: u32,
    pub truncated_count: u32,
    pub autofill_step_ids: Vec<String>,
}

impl NormalizationReport {
    /// Whether the proposal had to be padded or cut.
    pub fn is_degraded(&self) -> bool {
        self.autofill_count > 0 || self.truncated_count > 0
    }
}

/// Output of [`normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub plan: Plan,
    pub meta: NormalizationReport,
}

/// Coerce a requested count to a whole number of at least 1, using
/// `fallback` for non-finite input.
pub fn resolve_count(requested: f64, fallback: u32) -> u32 {
    if !requested.is_finite() {
        return fallback;
    }
    let floored = requested.floor();
    if floored < 1.0 {
        1
    } else if floored >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        floored as u32
    }
}

/// Normalize a proposal into a canonical plan of exactly
/// `total_steps_requested` steps (after coercion).
pub fn normalize(raw: &RawPlan, total_steps_requested: f64, options: &NormalizeOptions) -> Normalized {
    let total_steps = resolve_count(total_steps_requested, DEFAULT_TOTAL_STEPS);
    let steps_per_level = resolve_count(options.steps_per_level, DEFAULT_STEPS_PER_LEVEL);
    let locale = options.locale;

    let source_titles: Vec<Option<String>> = raw
        .levels
        .iter()
        .map(|level| non_blank(level.title.as_deref()))
        .collect();

    let ordered = ordered_steps(raw);
    let fallbacks = Fallbacks::resolve(raw, &ordered);

    let total = total_steps as usize;
    let truncated_count = ordered.len().saturating_sub(total) as u32;

    let mut drafts: Vec<Draft> = ordered
        .iter()
        .take(total)
        .enumerate()
        .map(|(i, step)| Draft::from_raw(step, &fallbacks, locale, i as u32 + 1))
        .collect();
    let autofill_count = (total - drafts.len()) as u32;
    for position in drafts.len()..total {
        drafts.push(Draft::autofill(&fallbacks, locale, position as u32 + 1));
    }

    let mut levels = Vec::new();
    let mut autofill_step_ids = Vec::new();
    for (chunk_index, chunk) in drafts.chunks(steps_per_level as usize).enumerate() {
        let level_index = chunk_index as u32 + 1;
        let title = source_titles
            .get(chunk_index)
            .cloned()
            .flatten()
            .unwrap_or_else(|| locale.week_label(level_index));

        let steps = chunk
            .iter()
            .enumerate()
            .map(|(i, draft)| {
                let step_index = i as u32 + 1;
                let step = draft.to_step(
                    level_index,
                    step_index,
                    chunk_index as u32 * steps_per_level + step_index,
                );
                if step.is_autofill {
                    autofill_step_ids.push(step.id.clone());
                }
                step
            })
            .collect();

        levels.push(Level {
            id: format!("level-{level_index}"),
            title,
            steps,
        });
    }

    let levels_count = levels.len() as u32;
    let meta = NormalizationReport {
        total_steps,
        steps_per_level,
        levels_count,
        autofill_count,
        truncated_count,
        autofill_step_ids,
    };

    if meta.is_degraded() {
        tracing::debug!(
            proposed = ordered.len(),
            total_steps,
            autofill_count,
            truncated_count,
            "proposal did not match requested length"
        );
    }

    Normalized {
        plan: Plan {
            schema_version: PLAN_SCHEMA_VERSION,
            total_steps,
            steps_per_level,
            levels_count,
            levels,
        },
        meta,
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// Flatten every proposed step and put them in canonical order.
///
/// When no step carries an order signal the proposal order is kept as is.
fn ordered_steps(raw: &RawPlan) -> Vec<&RawStep> {
    let flat: Vec<&RawStep> = raw.levels.iter().flat_map(|level| level.steps.iter()).collect();

    let signals: Vec<Option<f64>> = flat.iter().map(|step| order_signal(step)).collect();
    if signals.iter().all(Option::is_none) {
        return flat;
    }

    let mut keyed: Vec<(f64, usize, &RawStep)> = flat
        .into_iter()
        .enumerate()
        .map(|(position, step)| (signals[position].unwrap_or(position as f64), position, step))
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    keyed.into_iter().map(|(_, _, step)| step).collect()
}

fn order_signal(step: &RawStep) -> Option<f64> {
    step.day_index
        .or(step.order)
        .or(step.order_global)
        .or_else(|| match (step.level_index, step.step_index) {
            (Some(level), Some(index)) => Some(level * 1000.0 + index),
            _ => None,
        })
}

// ---------------------------------------------------------------------------
// Attribute fallbacks
// ---------------------------------------------------------------------------

struct Fallbacks {
    competency_id: String,
    axis: Axis,
    effort_type: EffortType,
}

impl Fallbacks {
    fn resolve(raw: &RawPlan, ordered: &[&RawStep]) -> Self {
        let competency_id = raw
            .competencies
            .iter()
            .find_map(|c| non_blank(Some(c.as_str())))
            .or_else(|| {
                ordered
                    .iter()
                    .find_map(|step| non_blank(step.competency_id.as_deref()))
            })
            .unwrap_or_else(|| DEFAULT_COMPETENCY_ID.to_string());

        Self {
            competency_id,
            axis: ordered
                .iter()
                .find_map(|step| parse_axis(step.axis.as_deref()))
                .unwrap_or(DEFAULT_AXIS),
            effort_type: ordered
                .iter()
                .find_map(|step| parse_effort_type(step.effort_type.as_deref()))
                .unwrap_or(DEFAULT_EFFORT_TYPE),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_axis(value: Option<&str>) -> Option<Axis> {
    value?.trim().to_lowercase().parse().ok()
}

fn parse_effort_type(value: Option<&str>) -> Option<EffortType> {
    value?.trim().to_lowercase().parse().ok()
}

fn parse_duration(value: Option<f64>) -> Option<u32> {
    let minutes = value.filter(|v| v.is_finite() && *v > 0.0)?.floor();
    Some(minutes.clamp(1.0, f64::from(u32::MAX)) as u32)
}

// ---------------------------------------------------------------------------
// Drafts
// ---------------------------------------------------------------------------

/// A fitted step before positional ids are assigned.
struct Draft {
    title: String,
    competency_id: String,
    axis: Axis,
    effort_type: EffortType,
    duration_min: u32,
    required: bool,
    is_autofill: bool,
}

impl Draft {
    fn from_raw(step: &RawStep, fallbacks: &Fallbacks, locale: Locale, day: u32) -> Self {
        Self {
            title: non_blank(step.title.as_deref()).unwrap_or_else(|| locale.day_label(day)),
            competency_id: non_blank(step.competency_id.as_deref())
                .unwrap_or_else(|| fallbacks.competency_id.clone()),
            axis: parse_axis(step.axis.as_deref()).unwrap_or(fallbacks.axis),
            effort_type: parse_effort_type(step.effort_type.as_deref())
                .unwrap_or(fallbacks.effort_type),
            duration_min: parse_duration(step.duration_min).unwrap_or(AUTOFILL_DURATION_MIN),
            required: step.required.unwrap_or(true),
            is_autofill: false,
        }
    }

    fn autofill(fallbacks: &Fallbacks, locale: Locale, day: u32) -> Self {
        Self {
            title: locale.day_label(day),
            competency_id: fallbacks.competency_id.clone(),
            axis: fallbacks.axis,
            effort_type: fallbacks.effort_type,
            duration_min: AUTOFILL_DURATION_MIN,
            required: true,
            is_autofill: true,
        }
    }

    fn to_step(&self, level_index: u32, step_index: u32, order_global: u32) -> Step {
        Step {
            id: format!("step-{level_index}-{step_index}"),
            title: self.title.clone(),
            competency_id: self.competency_id.clone(),
            axis: self.axis,
            effort_type: self.effort_type,
            duration_min: self.duration_min,
            required: self.required,
            level_index,
            step_index,
            order_global,
            is_autofill: self.is_autofill,
            autofill_reason: self.is_autofill.then_some(AutofillReason::MissingStep),
        }
    }
}
