//! Shared fixtures for ritual tests.
//!
//! Plans built here bypass the normalizer so tests can use level shapes the
//! normalizer never emits (e.g. 3/4/3 steps, optional steps anywhere).

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{Value, json};

use ritual_model::{Axis, EffortType, Level, PLAN_SCHEMA_VERSION, Plan, Step};

/// Fixed timestamp `minutes` after 2026-01-01 09:00 UTC.
pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0)
        .single()
        .expect("valid base timestamp")
        + Duration::minutes(minutes)
}

/// A canonical plan with one level per entry, each step's `required` flag
/// taken from the layout.
pub fn plan_from_layout(layout: &[&[bool]]) -> Plan {
    let mut order = 0;
    let levels: Vec<Level> = layout
        .iter()
        .enumerate()
        .map(|(li, flags)| {
            let level_index = li as u32 + 1;
            let steps = flags
                .iter()
                .enumerate()
                .map(|(si, required)| {
                    order += 1;
                    let step_index = si as u32 + 1;
                    Step {
                        id: format!("step-{level_index}-{step_index}"),
                        title: format!("Day {order}"),
                        competency_id: "core".to_string(),
                        axis: Axis::Understand,
                        effort_type: EffortType::Practice,
                        duration_min: 5,
                        required: *required,
                        level_index,
                        step_index,
                        order_global: order,
                        is_autofill: false,
                        autofill_reason: None,
                    }
                })
                .collect();
            Level {
                id: format!("level-{level_index}"),
                title: format!("Week {level_index}"),
                steps,
            }
        })
        .collect();

    Plan {
        schema_version: PLAN_SCHEMA_VERSION,
        total_steps: order,
        steps_per_level: layout.iter().map(|l| l.len() as u32).max().unwrap_or(0),
        levels_count: levels.len() as u32,
        levels,
    }
}

/// A canonical plan of required steps with the given level sizes.
pub fn plan_with_level_sizes(sizes: &[usize]) -> Plan {
    let layout: Vec<Vec<bool>> = sizes.iter().map(|n| vec![true; *n]).collect();
    let refs: Vec<&[bool]> = layout.iter().map(Vec::as_slice).collect();
    plan_from_layout(&refs)
}

/// A proposal JSON with `count` titled steps split into source levels of
/// `per_level` steps (titled "Source level n").
pub fn proposal_json(count: usize, per_level: usize) -> Value {
    let per_level = per_level.max(1);
    let steps: Vec<Value> = (1..=count)
        .map(|n| {
            json!({
                "title": format!("Source step {n}"),
                "competencyId": "listening",
                "axis": "do",
                "effortType": "drill",
                "durationMin": 10,
            })
        })
        .collect();
    let levels: Vec<Value> = steps
        .chunks(per_level)
        .enumerate()
        .map(|(i, chunk)| {
            json!({
                "id": format!("proposal-level-{i}"),
                "title": format!("Source level {}", i + 1),
                "steps": chunk,
            })
        })
        .collect();
    json!({ "levels": levels })
}
