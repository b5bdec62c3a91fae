//! Untrusted plan proposals as received from the LLM.
//!
//! Extraction here is deliberately lossy and never fails: every field is
//! optional, wrong JSON types are treated as absent, and reply text that
//! holds no JSON at all yields an empty [`RawPlan`]. Validation and
//! defaulting happen later in [`super::normalize`].

use serde_json::{Map, Value};

/// A proposal: levels of steps plus any plan-level competencies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPlan {
    pub levels: Vec<RawLevel>,
    /// Competency ids listed at the plan level, in proposal order.
    pub competencies: Vec<String>,
}

/// One proposed level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawLevel {
    pub title: Option<String>,
    pub steps: Vec<RawStep>,
}

/// One proposed step, fields as received.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStep {
    pub title: Option<String>,
    pub competency_id: Option<String>,
    pub axis: Option<String>,
    pub effort_type: Option<String>,
    pub duration_min: Option<f64>,
    pub required: Option<bool>,
    pub day_index: Option<f64>,
    pub order: Option<f64>,
    pub order_global: Option<f64>,
    pub level_index: Option<f64>,
    pub step_index: Option<f64>,
}

impl RawPlan {
    /// Extract a proposal from arbitrary JSON.
    pub fn from_value(value: &Value) -> Self {
        let Some(root) = value.as_object() else {
            return Self::default();
        };

        let levels = match field(root, &["levels"]).and_then(Value::as_array) {
            Some(levels) => levels
                .iter()
                .filter_map(Value::as_object)
                .map(RawLevel::from_object)
                .collect(),
            // Flat `steps` with no levels: treat as one level.
            None => match field(root, &["steps"]).and_then(Value::as_array) {
                Some(steps) => vec![RawLevel {
                    title: None,
                    steps: steps.iter().filter_map(RawStep::from_value).collect(),
                }],
                None => Vec::new(),
            },
        };

        Self {
            levels,
            competencies: competencies(root),
        }
    }

    /// Total number of proposed steps across all levels.
    pub fn step_count(&self) -> usize {
        self.levels.iter().map(|level| level.steps.len()).sum()
    }
}

impl RawLevel {
    fn from_object(obj: &Map<String, Value>) -> Self {
        let steps = field(obj, &["steps"])
            .and_then(Value::as_array)
            .map(|steps| steps.iter().filter_map(RawStep::from_value).collect())
            .unwrap_or_default();
        Self {
            title: field(obj, &["title", "name"]).and_then(text),
            steps,
        }
    }
}

impl RawStep {
    /// A step is an object, or a bare string taken as its title.
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(title) => Some(Self {
                title: Some(title.clone()),
                ..Self::default()
            }),
            Value::Object(obj) => Some(Self::from_object(obj)),
            _ => None,
        }
    }

    fn from_object(obj: &Map<String, Value>) -> Self {
        let required = match field(obj, &["required"]).and_then(boolean) {
            Some(required) => Some(required),
            None => field(obj, &["optional"]).and_then(boolean).map(|o| !o),
        };
        Self {
            title: field(obj, &["title", "name"]).and_then(text),
            competency_id: field(obj, &["competencyId", "competency_id", "competency"])
                .and_then(text),
            axis: field(obj, &["axis"]).and_then(text),
            effort_type: field(obj, &["effortType", "effort_type"]).and_then(text),
            duration_min: field(obj, &["durationMin", "duration_min", "duration"])
                .and_then(number),
            required,
            day_index: field(obj, &["dayIndex", "day_index", "day"]).and_then(number),
            order: field(obj, &["order"]).and_then(number),
            order_global: field(obj, &["orderGlobal", "order_global"]).and_then(number),
            level_index: field(obj, &["levelIndex", "level_index"]).and_then(number),
            step_index: field(obj, &["stepIndex", "step_index"]).and_then(number),
        }
    }
}

/// Extract a proposal from raw LLM reply text.
///
/// Tries, in order: the whole text as JSON, the body of the first Markdown
/// code fence, and the outermost `{ ... }` slice. Returns an empty plan if
/// none of them parse.
pub fn parse_proposal(text: &str) -> RawPlan {
    let trimmed = text.trim();
    let candidates = [Some(trimmed), fenced_body(trimmed), braced_slice(trimmed)];

    for candidate in candidates.into_iter().flatten() {
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            return RawPlan::from_value(&value);
        }
    }

    tracing::debug!(len = text.len(), "proposal text holds no parseable JSON");
    RawPlan::default()
}

fn fenced_body(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    // Skip the info string (e.g. `json`) on the fence line.
    let body_start = after.find('\n')? + 1;
    let body = &after[body_start..];
    let end = body.find("```").unwrap_or(body.len());
    Some(body[..end].trim())
}

fn braced_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn competencies(root: &Map<String, Value>) -> Vec<String> {
    let Some(list) = field(root, &["competencies", "competencyIds", "competency_ids"])
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };
    list.iter()
        .filter_map(|entry| match entry {
            Value::Object(obj) => field(obj, &["id", "competencyId"]).and_then(text),
            other => text(other),
        })
        .collect()
}

fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_levels_and_steps() {
        let raw = RawPlan::from_value(&json!({
            "competencies": [{"id": "listening"}, "speaking"],
            "levels": [
                {"title": "Basics", "steps": [
                    {"title": "Greet", "axis": "do", "effortType": "speak", "durationMin": 10},
                    {"title": "Listen", "required": false}
                ]},
                {"steps": [{"title": "Review", "optional": true, "dayIndex": "3"}]}
            ]
        }));

        assert_eq!(raw.competencies, vec!["listening", "speaking"]);
        assert_eq!(raw.levels.len(), 2);
        assert_eq!(raw.levels[0].title.as_deref(), Some("Basics"));
        assert_eq!(raw.levels[1].title, None);
        assert_eq!(raw.step_count(), 3);

        let greet = &raw.levels[0].steps[0];
        assert_eq!(greet.axis.as_deref(), Some("do"));
        assert_eq!(greet.effort_type.as_deref(), Some("speak"));
        assert_eq!(greet.duration_min, Some(10.0));
        assert_eq!(greet.required, None);

        assert_eq!(raw.levels[0].steps[1].required, Some(false));
        assert_eq!(raw.levels[1].steps[0].required, Some(false));
        assert_eq!(raw.levels[1].steps[0].day_index, Some(3.0));
    }

    #[test]
    fn wrong_types_are_absent() {
        let raw = RawPlan::from_value(&json!({
            "levels": [
                42,
                {"title": ["x"], "steps": [
                    {"title": {"nested": true}, "durationMin": "soon", "order": null},
                    7,
                    "Just a title"
                ]}
            ]
        }));
        assert_eq!(raw.levels.len(), 1);
        let steps = &raw.levels[0].steps;
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0], RawStep::default());
        assert_eq!(steps[1].title.as_deref(), Some("Just a title"));
    }

    #[test]
    fn flat_steps_become_one_level() {
        let raw = RawPlan::from_value(&json!({"steps": ["a", "b", "c"]}));
        assert_eq!(raw.levels.len(), 1);
        assert_eq!(raw.step_count(), 3);
    }

    #[test]
    fn non_object_root_is_empty() {
        assert_eq!(RawPlan::from_value(&json!([1, 2, 3])), RawPlan::default());
        assert_eq!(RawPlan::from_value(&json!("plan")), RawPlan::default());
    }

    #[test]
    fn parses_fenced_reply() {
        let reply = "Here is your plan:\n```json\n{\"levels\": [{\"steps\": [\"a\", \"b\"]}]}\n```\nEnjoy!";
        assert_eq!(parse_proposal(reply).step_count(), 2);
    }

    #[test]
    fn parses_braced_reply_without_fence() {
        let reply = "Sure! {\"levels\": [{\"steps\": [\"a\"]}]} Hope that helps.";
        assert_eq!(parse_proposal(reply).step_count(), 1);
    }

    #[test]
    fn garbage_reply_is_empty_plan() {
        assert_eq!(parse_proposal("I cannot help with that."), RawPlan::default());
        assert_eq!(parse_proposal(""), RawPlan::default());
        assert_eq!(parse_proposal("{ not json }"), RawPlan::default());
    }
}
