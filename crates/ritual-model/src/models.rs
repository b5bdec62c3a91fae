use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Schema version stamped on every canonical plan.
pub const PLAN_SCHEMA_VERSION: u32 = 2;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Learning axis a step works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Understand,
    Do,
    Perceive,
    Consolidate,
}

impl Axis {
    pub const ALL: [Axis; 4] = [Self::Understand, Self::Do, Self::Perceive, Self::Consolidate];
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Understand => "understand",
            Self::Do => "do",
            Self::Perceive => "perceive",
            Self::Consolidate => "consolidate",
        };
        f.write_str(s)
    }
}

impl FromStr for Axis {
    type Err = AxisParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "understand" => Ok(Self::Understand),
            "do" => Ok(Self::Do),
            "perceive" => Ok(Self::Perceive),
            "consolidate" => Ok(Self::Consolidate),
            other => Err(AxisParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Axis`] string.
#[derive(Debug, Clone)]
pub struct AxisParseError(pub String);

impl fmt::Display for AxisParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid axis: {:?}", self.0)
    }
}

impl std::error::Error for AxisParseError {}

// ---------------------------------------------------------------------------

/// Kind of effort a step asks of the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffortType {
    Quiz,
    Listen,
    Speak,
    Read,
    Write,
    Drill,
    Simulation,
    Checklist,
    Reflection,
    Watch,
    Practice,
    Review,
}

impl EffortType {
    pub const ALL: [EffortType; 12] = [
        Self::Quiz,
        Self::Listen,
        Self::Speak,
        Self::Read,
        Self::Write,
        Self::Drill,
        Self::Simulation,
        Self::Checklist,
        Self::Reflection,
        Self::Watch,
        Self::Practice,
        Self::Review,
    ];
}

impl fmt::Display for EffortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Quiz => "quiz",
            Self::Listen => "listen",
            Self::Speak => "speak",
            Self::Read => "read",
            Self::Write => "write",
            Self::Drill => "drill",
            Self::Simulation => "simulation",
            Self::Checklist => "checklist",
            Self::Reflection => "reflection",
            Self::Watch => "watch",
            Self::Practice => "practice",
            Self::Review => "review",
        };
        f.write_str(s)
    }
}

impl FromStr for EffortType {
    type Err = EffortTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quiz" => Ok(Self::Quiz),
            "listen" => Ok(Self::Listen),
            "speak" => Ok(Self::Speak),
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "drill" => Ok(Self::Drill),
            "simulation" => Ok(Self::Simulation),
            "checklist" => Ok(Self::Checklist),
            "reflection" => Ok(Self::Reflection),
            "watch" => Ok(Self::Watch),
            "practice" => Ok(Self::Practice),
            "review" => Ok(Self::Review),
            other => Err(EffortTypeParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`EffortType`] string.
#[derive(Debug, Clone)]
pub struct EffortTypeParseError(pub String);

impl fmt::Display for EffortTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid effort type: {:?}", self.0)
    }
}

impl std::error::Error for EffortTypeParseError {}

// ---------------------------------------------------------------------------

/// Why a step was synthesized by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutofillReason {
    /// The proposal had fewer steps than requested.
    MissingStep,
}

impl fmt::Display for AutofillReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingStep => f.write_str("missing_step"),
        }
    }
}

// ---------------------------------------------------------------------------

/// Outcome of a finished attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Fail,
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Fail => "fail",
        };
        f.write_str(s)
    }
}

impl FromStr for AttemptOutcome {
    type Err = AttemptOutcomeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "fail" => Ok(Self::Fail),
            other => Err(AttemptOutcomeParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`AttemptOutcome`] string.
#[derive(Debug, Clone)]
pub struct AttemptOutcomeParseError(pub String);

impl fmt::Display for AttemptOutcomeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid attempt outcome: {:?}", self.0)
    }
}

impl std::error::Error for AttemptOutcomeParseError {}

// ---------------------------------------------------------------------------

/// Derived run-state of a step. Recomputed from plan + progress, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRunState {
    Locked,
    Active,
    Completed,
}

impl fmt::Display for StepRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Locked => "locked",
            Self::Active => "active",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

impl FromStr for StepRunState {
    type Err = StepRunStateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "locked" => Ok(Self::Locked),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(StepRunStateParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`StepRunState`] string.
#[derive(Debug, Clone)]
pub struct StepRunStateParseError(pub String);

impl fmt::Display for StepRunStateParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid step run state: {:?}", self.0)
    }
}

impl std::error::Error for StepRunStateParseError {}

// ---------------------------------------------------------------------------
// Plan structs
// ---------------------------------------------------------------------------

/// One atomic unit of the curriculum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// `step-<levelIndex>-<stepIndex>`, assigned by the normalizer.
    pub id: String,
    pub title: String,
    pub competency_id: String,
    pub axis: Axis,
    pub effort_type: EffortType,
    pub duration_min: u32,
    pub required: bool,
    pub level_index: u32,
    pub step_index: u32,
    pub order_global: u32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_autofill: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autofill_reason: Option<AutofillReason>,
}

/// An ordered, non-empty group of steps gated as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    /// `level-<n>`, 1-based and contiguous.
    pub id: String,
    pub title: String,
    pub steps: Vec<Step>,
}

/// A canonical, exact-length plan. Immutable once normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub schema_version: u32,
    pub total_steps: u32,
    pub steps_per_level: u32,
    pub levels_count: u32,
    pub levels: Vec<Level>,
}

impl Plan {
    /// All steps in plan order.
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.levels.iter().flat_map(|level| level.steps.iter())
    }

    /// Look up a level by id.
    pub fn level(&self, level_id: &str) -> Option<&Level> {
        self.levels.iter().find(|level| level.id == level_id)
    }

    /// Look up a step by `(level_id, step_id)`.
    ///
    /// Returns `None` when either id is unknown or the step does not belong
    /// to the named level.
    pub fn find_step(&self, level_id: &str, step_id: &str) -> Option<(&Level, &Step)> {
        let level = self.level(level_id)?;
        let step = level.steps.iter().find(|step| step.id == step_id)?;
        Some((level, step))
    }

    /// SHA-256 hex digest of the plan's canonical JSON encoding.
    ///
    /// Two plans normalized from the same input with the same parameters
    /// always share a fingerprint.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

// ---------------------------------------------------------------------------
// Progress structs
// ---------------------------------------------------------------------------

/// Address of a step inside a plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRef {
    pub level_id: String,
    pub step_id: String,
}

impl StepRef {
    pub fn new(level_id: impl Into<String>, step_id: impl Into<String>) -> Self {
        Self {
            level_id: level_id.into(),
            step_id: step_id.into(),
        }
    }
}

impl fmt::Display for StepRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.level_id, self.step_id)
    }
}

/// Caller-supplied metadata attached to a finished attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Any other fields the caller wants to keep with the attempt.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl OutcomeMeta {
    pub fn with_score(score: f64) -> Self {
        Self {
            score: Some(score),
            extra: serde_json::Map::new(),
        }
    }
}

/// One try at a step. `outcome` is `None` while the attempt is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<AttemptOutcome>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<OutcomeMeta>,
}

impl Attempt {
    /// A freshly started attempt with no outcome yet.
    pub fn open(started_at: DateTime<Utc>) -> Self {
        Self {
            outcome: None,
            started_at,
            finished_at: None,
            meta: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.outcome.is_none()
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Some(AttemptOutcome::Success)
    }
}

/// Per-ritual learner state: attempt history plus the cached `current` pointer.
///
/// Attempts are only ever appended or closed, never removed. `current` is a
/// cache refreshed on every recompute and is not a source of truth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    #[serde(default)]
    pub attempts: BTreeMap<String, Vec<Attempt>>,
    #[serde(default)]
    pub current: Option<StepRef>,
}

impl Progress {
    /// Attempt history for a step (empty if never attempted).
    pub fn attempts_for(&self, step_id: &str) -> &[Attempt] {
        self.attempts.get(step_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// A step is completed once any of its attempts succeeded.
    pub fn is_completed(&self, step_id: &str) -> bool {
        self.attempts_for(step_id).iter().any(Attempt::is_success)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn step(level: u32, index: u32, order: u32) -> Step {
        Step {
            id: format!("step-{level}-{index}"),
            title: format!("Day {order}"),
            competency_id: "core".to_string(),
            axis: Axis::Understand,
            effort_type: EffortType::Practice,
            duration_min: 5,
            required: true,
            level_index: level,
            step_index: index,
            order_global: order,
            is_autofill: false,
            autofill_reason: None,
        }
    }

    fn two_level_plan() -> Plan {
        Plan {
            schema_version: PLAN_SCHEMA_VERSION,
            total_steps: 3,
            steps_per_level: 2,
            levels_count: 2,
            levels: vec![
                Level {
                    id: "level-1".to_string(),
                    title: "Week 1".to_string(),
                    steps: vec![step(1, 1, 1), step(1, 2, 2)],
                },
                Level {
                    id: "level-2".to_string(),
                    title: "Week 2".to_string(),
                    steps: vec![step(2, 1, 3)],
                },
            ],
        }
    }

    #[test]
    fn axis_display_roundtrip() {
        for v in &Axis::ALL {
            let parsed: Axis = v.to_string().parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn axis_invalid() {
        assert!("feel".parse::<Axis>().is_err());
    }

    #[test]
    fn effort_type_display_roundtrip() {
        for v in &EffortType::ALL {
            let parsed: EffortType = v.to_string().parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn effort_type_invalid() {
        let err = "juggle".parse::<EffortType>().unwrap_err();
        assert_eq!(err.to_string(), "invalid effort type: \"juggle\"");
    }

    #[test]
    fn attempt_outcome_and_run_state_parse() {
        assert_eq!("fail".parse::<AttemptOutcome>().unwrap(), AttemptOutcome::Fail);
        assert!("maybe".parse::<AttemptOutcome>().is_err());
        assert_eq!(
            "active".parse::<StepRunState>().unwrap(),
            StepRunState::Active
        );
        assert!("open".parse::<StepRunState>().is_err());
    }

    #[test]
    fn step_serializes_camel_case_without_autofill_fields() {
        let json = serde_json::to_value(step(1, 2, 2)).unwrap();
        assert_eq!(json["id"], "step-1-2");
        assert_eq!(json["competencyId"], "core");
        assert_eq!(json["effortType"], "practice");
        assert_eq!(json["orderGlobal"], 2);
        assert!(json.get("isAutofill").is_none());
        assert!(json.get("autofillReason").is_none());
    }

    #[test]
    fn autofill_step_serializes_reason() {
        let mut s = step(1, 1, 1);
        s.is_autofill = true;
        s.autofill_reason = Some(AutofillReason::MissingStep);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["isAutofill"], true);
        assert_eq!(json["autofillReason"], "missing_step");
    }

    #[test]
    fn find_step_requires_matching_level() {
        let plan = two_level_plan();
        assert!(plan.find_step("level-1", "step-1-2").is_some());
        assert!(plan.find_step("level-2", "step-1-2").is_none());
        assert!(plan.find_step("level-9", "step-1-1").is_none());
        assert_eq!(plan.steps().count(), 3);
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let plan = two_level_plan();
        let a = plan.fingerprint().unwrap();
        let b = plan.clone().fingerprint().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let mut changed = plan;
        changed.levels[1].title = "Week two".to_string();
        assert_ne!(a, changed.fingerprint().unwrap());
    }

    #[test]
    fn progress_completion_needs_success() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let mut progress = Progress::default();
        progress.attempts.insert(
            "step-1-1".to_string(),
            vec![Attempt {
                outcome: Some(AttemptOutcome::Fail),
                started_at: ts,
                finished_at: Some(ts),
                meta: None,
            }],
        );
        assert!(!progress.is_completed("step-1-1"));
        assert!(!progress.is_completed("step-1-2"));

        progress
            .attempts
            .get_mut("step-1-1")
            .unwrap()
            .push(Attempt {
                outcome: Some(AttemptOutcome::Success),
                started_at: ts,
                finished_at: Some(ts),
                meta: Some(OutcomeMeta::with_score(0.9)),
            });
        assert!(progress.is_completed("step-1-1"));
    }

    #[test]
    fn progress_roundtrips_through_json() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let mut progress = Progress::default();
        progress
            .attempts
            .insert("step-1-1".to_string(), vec![Attempt::open(ts)]);
        progress.current = Some(StepRef::new("level-1", "step-1-1"));

        let json = serde_json::to_string(&progress).unwrap();
        assert!(json.contains("\"startedAt\""));
        let back: Progress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, progress);
        assert!(back.attempts_for("step-1-1")[0].is_open());
    }
}
