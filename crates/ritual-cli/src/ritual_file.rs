//! On-disk ritual file: a canonical plan plus its progress record.
//!
//! The plan fingerprint is stored alongside so a hand-edited plan is caught
//! before progress is applied to it.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use ritual_model::{PLAN_SCHEMA_VERSION, Plan, Progress};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RitualFile {
    pub plan_fingerprint: String,
    pub plan: Plan,
    #[serde(default)]
    pub progress: Progress,
}

impl RitualFile {
    pub fn new(plan: Plan, progress: Progress) -> Result<Self> {
        let plan_fingerprint = plan.fingerprint().context("failed to fingerprint plan")?;
        Ok(Self {
            plan_fingerprint,
            plan,
            progress,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize ritual file")
    }
}

/// Read and verify a ritual file.
pub fn load(path: &str) -> Result<RitualFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read ritual file: {path}"))?;
    let file: RitualFile = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse ritual file: {path}"))?;

    if file.plan.schema_version != PLAN_SCHEMA_VERSION {
        bail!(
            "ritual file {path} has plan schema version {}, expected {PLAN_SCHEMA_VERSION}",
            file.plan.schema_version
        );
    }
    let actual = file.plan.fingerprint().context("failed to fingerprint plan")?;
    if actual != file.plan_fingerprint {
        bail!("plan in {path} was modified after normalization (fingerprint mismatch)");
    }
    Ok(file)
}

/// Write a ritual file, replacing any existing one.
pub fn save(path: &str, file: &RitualFile) -> Result<()> {
    let json = file.to_json()?;
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }
    std::fs::write(path, json).with_context(|| format!("failed to write ritual file: {path}"))
}
