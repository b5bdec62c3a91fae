//! CLI handlers for `ritual` subcommands.
//!
//! Implements:
//! - `ritual init`                              -- write the config file
//! - `ritual normalize <proposal>`              -- build a ritual file from a proposal
//! - `ritual status <file>`                     -- show derived level/step states
//! - `ritual next <file>`                       -- show the current step
//! - `ritual can-open <file> <level> <step>`    -- check whether a step is open
//! - `ritual start|complete|fail <file> [ids]`  -- record an attempt

use std::io::Read;

use anyhow::{Context, Result, bail};
use chrono::Utc;

use ritual_core::plan::{Locale, normalize, parse_proposal};
use ritual_core::state::{ProgressionEngine, dispatch, queries};
use ritual_model::{OutcomeMeta, Progress, StepRef, StepRunState};

use crate::Commands;
use crate::config::{self, ConfigFile, NormalizeSection, RitualConfig};
use crate::ritual_file::{self, RitualFile};

// -----------------------------------------------------------------------
// Public entry points
// -----------------------------------------------------------------------

/// Dispatch a `ritual` subcommand to its handler.
pub fn run_ritual_command(command: Commands) -> Result<()> {
    match command {
        Commands::Normalize {
            proposal,
            total_steps,
            locale,
            steps_per_level,
            output,
        } => cmd_normalize(
            &proposal,
            total_steps,
            locale.as_deref(),
            steps_per_level,
            output.as_deref(),
        ),
        Commands::Status { file } => cmd_status(&file),
        Commands::Next { file } => cmd_next(&file),
        Commands::Start {
            file,
            level_id,
            step_id,
        } => cmd_record(&file, Outcome::Start, level_id, step_id),
        Commands::Complete {
            file,
            level_id,
            step_id,
            score,
        } => cmd_record(
            &file,
            Outcome::Success(score.map(OutcomeMeta::with_score)),
            level_id,
            step_id,
        ),
        Commands::Fail {
            file,
            level_id,
            step_id,
        } => cmd_record(&file, Outcome::Fail, level_id, step_id),
        Commands::Init {
            locale,
            steps_per_level,
            force,
        } => cmd_init(&locale, steps_per_level, force),
        Commands::CanOpen {
            file,
            level_id,
            step_id,
        } => {
            if !cmd_can_open(&file, &level_id, &step_id)? {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

// -----------------------------------------------------------------------
// ritual init
// -----------------------------------------------------------------------

/// Write the config file with the given defaults.
fn cmd_init(locale: &str, steps_per_level: u32, force: bool) -> Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }
    if steps_per_level == 0 {
        bail!("--steps-per-level must be at least 1");
    }

    let cfg = ConfigFile {
        normalize: NormalizeSection {
            locale: locale.to_string(),
            steps_per_level,
        },
    };
    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!(
        "  normalize.locale = {locale} (labels: {})",
        Locale::from_tag(locale)
    );
    println!("  normalize.steps_per_level = {steps_per_level}");
    Ok(())
}

// -----------------------------------------------------------------------
// ritual normalize
// -----------------------------------------------------------------------

fn read_proposal(source: &str) -> Result<String> {
    if source == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read proposal from stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("failed to read proposal file: {source}"))
    }
}

/// Normalize a proposal, bootstrap its progress, and write or print the
/// resulting ritual file.
fn cmd_normalize(
    source: &str,
    total_steps: f64,
    locale: Option<&str>,
    steps_per_level: Option<f64>,
    output: Option<&str>,
) -> Result<()> {
    let text = read_proposal(source)?;
    let resolved = RitualConfig::resolve(locale, steps_per_level)?;

    let raw = parse_proposal(&text);
    let normalized = normalize(&raw, total_steps, &resolved.normalize_options());
    let meta = &normalized.meta;

    tracing::info!(
        total_steps = meta.total_steps,
        steps_per_level = meta.steps_per_level,
        levels_count = meta.levels_count,
        proposed = raw.step_count(),
        "plan normalized"
    );
    if meta.truncated_count > 0 {
        tracing::warn!(
            truncated = meta.truncated_count,
            "proposal had more steps than requested; extra steps dropped"
        );
    }
    if meta.autofill_count > 0 {
        tracing::warn!(
            autofilled = meta.autofill_count,
            step_ids = ?meta.autofill_step_ids,
            "proposal had fewer steps than requested; steps synthesized"
        );
    }

    let progress = ProgressionEngine::recompute_states(&normalized.plan, &Progress::default());
    let file = RitualFile::new(normalized.plan, progress)?;

    match output {
        Some(path) => {
            ritual_file::save(path, &file)?;
            println!("Ritual written to {path}");
            println!();
            println!("  Steps:       {}", meta.total_steps);
            println!("  Levels:      {}", meta.levels_count);
            println!("  Autofilled:  {}", meta.autofill_count);
            println!("  Truncated:   {}", meta.truncated_count);
            println!("  Fingerprint: {}", file.plan_fingerprint);
        }
        None => println!("{}", file.to_json()?),
    }
    Ok(())
}

// -----------------------------------------------------------------------
// ritual status / next / can-open
// -----------------------------------------------------------------------

fn state_marker(state: StepRunState) -> &'static str {
    match state {
        StepRunState::Completed => "[x]",
        StepRunState::Active => "[>]",
        StepRunState::Locked => "[ ]",
    }
}

fn cmd_status(path: &str) -> Result<()> {
    let file = ritual_file::load(path)?;
    let view = ProgressionEngine::derive(&file.plan, &file.progress);

    for (level, level_view) in file.plan.levels.iter().zip(&view.levels) {
        let badge = if level_view.cleared {
            "cleared"
        } else if level_view.reachable {
            "open"
        } else {
            "locked"
        };
        println!("{}  {}  ({badge})", level.id, level.title);
        for (step, step_view) in level.steps.iter().zip(&level_view.steps) {
            let optional = if step.required { "" } else { "  (optional)" };
            let attempts = file.progress.attempts_for(&step.id).len();
            println!(
                "  {} {:<10} {:<32} {:>3} min  attempts: {attempts}{optional}",
                state_marker(step_view.state),
                step.id,
                step.title,
                step.duration_min,
            );
        }
    }

    let summary = queries::get_plan_progress(&file.plan, &file.progress);
    println!();
    println!(
        "Steps: {}/{} completed, required {}/{}, levels cleared {}/{}",
        summary.completed,
        summary.total,
        summary.required_completed,
        summary.required_total,
        summary.levels_cleared,
        summary.levels_total
    );
    match view.current {
        Some(current) => println!("Current: {current}"),
        None => println!("Current: none (plan finished)"),
    }
    Ok(())
}

fn cmd_next(path: &str) -> Result<()> {
    let file = ritual_file::load(path)?;
    match ProgressionEngine::get_next_available_step(&file.plan, &file.progress) {
        Some(next) => {
            let title = file
                .plan
                .find_step(&next.level_id, &next.step_id)
                .map(|(_, step)| step.title.as_str())
                .unwrap_or_default();
            println!("{next}  {title}");
        }
        None => println!("finished"),
    }
    Ok(())
}

/// Print whether a step may be opened. Returns the answer so the caller
/// can set the exit code.
fn cmd_can_open(path: &str, level_id: &str, step_id: &str) -> Result<bool> {
    let file = ritual_file::load(path)?;
    let open = ProgressionEngine::can_open_step(&file.plan, &file.progress, level_id, step_id);
    println!("{}", if open { "yes" } else { "no" });
    Ok(open)
}

// -----------------------------------------------------------------------
// ritual start / complete / fail
// -----------------------------------------------------------------------

enum Outcome {
    Start,
    Success(Option<OutcomeMeta>),
    Fail,
}

impl Outcome {
    fn verb(&self) -> &'static str {
        match self {
            Self::Start => "started",
            Self::Success(_) => "completed",
            Self::Fail => "failed",
        }
    }
}

/// Record an attempt against the named step, or the current step when no
/// ids are given, and write the file back.
fn cmd_record(
    path: &str,
    outcome: Outcome,
    level_id: Option<String>,
    step_id: Option<String>,
) -> Result<()> {
    let mut file = ritual_file::load(path)?;
    let plan = &file.plan;
    let progress = &file.progress;
    let now = Utc::now();
    let verb = outcome.verb();

    let recorded = match (level_id, step_id) {
        (Some(level_id), Some(step_id)) => {
            let result = match outcome {
                Outcome::Start => {
                    ProgressionEngine::mark_step_started(plan, progress, &level_id, &step_id, now)
                }
                Outcome::Success(meta) => ProgressionEngine::mark_step_completed(
                    plan, progress, &level_id, &step_id, now, meta,
                ),
                Outcome::Fail => {
                    ProgressionEngine::mark_step_failed(plan, progress, &level_id, &step_id, now)
                }
            };
            result.map(|next| (StepRef::new(level_id, step_id), next))
        }
        (None, None) => match outcome {
            Outcome::Start => dispatch::start_current_step(plan, progress, now),
            Outcome::Success(meta) => dispatch::complete_current_step(plan, progress, now, meta),
            Outcome::Fail => dispatch::fail_current_step(plan, progress, now),
        },
        _ => bail!("give both a level id and a step id, or neither"),
    };
    let (step, next) = recorded.with_context(|| format!("failed to record attempt in {path}"))?;

    file.progress = next;
    ritual_file::save(path, &file)?;

    tracing::info!(step = %step, outcome = verb, "attempt recorded");
    println!("Step {step} {verb}.");
    match &file.progress.current {
        Some(current) => println!("Next: {current}"),
        None => println!("Plan finished."),
    }
    Ok(())
}
