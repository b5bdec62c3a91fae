mod config;
mod ritual_cmds;
mod ritual_file;
#[cfg(test)]
mod test_util;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ritual", about = "Normalize ritual plans and track step progression")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a ritual config file with label and level defaults
    Init {
        /// Label locale (e.g. en, fr)
        #[arg(long, default_value = "en")]
        locale: String,
        /// Steps per level
        #[arg(long, default_value_t = 7)]
        steps_per_level: u32,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Normalize an LLM plan proposal into a ritual file
    Normalize {
        /// Path to the proposal (JSON or raw reply text); `-` reads stdin
        proposal: String,
        /// Number of days (steps) the plan must have
        #[arg(long, allow_hyphen_values = true)]
        total_steps: f64,
        /// Label locale (overrides RITUAL_LOCALE and the config file)
        #[arg(long)]
        locale: Option<String>,
        /// Steps per level (overrides RITUAL_STEPS_PER_LEVEL and the config file)
        #[arg(long, allow_hyphen_values = true)]
        steps_per_level: Option<f64>,
        /// Write the ritual file here instead of printing it
        #[arg(long)]
        output: Option<String>,
    },
    /// Show level and step states for a ritual file
    Status {
        /// Ritual file
        file: String,
    },
    /// Show the next actionable step
    Next {
        /// Ritual file
        file: String,
    },
    /// Check whether a step may be opened (exit code 1 if not)
    CanOpen {
        /// Ritual file
        file: String,
        level_id: String,
        step_id: String,
    },
    /// Start an attempt (on the current step if no ids are given)
    Start {
        /// Ritual file
        file: String,
        level_id: Option<String>,
        step_id: Option<String>,
    },
    /// Record a successful attempt (on the current step if no ids are given)
    Complete {
        /// Ritual file
        file: String,
        level_id: Option<String>,
        step_id: Option<String>,
        /// Score to store with the attempt
        #[arg(long)]
        score: Option<f64>,
    },
    /// Record a failed attempt (on the current step if no ids are given)
    Fail {
        /// Ritual file
        file: String,
        level_id: Option<String>,
        step_id: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    ritual_cmds::run_ritual_command(cli.command)?;

    Ok(())
}
