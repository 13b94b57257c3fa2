use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use stateprobe_stateful::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stateprobe")]
#[command(about = "Run model-based campaigns against the bounded counter", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a campaign and report the minimal failing sequence, if any
    Run {
        /// Counter implementation to test
        #[arg(long, value_enum, default_value_t = SubjectKind::Reference)]
        subject: SubjectKind,

        /// Number of sequences to try
        #[arg(long)]
        max_examples: Option<usize>,

        /// Step budget of every sequence
        #[arg(long)]
        max_steps: Option<usize>,

        /// Root seed (drawn from OS entropy when omitted)
        #[arg(long)]
        seed: Option<u64>,

        /// Maximum replays per shrink
        #[arg(long)]
        shrink_budget: Option<usize>,

        /// Keep going after the first failure
        #[arg(long)]
        no_fail_fast: bool,

        /// Worker threads (1 runs sequentially)
        #[arg(long, default_value_t = 1)]
        workers: usize,

        /// Per-call subject deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Write the first failure record to this file
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Replay the sequence of a saved failure record
    Replay {
        /// Path to a failure record written by `run --save`
        record: PathBuf,

        /// Counter implementation to replay against
        #[arg(long, value_enum, default_value_t = SubjectKind::Reference)]
        subject: SubjectKind,

        /// Per-call subject deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SubjectKind {
    Reference,
    LenientDecrement,
    LeakyDecrement,
    UncheckedAdd,
}

impl From<SubjectKind> for Flaw {
    fn from(kind: SubjectKind) -> Self {
        match kind {
            SubjectKind::Reference => Flaw::None,
            SubjectKind::LenientDecrement => Flaw::LenientDecrement,
            SubjectKind::LeakyDecrement => Flaw::LeakyDecrement,
            SubjectKind::UncheckedAdd => Flaw::UncheckedAdd,
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            subject,
            max_examples,
            max_steps,
            seed,
            shrink_budget,
            no_fail_fast,
            workers,
            timeout_ms,
            json,
            save,
        } => {
            // Environment overrides first, explicit flags win
            let mut config = CampaignConfig::from_env().context("Invalid STATEPROBE_* environment")?;
            if let Some(n) = max_examples {
                config = config.max_examples(n);
            }
            if let Some(n) = max_steps {
                config = config.max_steps_per_sequence(n);
            }
            if let Some(seed) = seed {
                config = config.seed(seed);
            }
            if let Some(budget) = shrink_budget {
                config = config.shrink_budget(budget);
            }
            if let Some(ms) = timeout_ms {
                config = config.subject_timeout(Duration::from_millis(ms));
            }
            config = config.fail_fast(!no_fail_fast);

            run_campaign(subject.into(), config, workers, json, save.as_deref())
        }
        Commands::Replay {
            record,
            subject,
            timeout_ms,
        } => replay_record(&record, subject.into(), timeout_ms),
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_campaign(
    flaw: Flaw,
    config: CampaignConfig,
    workers: usize,
    json: bool,
    save: Option<&Path>,
) -> Result<ExitCode> {
    let machine = counter_machine().context("Failed to build the counter machine")?;
    let campaign = Campaign::new(machine, move || CounterSubject::new(flaw), config)
        .context("Invalid campaign setup")?;
    info!(subject = %flaw, workers, "running campaign");
    let settings = campaign.config().clone();

    let report = if workers > 1 {
        ParallelCampaign::new(campaign, ParallelConfig::default().with_workers(workers))
            .context("Invalid parallel setup")?
            .run()
    } else {
        campaign.run()
    }
    .context("Campaign aborted")?;

    if let (Some(path), Some(record)) = (save, report.first_failure()) {
        let contents = record.to_json().context("Failed to serialize failure record")?;
        fs::write(path, contents).context(format!("Failed to write record to {}", path.display()))?;
    }

    if json {
        let contents = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", contents);
    } else {
        print_report(flaw, &settings, &report);
        if let Some(path) = save.filter(|_| !report.passed()) {
            println!("{}", format!("Record saved to {}", path.display()).bright_black());
        }
    }

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_report(flaw: Flaw, settings: &CampaignConfig, report: &CampaignReport<CounterError>) {
    println!("{} {}", "Subject:".bold(), flaw.to_string().cyan());
    if report.passed() {
        println!("{}", report.to_string().green());
    } else {
        println!("{}", report.to_string().red().bold());
    }

    if !report.coverage.is_empty() {
        println!("{}", "Outcomes:".bold());
        for line in report.coverage.to_string().lines() {
            println!("  {}", line);
        }
    }
    if report.passed() {
        return;
    }

    for record in &report.failures {
        println!();
        println!("{}", record);
    }
    println!();
    println!(
        "{}",
        format!("Reproduce: {}", reproduce_command(flaw, settings, report.seed)).bright_black()
    );
}

/// A `run` invocation repeating this campaign, with every non-default setting
fn reproduce_command(flaw: Flaw, settings: &CampaignConfig, seed: u64) -> String {
    let defaults = CampaignConfig::default();
    let mut command = format!("stateprobe run --subject {} --seed {}", flaw, seed);
    if settings.max_examples != defaults.max_examples {
        command.push_str(&format!(" --max-examples {}", settings.max_examples));
    }
    if settings.max_steps_per_sequence != defaults.max_steps_per_sequence {
        command.push_str(&format!(" --max-steps {}", settings.max_steps_per_sequence));
    }
    if settings.shrink_budget != defaults.shrink_budget {
        command.push_str(&format!(" --shrink-budget {}", settings.shrink_budget));
    }
    if !settings.fail_fast {
        command.push_str(" --no-fail-fast");
    }
    if let Some(timeout) = settings.subject_timeout {
        command.push_str(&format!(" --timeout-ms {}", timeout.as_millis()));
    }
    command
}

fn replay_record(path: &Path, flaw: Flaw, timeout_ms: Option<u64>) -> Result<ExitCode> {
    let contents = fs::read_to_string(path).context(format!("Failed to read record {}", path.display()))?;
    let record = FailureRecord::<CounterError>::from_json(&contents)
        .context(format!("Failed to parse record {}", path.display()))?;

    let mut config = CampaignConfig::default().seed(record.seed);
    if let Some(ms) = timeout_ms {
        config = config.subject_timeout(Duration::from_millis(ms));
    }
    let machine = counter_machine().context("Failed to build the counter machine")?;
    let campaign = Campaign::new(machine, move || CounterSubject::new(flaw), config)
        .context("Invalid campaign setup")?;
    let replay = campaign.replay(&record.sequence).context("Replay aborted")?;

    println!(
        "{} {} against {}",
        "Replaying".bold(),
        record.sequence,
        flaw.to_string().cyan()
    );
    for (idx, (step, outcome)) in record.sequence.steps().iter().zip(&replay.outcomes).enumerate() {
        println!("  {}. {} -> {}", idx + 1, step, outcome);
    }

    match &replay.verdict {
        ReplayVerdict::Passed => {
            println!("{}", format!("Passed, counter ends at {}", replay.model.value).green());
            Ok(ExitCode::SUCCESS)
        }
        ReplayVerdict::Failed(failure) => {
            println!("{}", format!("Failed {}", failure).red().bold());
            if *failure == record.failure() {
                println!("{}", "Reproduces the recorded failure".bright_black());
            } else {
                println!("{}", "Differs from the recorded failure".yellow());
            }
            Ok(ExitCode::FAILURE)
        }
        ReplayVerdict::Invalid { step } => {
            bail!("step {} of the record is not eligible in the state it reaches", step + 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reproduce_command_defaults() {
        assert_eq!(
            reproduce_command(Flaw::LeakyDecrement, &CampaignConfig::default(), 42),
            "stateprobe run --subject leaky-decrement --seed 42"
        );
    }

    #[test]
    fn test_reproduce_command_echoes_settings() {
        let settings = CampaignConfig::default()
            .max_examples(300)
            .max_steps_per_sequence(20)
            .shrink_budget(50)
            .fail_fast(false)
            .subject_timeout(Duration::from_millis(250));
        assert_eq!(
            reproduce_command(Flaw::UncheckedAdd, &settings, 5),
            "stateprobe run --subject unchecked-add --seed 5 --max-examples 300 --max-steps 20 \
             --shrink-budget 50 --no-fail-fast --timeout-ms 250"
        );
    }
}
