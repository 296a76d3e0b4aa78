// Token-service precompile suite runner
//
// Usage:
//   hts-suites list
//   hts-suites run --suite kyc --filter Grant
//   hts-suites scenario scenarios/mint_via_precompile.yaml --json

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hts_testing_framework::scenarios::{load_scenario_file, ScenarioExecutor};
use hts_testing_framework::{in_process_harness, suites, HarnessConfig, SuiteReport, SuiteRunner, SystemClock};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "hts-suites")]
#[command(about = "Run token-service precompile specs against an in-process ledger")]
struct Args {
    /// Harness configuration (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Specs in flight at once
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Seed for keys and generated values
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Directory for failure artifacts
    #[arg(long, global = true)]
    artifacts_dir: Option<PathBuf>,

    /// Print reports as JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List built-in suites and their specs
    List,
    /// Run built-in suites (all when no --suite is given)
    Run {
        #[arg(short, long = "suite")]
        suites: Vec<String>,
        /// Only specs whose name contains this text
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Run YAML scenario files
    Scenario {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

async fn load_config(args: &Args) -> Result<HarnessConfig> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::load(path).await?,
        None => HarnessConfig::default(),
    }
    .with_env_overrides()?;

    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(dir) = &args.artifacts_dir {
        config.artifacts_dir = Some(dir.clone());
    }
    config.validate()?;
    Ok(config)
}

fn report(reports: &[SuiteReport], json: bool) -> Result<bool> {
    for report in reports {
        if json {
            println!("{}", report.to_json().context("Failed to serialize report")?);
        } else {
            report.print_summary();
        }
    }
    Ok(reports.iter().all(SuiteReport::is_success))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if let Command::List = args.command {
        for suite in suites::all() {
            println!("{}", suite.name);
            for spec in suite.spec_names() {
                println!("  {}", spec);
            }
        }
        return Ok(());
    }

    let config = load_config(&args).await?;
    let (harness, _ledger) = in_process_harness(config, Arc::new(SystemClock))?;
    info!("Harness ready with seed {}", harness.seed());

    let reports = match &args.command {
        Command::List => Vec::new(),
        Command::Run { suites: names, filter } => {
            let mut selected = Vec::new();
            if names.is_empty() {
                selected = suites::all();
            } else {
                for name in names {
                    match suites::by_name(name) {
                        Some(suite) => selected.push(suite),
                        None => bail!(
                            "Unknown suite '{}' (known: {})",
                            name,
                            suites::SUITE_NAMES.join(", ")
                        ),
                    }
                }
            }
            if let Some(pattern) = filter {
                selected = selected.into_iter().map(|suite| suite.filtered(pattern)).collect();
            }
            SuiteRunner::new(&harness).run_all(selected).await
        }
        Command::Scenario { files } => {
            let mut scenarios = Vec::with_capacity(files.len());
            for file in files {
                scenarios.push(load_scenario_file(file).await?);
            }
            vec![ScenarioExecutor::new(&harness).run(scenarios).await?]
        }
    };

    if reports.iter().all(|r| r.total() == 0) {
        warn!("No specs selected");
    }
    if !report(&reports, args.json)? {
        std::process::exit(1);
    }
    Ok(())
}
