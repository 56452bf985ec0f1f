//! Runs the built-in query-context suite against the in-process emulator
//! and prints the run report.

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use common::{AdminEndpoint, Config, pretty::TableStyleKind};
use emulator::{Emulator, EmulatorOptions, Validation};
use harness::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "driver-harness",
    about = "Exercise the submit, scan and close stages of a SQL driver"
)]
struct Args {
    /// Project identifier (overrides SPANNER_TEST_PROJECT)
    #[arg(long)]
    project: Option<String>,

    /// Instance identifier (overrides SPANNER_TEST_INSTANCE)
    #[arg(long)]
    instance: Option<String>,

    /// Database identifier (overrides SPANNER_TEST_DBID)
    #[arg(long)]
    database: Option<String>,

    /// What to do after a row fails to decode
    #[arg(long, value_enum, default_value_t = PolicyArg::Continue)]
    scan_policy: PolicyArg,

    /// When the emulator reports queries it cannot analyze
    #[arg(long, value_enum, default_value_t = ValidationArg::Deferred)]
    validation: ValidationArg,

    /// Output format for the report
    #[arg(long, value_enum, default_value_t = FormatArg::Table)]
    format: FormatArg,

    /// Table style when printing the report as a table
    #[arg(long, value_enum, default_value_t = StyleArg::Modern)]
    style: StyleArg,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    Continue,
    Halt,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ValidationArg {
    Deferred,
    OnSubmit,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Table,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StyleArg {
    Modern,
    Ascii,
    Plain,
}

impl From<PolicyArg> for ScanPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Continue => ScanPolicy::Continue,
            PolicyArg::Halt => ScanPolicy::Halt,
        }
    }
}

impl From<StyleArg> for TableStyleKind {
    fn from(arg: StyleArg) -> Self {
        match arg {
            StyleArg::Modern => TableStyleKind::Modern,
            StyleArg::Ascii => TableStyleKind::Ascii,
            StyleArg::Plain => TableStyleKind::Plain,
        }
    }
}

impl ValidationArg {
    /// Emulator mode and the stage at which it reports invalid queries.
    fn resolve(self) -> (Validation, ErrorSurface) {
        match self {
            ValidationArg::Deferred => (Validation::Deferred, ErrorSurface::Close),
            ValidationArg::OnSubmit => (Validation::OnSubmit, ErrorSurface::Submit),
        }
    }
}

fn resolve_config(args: &Args) -> Config {
    let mut config = Config::from_env();
    if let Some(project) = &args.project {
        config.project = project.clone();
    }
    if let Some(instance) = &args.instance {
        config.instance = instance.clone();
    }
    if let Some(database) = &args.database {
        config.database = database.clone();
    }
    config
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = resolve_config(&args);

    // Schema changes always go to the in-process emulator.
    let endpoint = config.admin_endpoint();
    match &endpoint {
        AdminEndpoint::Emulator { .. } => info!(%endpoint, "admin endpoint"),
        AdminEndpoint::Production { .. } => warn!(
            %endpoint,
            "production endpoint configured; running against the in-process emulator instead"
        ),
    }

    let (validation, surface) = args.validation.resolve();
    let emulator = Emulator::new(EmulatorOptions::default().with_validation(validation));
    emulator.create_database(&config.database_id()).await?;
    info!(database = %config.database_id(), ?validation, "emulator ready");

    let options = RunOptions {
        scan_policy: args.scan_policy.into(),
    };
    let report = Harness::new(config, Collaborators::from_backend(emulator))
        .with_options(options)
        .run(&query_context_fixture(), &query_context_cases(surface))
        .await?;

    match args.format {
        FormatArg::Table => println!("{}", report.render(args.style.into())),
        FormatArg::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if report.passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
