use crate::server;
use clap::{Args, Parser, Subcommand, ValueEnum};
use onest_adapter::eligibility::{evaluate, Credentials, EligibilityCriteria};
use onest_adapter::error::AppError;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ONEST network adapter",
    about = "Run the provider or seeker side of an ONEST work-opportunity network",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect eligibility criteria without running the service
    Eligibility {
        #[command(subcommand)]
        command: EligibilityCommand,
    },
}

#[derive(Subcommand, Debug)]
enum EligibilityCommand {
    /// Evaluate credentials against criteria and print the per-attribute report
    Check(EligibilityCheckArgs),
}

/// Which half of the protocol this process serves.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum Role {
    /// Answer search/select/init/confirm/status/cancel and post callbacks
    #[default]
    Provider,
    /// Receive on_* callbacks
    Seeker,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Protocol role to serve
    #[arg(long, value_enum, default_value_t = Role::Provider)]
    pub(crate) role: Role,
    /// CSV file of offerings to load at startup (provider role)
    #[arg(long)]
    pub(crate) offerings: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct EligibilityCheckArgs {
    /// Criteria as a JSON object, e.g. '{"age": {"$gte": 18}}'
    #[arg(long, value_parser = parse_object)]
    pub(crate) criteria: serde_json::Map<String, Value>,
    /// Applicant credentials as a JSON object
    #[arg(long, value_parser = parse_object)]
    pub(crate) credentials: serde_json::Map<String, Value>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Eligibility {
            command: EligibilityCommand::Check(args),
        } => {
            run_eligibility_check(args);
            Ok(())
        }
    }
}

fn run_eligibility_check(args: EligibilityCheckArgs) {
    let criteria = EligibilityCriteria(args.criteria);
    let credentials: Credentials = args.credentials;
    let report = evaluate(&criteria, &credentials);

    println!(
        "Eligibility: {}",
        if report.eligible { "eligible" } else { "not eligible" }
    );
    for (attribute, detail) in &report.details {
        let provided = detail
            .provided
            .as_ref()
            .map(Value::to_string)
            .unwrap_or_else(|| "(missing)".to_string());
        println!(
            "- {}: {} (expected {}, provided {})",
            attribute,
            detail.reason.label(),
            detail.expected,
            provided
        );
    }
}

fn parse_object(raw: &str) -> Result<serde_json::Map<String, Value>, String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("expected a JSON object".to_string()),
        Err(err) => Err(format!("invalid JSON ({err})")),
    }
}
