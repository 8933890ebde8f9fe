#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_TESTS_FAILED: i32 = 3;

#[derive(Parser)]
#[command(name = "stepwise")]
#[command(about = "Run natural-language browser test steps through an automation bridge", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    globals: GlobalArgs,
}

/// Connection and storage settings shared by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Automation bridge base URL (MCP_BRIDGE_URL is also honoured)
    #[arg(long, global = true, env = "STEPWISE_BRIDGE_URL")]
    pub bridge_url: Option<String>,

    /// Interpretation/verification oracle base URL
    #[arg(long, global = true, env = "STEPWISE_ORACLE_URL")]
    pub oracle_url: Option<String>,

    /// Root directory for selectors, results and screenshots
    #[arg(long, global = true, env = "STEPWISE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Shared secret for one-time codes when a step names none
    #[arg(long, global = true, env = "TOTP_SECRET_KEY", hide_env_values = true)]
    pub totp_secret: Option<String>,

    /// Local runner used when the bridge is down, e.g. "npx playwright test"
    #[arg(long, global = true, env = "STEPWISE_RUNNER")]
    pub runner: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute test cases and print the results
    Run {
        /// JSON file with a list of test cases (or {"test_cases": [...]})
        #[arg(short, long)]
        tests: PathBuf,

        /// Generated test code, used as interpretation context and by the fallback runner
        #[arg(short, long)]
        code: Option<PathBuf>,

        /// Execution id (generated when omitted)
        #[arg(long)]
        execution_id: Option<String>,
    },

    /// Show the status of an execution
    Status {
        /// Execution id
        execution_id: String,
    },

    /// Inspect the learned selector cache
    #[command(subcommand)]
    Registry(RegistryCommands),
}

#[derive(Subcommand)]
pub enum RegistryCommands {
    /// Selector remembered for a step on a page
    Lookup {
        /// Page URL
        url: String,

        /// Step text
        step: String,

        /// Element type (inferred from the step when omitted)
        #[arg(short, long)]
        element_type: Option<String>,
    },

    /// Print everything learned for a domain
    Show {
        /// Domain, e.g. app.example.com
        domain: String,
    },
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            let exit_code = stepwise::errors::exit_code_for(&err);

            // Output JSON error to stdout for programmatic consumption
            let error_json = json!({
                "error": true,
                "message": format!("{:#}", err),
                "exit_code": exit_code
            });
            println!(
                "{}",
                serde_json::to_string(&error_json).unwrap_or_else(|_| "{}".to_string())
            );

            // Also log to stderr for human reading
            eprintln!("Error: {:#}", err);
            std::process::exit(exit_code);
        }
    }
}

async fn run() -> Result<i32> {
    // Initialize tracing to stderr (so JSON output to stdout remains clean)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stepwise=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let cli = Cli::parse();
    let config = commands::config_from(&cli.globals);

    match cli.command {
        Commands::Run {
            tests,
            code,
            execution_id,
        } => {
            let all_passed = commands::run::handle_run(config, tests, code, execution_id).await?;
            Ok(if all_passed {
                EXIT_SUCCESS
            } else {
                EXIT_TESTS_FAILED
            })
        }
        Commands::Status { execution_id } => {
            commands::status::handle_status(config, &execution_id)?;
            Ok(EXIT_SUCCESS)
        }
        Commands::Registry(RegistryCommands::Lookup {
            url,
            step,
            element_type,
        }) => {
            commands::registry::handle_lookup(&config, &url, &step, element_type.as_deref())?;
            Ok(EXIT_SUCCESS)
        }
        Commands::Registry(RegistryCommands::Show { domain }) => {
            commands::registry::handle_show(&config, &domain)?;
            Ok(EXIT_SUCCESS)
        }
    }
}
