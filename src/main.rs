use clap::{Parser, Subcommand};
use sandloop::brain::{Brain, BrainConfig};
use sandloop::contract::OutputContract;
use sandloop::extract::extract_code;
use sandloop::repair::{RepairConfig, RepairController, Task};
use sandloop::sandbox::{Sandbox, SandboxConfig};
use std::path::PathBuf;
use std::process;
use tokio::signal;
use tracing::{Level, error, info, warn};
use tracing_subscriber::fmt;

/// CLI arguments
#[derive(Debug, Parser)]
#[command(name = "sandloop")]
#[command(about = "Run generated code in a sandbox and repair it until its outputs are right")]
struct Args {
    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the full repair loop for a task file
    Run {
        /// Task declaration (TOML)
        task: PathBuf,
    },
    /// Extract the code of one saved response and run it once
    Exec {
        /// File holding the response text
        response: PathBuf,
        /// Take the output contract and input files from this task
        #[arg(long)]
        task: Option<PathBuf>,
        /// Expected text output file, when no task is given (repeatable)
        #[arg(long = "expect")]
        expect: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays machine-readable
    fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    let sandbox_config = SandboxConfig::from_env();
    info!(
        dialect = %sandbox_config.dialect,
        timeout_secs = sandbox_config.constraints.timeout_secs,
        runs_root = %sandbox_config.runs_root.display(),
        "Configuration loaded"
    );
    let sandbox = Sandbox::from_config(sandbox_config).await?;

    match args.command {
        Command::Run { task } => run_task(sandbox, task).await,
        Command::Exec {
            response,
            task,
            expect,
        } => exec_response(sandbox, response, task, expect).await,
    }
}

async fn run_task(sandbox: Sandbox, task_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let task = Task::load(&task_path)?;
    let brain = Brain::new(BrainConfig::from_env()?)?;
    info!(model = brain.model(), task = %task.id, "Brain initialized");

    let controller = RepairController::new(brain, sandbox, RepairConfig::from_env());

    let result = tokio::select! {
        result = controller.get_code_and_output(&task) => result?,
        _ = async {
            signal::ctrl_c().await.ok();
        } => {
            warn!("Received shutdown signal, abandoning task");
            process::exit(130);
        }
    };

    match result {
        Some(code_and_output) => {
            println!("{}", serde_json::to_string_pretty(&code_and_output)?);
            Ok(())
        }
        None => {
            error!(task = %task.id, "No accepted code for task");
            process::exit(2);
        }
    }
}

async fn exec_response(
    sandbox: Sandbox,
    response_path: PathBuf,
    task_path: Option<PathBuf>,
    expect: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let response = std::fs::read_to_string(&response_path)?;
    let unit = extract_code(&response)?;

    let (contract, inputs) = match task_path {
        Some(path) => {
            let task = Task::load(&path)?;
            (task.contract, task.input_files)
        }
        None => {
            let requirements = expect
                .into_iter()
                .map(sandloop::contract::OutputFileRequirement::text);
            (OutputContract::new(requirements)?, Vec::new())
        }
    };

    let report = sandbox.run_once(&unit, &contract, &inputs).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.outcome.is_success() {
        process::exit(1);
    }
    Ok(())
}
