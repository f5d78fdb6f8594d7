//! askql - Ask questions in plain language about uploaded CSV datasets.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use askql::cli::{Cli, Command, EvaluateArgs};
use askql::config::Config;
use askql::dataset::DatasetRegistry;
use askql::evaluation::{load_cases, EvaluationReport};
use askql::llm::create_client;
use askql::logging;
use askql::monitoring::Monitor;
use askql::safety::SqlGate;
use askql::server::{self, AppState};
use askql::service::QueryService;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };

    match config.logging.log_path() {
        Some(path) => logging::init_file_logging(&path),
        None => logging::init_stderr_logging(),
    }

    let outcome = match cli.command {
        Some(Command::Evaluate(args)) => evaluate(config, args).await,
        Some(Command::Serve) | None => run(config).await,
    };
    if let Err(e) = outcome {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Resolves configuration with precedence: CLI, environment, file, defaults.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load_from_file(&cli.config_path())?;
    config.apply_env();
    cli.apply_to(&mut config);
    config.validate()?;
    Ok(config)
}

fn build_service(config: &Config) -> anyhow::Result<QueryService> {
    let registry = DatasetRegistry::new(
        &config.server.upload_dir,
        &config.server.default_database,
    )
    .context("Failed to prepare the upload directory")?
    .with_query_timeout(Duration::from_secs(config.query.timeout_secs));
    if let Some(name) = registry.restore()? {
        info!("Restored active dataset '{}'", name);
    }

    let llm = create_client(&config.llm)?;
    info!("Using LLM provider '{}'", config.llm.provider()?);

    let service = QueryService::new(
        Arc::new(registry),
        llm,
        Arc::new(Monitor::new(&config.budget)),
    )
    .with_gate(SqlGate::new().with_parse_check(config.safety.parse_check))
    .with_llm_timeout(Duration::from_secs(config.llm.timeout_secs));
    Ok(service)
}

async fn run(config: Config) -> anyhow::Result<()> {
    let service = build_service(&config)?;
    let state = AppState::new(Arc::new(service), &config.server);
    server::serve(state, &config.server).await?;
    Ok(())
}

async fn evaluate(config: Config, args: EvaluateArgs) -> anyhow::Result<()> {
    let cases = load_cases(&args.file)?;
    let service = build_service(&config)?;
    let report = service
        .evaluate(
            &cases,
            args.dataset.as_deref(),
            Duration::from_secs(args.pause_secs),
        )
        .await
        .context("Evaluation stopped")?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &EvaluationReport) {
    for (index, outcome) in report.outcomes.iter().enumerate() {
        println!(
            "[{}/{}] {}",
            index + 1,
            report.total(),
            outcome.question
        );
        println!("  gold:      {}", outcome.gold_sql);
        println!(
            "  generated: {}",
            outcome.generated_sql.as_deref().unwrap_or("-")
        );
        match (&outcome.error, outcome.correct) {
            (_, true) => println!("  -> correct"),
            (Some(error), false) => println!("  -> incorrect ({error})"),
            (None, false) => println!("  -> incorrect (results differ)"),
        }
    }
    println!(
        "Execution accuracy: {:.2}% ({}/{})",
        report.accuracy(),
        report.correct(),
        report.total()
    );
}
