use anyhow::{Context, Result};
use repo_health::capability::{Checker, Registry};
use repo_health::cli::commands::{CheckCommand, ListCommand, RunCommand, ValidateCommand};
use repo_health::cli::output::*;
use repo_health::cli::{Cli, Command};
use repo_health::core::config::{AppConfig, PipelineConfig};
use repo_health::core::{ExecutionStatus, Pipeline, Repository};
use repo_health::execution::{HealthCheckEngine, PipelineExecutor};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let ok = match &cli.command {
        Command::Check(cmd) => check(cmd, config).await?,
        Command::Run(cmd) => run_pipeline(cmd, config).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::List(cmd) => list(cmd, &config)?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn build_engine(config: AppConfig) -> Arc<HealthCheckEngine> {
    let registry = Arc::new(Registry::with_builtin_checkers());
    Arc::new(HealthCheckEngine::new(registry, Arc::new(config)))
}

/// Repositories from the command line, else from the config file
fn resolve_repositories(paths: &[PathBuf], config: &AppConfig) -> Result<Vec<Repository>> {
    if paths.is_empty() {
        if config.repositories.is_empty() {
            anyhow::bail!("No repositories given and none configured");
        }
        return Ok(config.repositories.clone());
    }
    Ok(paths.iter().map(Repository::from_path).collect())
}

/// Cancel the run on Ctrl-C
fn cancel_on_interrupt() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            trigger.cancel();
        }
    });
    token
}

async fn check(cmd: &CheckCommand, mut config: AppConfig) -> Result<bool> {
    let repositories = resolve_repositories(&cmd.paths, &config)?;
    if let Some(concurrency) = cmd.concurrency {
        config.engine.max_concurrency = concurrency;
    }
    if let Some(timeout) = cmd.timeout {
        config.engine.timeout_secs = timeout;
    }

    let max_concurrency = config.engine.max_concurrency;
    let timeout = Duration::from_secs(config.engine.timeout_secs);
    let engine = build_engine(config);

    if !cmd.json {
        let progress = create_progress_bar(repositories.len());
        engine.add_event_handler(move |event| track_progress(&progress, &event));
    }

    let cancel = cancel_on_interrupt();
    let workflow = engine
        .execute_health_check(&cancel, &repositories, max_concurrency, timeout)
        .await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&workflow)?);
    } else {
        println!("\n{}", format_workflow(&workflow));
    }

    Ok(!workflow.has_failures())
}

async fn run_pipeline(cmd: &RunCommand, config: AppConfig) -> Result<bool> {
    let pipeline = match (&cmd.file, &cmd.pipeline) {
        (Some(file), _) => PipelineConfig::from_file(file)
            .context("Failed to load pipeline config")?
            .to_pipeline(),
        (None, Some(name)) => match config.pipeline(name) {
            Some(pipeline) => pipeline.to_pipeline(),
            None if name == "standard" => Pipeline::standard("standard"),
            None => anyhow::bail!("No pipeline named '{}' in the configuration", name),
        },
        (None, None) => anyhow::bail!("Either --pipeline or --file is required"),
    };
    let repositories = resolve_repositories(&cmd.paths, &config)?;

    if !cmd.json {
        println!("{} Running pipeline {}", INFO, style(&pipeline.name).bold());
    }

    let executor = PipelineExecutor::with_defaults(build_engine(config));
    let cancel = cancel_on_interrupt();
    let result = executor
        .execute_pipeline(&cancel, &pipeline, &repositories)
        .await
        .context("Pipeline is invalid")?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", format_pipeline(&result));
        if let Some(report) = result
            .step("report")
            .and_then(|s| s.output.get("report"))
            .and_then(|r| r.as_str())
        {
            println!("\n{}", report);
        }
    }

    if result.status != ExecutionStatus::Completed {
        error!("Pipeline '{}' ended {:?}", result.pipeline_name, result.status);
        return Ok(false);
    }
    if !result.is_success() {
        error!(
            "Pipeline '{}' completed with {} failed and {} blocked steps",
            result.pipeline_name,
            result.failed_steps().len(),
            result.blocked_steps().len()
        );
        return Ok(false);
    }
    Ok(result
        .workflow_result
        .as_ref()
        .map_or(true, |w| !w.has_failures()))
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<bool> {
    println!("{} Validating pipeline...", INFO);

    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            let executor = PipelineExecutor::with_defaults(build_engine(AppConfig::default()));
            if let Err(e) = executor.validate_pipeline(&config.to_pipeline()) {
                println!("{} Validation failed:", CROSS);
                println!("  {}", style(e).red());
                return Ok(false);
            }

            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Steps: {}", style(config.steps.len()).cyan());

            if cmd.json {
                println!("\n{}", serde_json::to_string_pretty(&config)?);
            }
            Ok(true)
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            Ok(false)
        }
    }
}

fn list(cmd: &ListCommand, config: &AppConfig) -> Result<bool> {
    let registry = Registry::with_builtin_checkers();
    let checkers = registry.checkers.get_all();

    if cmd.json {
        let data = serde_json::json!({
            "checkers": checkers
                .iter()
                .map(|c| serde_json::json!({ "id": c.id(), "name": c.name(), "category": c.category() }))
                .collect::<Vec<_>>(),
            "step_types": ["validation", "analysis", "checkers", "reporting"],
            "pipelines": config.pipelines.iter().map(|p| &p.name).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(true);
    }

    println!("{} Checkers:", INFO);
    for checker in &checkers {
        println!(
            "  {} {} {}",
            style(checker.id()).bold(),
            checker.name(),
            style(format!("({})", checker.category())).dim()
        );
    }

    println!("{} Step types: validation, analysis, checkers, reporting", INFO);

    println!("{} Pipelines:", INFO);
    println!("  {} {}", style("standard").bold(), style("(built-in)").dim());
    for pipeline in &config.pipelines {
        println!(
            "  {} {}",
            style(&pipeline.name).bold(),
            style(pipeline.description.as_deref().unwrap_or("")).dim()
        );
    }

    Ok(true)
}
