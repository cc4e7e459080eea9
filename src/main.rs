//! IacMap CLI entry point.
//!
//! This binary provides the command-line interface for IacMap.

use clap::Parser;
use iacmap::cli::{Cli, Commands, InputArgs};
use iacmap::{Config, IacMapError, Pipeline, PipelineOutput};
use std::error::Error;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_CONFIG_PATHS: [&str; 3] = ["iacmap.yaml", "iacmap.yml", ".iacmap.yaml"];

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            eprintln!("Error: {e}");

            let mut source = e.source();
            if source.is_some() {
                eprintln!("\nCaused by:");
                let mut i = 0;
                while let Some(cause) = source {
                    eprintln!("  {i}: {cause}");
                    source = cause.source();
                    i += 1;
                }
            }

            let backtrace = e.backtrace();
            if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
                eprintln!("\nStack backtrace:\n{backtrace}");
            }

            let code = e
                .downcast_ref::<IacMapError>()
                .map_or(1, IacMapError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        // RUST_LOG wins over the verbose flag
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = match verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            };
            EnvFilter::new(format!("warn,iacmap={level}"))
        })
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    tracing::debug!("Loading configuration");
    let mut config = load_config(&cli)?;
    if cli.verbose > 0 {
        config.output.verbose = true;
    }
    tracing::debug!("Configuration loaded successfully");

    match cli.command {
        Commands::Graph(args) => {
            if let Some(direction) = args.direction {
                config.layout.direction = direction;
            }
            if let Some(view) = args.cluster_view {
                config.output.cluster_view = view;
            }
            let output = run_pipeline(&mut config, &args.input).await?;

            let graph_output = iacmap::graph::export_graph(&output.graph, args.format, config.output.cluster_view)?;
            write_output(args.output.as_deref(), &graph_output, "Graph written")?;

            for diagnostic in &output.diagnostics {
                tracing::warn!(kind = diagnostic.kind(), "{diagnostic}");
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Report(args) => {
            let output = run_pipeline(&mut config, &args.input).await?;

            let report = output.generate_report(args.format, &config)?;
            write_output(args.output.as_deref(), &report, "Report written")?;

            if args.strict && output.has_diagnostics() {
                tracing::debug!(diagnostics = output.diagnostics.len(), "Strict mode: diagnostics present");
                return Ok(ExitCode::from(1));
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Init => {
            let config_path = Path::new(DEFAULT_CONFIG_PATHS[0]);
            if config_path.exists() {
                anyhow::bail!("Configuration file already exists: {}", config_path.display());
            }

            std::fs::write(config_path, Config::example_yaml())?;
            println!("Created example configuration: {}", config_path.display());
            Ok(ExitCode::SUCCESS)
        }

        Commands::Validate(args) => {
            let content = std::fs::read_to_string(&args.config)?;
            match Config::from_yaml(&content) {
                Ok(_) => {
                    println!("Configuration is valid: {}", args.config.display());
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("Configuration error: {e}");
                    Ok(ExitCode::from(1))
                }
            }
        }
    }
}

async fn run_pipeline(config: &mut Config, input: &InputArgs) -> anyhow::Result<PipelineOutput> {
    config.merge_cli_args(input);
    config.validate()?;

    let pipeline = Pipeline::new(config.clone());
    Ok(pipeline.run_paths(&input.paths).await?)
}

fn write_output(path: Option<&Path>, content: &str, message: &str) -> anyhow::Result<()> {
    if let Some(path) = path {
        std::fs::write(path, content)?;
        tracing::info!(path = %path.display(), "{message}");
    } else {
        println!("{content}");
    }
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    if let Some(ref config_path) = cli.config {
        tracing::debug!(path = %config_path.display(), "Loading configuration from explicit path");
        let content = std::fs::read_to_string(config_path)?;
        return Ok(Config::from_yaml(&content)?);
    }

    tracing::debug!("Searching for default configuration files");
    for path in DEFAULT_CONFIG_PATHS {
        if Path::new(path).exists() {
            tracing::debug!(path = %path, "Found configuration file");
            let content = std::fs::read_to_string(path)?;
            return Ok(Config::from_yaml(&content)?);
        }
    }

    tracing::debug!("No configuration file found, using default configuration");
    Ok(Config::default())
}
