//! Slipway - one-command macOS app release pipeline

mod cli;
mod pipeline;
mod report;

use clap::Parser;
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use slipway_core::{preflight, ReleaseError, RunContext, SentryTarget};

use cli::Cli;
use pipeline::ReleasePipeline;

#[tokio::main]
async fn main() {
    let _guard = init_tracing();
    let cli = Cli::parse();
    let code = run(cli).await;
    std::process::exit(code);
}

async fn run(cli: Cli) -> i32 {
    let config = match slipway_core::load_config(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{} {err}", style("✗").red());
            return 1;
        }
    };
    let env = match preflight::validate_env() {
        Ok(env) => env,
        Err(err) => {
            eprintln!("{} {err}", style("✗").red());
            return 1;
        }
    };
    if let Err(err) = std::fs::create_dir_all(&cli.archive_dir) {
        eprintln!(
            "{} Could not create archive directory {}: {err}",
            style("✗").red(),
            cli.archive_dir.display()
        );
        return 1;
    }

    let sentry = match (cli.sentry_org, cli.sentry_project) {
        (Some(org), Some(project)) => Some(SentryTarget { org, project }),
        _ => None,
    };
    let ctx = RunContext {
        config,
        env,
        increment: cli.increment,
        archive_dir: cli.archive_dir,
        skip_sparkle: cli.skip_sparkle,
        sentry,
        verbose: cli.verbose,
        quiet: cli.quiet,
        debug: cli.debug,
        assume_yes: cli.yes,
    };
    report::banner(&ctx);

    let mut pipeline = ReleasePipeline::new(ctx);
    // Ctrl-C abandons the running phase and falls through to the same
    // failure policy as any other fatal error.
    let result = tokio::select! {
        result = pipeline.run() => result,
        _ = tokio::signal::ctrl_c() => Err(anyhow::Error::new(ReleaseError::Interrupted)),
    };

    match result {
        Ok(()) => 0,
        Err(err) => {
            pipeline.handle_failure(&err);
            1
        }
    }
}

/// Set up tracing with two layers:
/// - Console: controlled by RUST_LOG (default: warn)
/// - File: always debug-level JSON to ~/.slipway/logs/
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if let Some(log_dir) = log_directory() {
        let file_appender = tracing_appender::rolling::daily(&log_dir, "slipway.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_filter(console_filter),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_target(true)
                    .with_filter(EnvFilter::new("debug")),
            )
            .init();

        return Some(guard);
    }

    // Fallback: console only
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_filter(console_filter),
        )
        .init();

    None
}

/// Returns the log directory path, creating it if needed.
fn log_directory() -> Option<std::path::PathBuf> {
    let log_dir = dirs::home_dir()?.join(".slipway").join("logs");
    std::fs::create_dir_all(&log_dir).ok()?;
    Some(log_dir)
}
