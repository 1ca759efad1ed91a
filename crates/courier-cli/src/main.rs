//! Courier CLI - command-line access to the admin API
//!
//! Probes the backend, calls catalog endpoints through the resilient
//! request pipeline (timeouts, retry, token refresh) and shows the
//! configuration those calls resolve to.

mod cli;
mod config;
mod error;
mod handlers;
mod logging;
mod output;

use cli::{Cli, Commands};
use colored::control;
use config::Config;
use error::Result;
use logging::{timing::Timer, LoggingConfig};
use output::OutputWriter;
use std::process;
use tracing::instrument;

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let cli = Cli::parse_args();

    control::set_override(cli.use_color());

    if let Err(e) = init_logging(&cli) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli).await {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("{}", error::format_error(&e, control::SHOULD_COLORIZE.should_colorize()));

            if e.should_show_help() {
                eprintln!("\nFor more information, try '--help'");
            }

            process::exit(e.exit_code());
        }
    }
}

/// Main application logic
#[instrument(skip(cli), fields(command = ?cli.command))]
async fn run(cli: Cli) -> Result<()> {
    let _timer = Timer::new("cli_execution");

    // .env first so the layers below can see it
    dotenv::dotenv().ok();

    let config = {
        let _config_timer = Timer::new("config_loading");
        let mut config = Config::load_with_file(cli.config.as_deref())?;
        config.apply_env(|key| std::env::var(key).ok());
        config.apply_flags(cli.base_url.clone(), cli.environment.clone());
        config
    };

    let mut output = OutputWriter::new(cli.output, cli.use_color(), cli.quiet);

    tracing::info!(
        command = ?cli.command,
        verbosity = cli.verbosity_level(),
        "Executing command"
    );

    match cli.command {
        Commands::Health => handlers::handle_health(&config, &mut output).await,
        Commands::Call(args) => handlers::handle_call(args, &config, &mut output).await,
        Commands::Endpoints(args) => handlers::handle_endpoints(args, &mut output).await,
        Commands::Config(args) => handlers::handle_config(args, &config, &mut output).await,
    }
}

/// Initialize the logging system
fn init_logging(cli: &Cli) -> Result<()> {
    let mut logging_config = LoggingConfig::from_verbosity(cli.verbosity_level());
    logging_config.merge_with_env();

    // Quiet mode only logs errors
    if cli.quiet {
        logging_config.level = "error".to_string();
        logging_config.console = false;
    }

    logging::init_logging(logging_config)
}
