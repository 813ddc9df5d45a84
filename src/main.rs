//! bridge-audit CLI entry point.

use clap::Parser;

use bridge_audit::cli::{commands, handle_error, load_config, Cli, Commands};
use bridge_audit::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => handle_error(err, json),
    };

    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, json),
    };

    let result = match cli.command {
        Commands::Coordinator(args) => {
            commands::coordinator::execute(args, config, cli.config, json).await
        }
        Commands::Worker(args) => commands::worker::execute(args, config, json).await,
        Commands::Enqueue(args) => commands::enqueue::execute(args, config, json).await,
        Commands::Promote(args) => commands::promote::execute(args, config, json).await,
        Commands::Status => commands::status::execute(config, json).await,
        Commands::Outcomes(args) => commands::outcomes::execute(args, config, json).await,
    };

    if let Err(err) = result {
        handle_error(err, json);
    }
}
