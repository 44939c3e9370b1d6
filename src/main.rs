use anyhow::Result;
use clap::Parser;
use meetbots::{
    app,
    cli::{
        handle_add_command, handle_adjust_command, handle_status_command, Cli, CliCommand,
        FleetClient,
    },
    config::Config,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let command = match cli.command {
        None | Some(CliCommand::Serve) => return app::run_service().await,
        Some(CliCommand::Version) => {
            println!("meetbots {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some(command) => command,
    };

    let base_url = match cli.url {
        Some(url) => url,
        None => Config::load()?.server.base_url(),
    };
    let client = FleetClient::new(&base_url);

    match command {
        CliCommand::Status(args) => handle_status_command(&client, args).await,
        CliCommand::Add(args) => handle_add_command(&client, args).await,
        CliCommand::Adjust(args) => handle_adjust_command(&client, args).await,
        CliCommand::Serve | CliCommand::Version => Ok(()),
    }
}
