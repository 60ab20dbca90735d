use anyhow::Result;
use clap::Parser;
use meeting_recap::cli::{handle_check_command, handle_run_command, Cli, CliCommand};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        CliCommand::Run(args) => handle_run_command(args).await,
        CliCommand::Check(args) => handle_check_command(args),
        CliCommand::Version => {
            println!("meeting-recap {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
