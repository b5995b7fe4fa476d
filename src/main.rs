mod cli;
mod host;

use std::time::Duration;

use clap::Parser;
use cli::{Cli, Command};
use dragout::App;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    // Lifecycle hooks run here, on the main thread.
    let app = App::new(&cli.service_config());

    match cli.command {
        Command::Drag { path, hold_secs } => {
            if let Err(e) = host::run_drag(&app, &path, Duration::from_secs(hold_secs)).await {
                tracing::error!(error = %e, "drag failed");
                eprintln!("dragout drag: {e}");
                std::process::exit(1);
            }
        }
        Command::Serve => {
            if let Err(e) = host::serve(&app).await {
                tracing::error!(error = %e, "serve failed");
                eprintln!("dragout serve: {e}");
                std::process::exit(1);
            }
        }
        Command::Check => {
            if let Err(e) = host::check(&app) {
                eprintln!("dragout check: {e}");
                std::process::exit(1);
            }
        }
    }
}
