// Entrypoint for the CLI application.
// - Keeps `main` small: parse flags, set up logging, log in, run the menu.
// - The access token is revoked on the way out unless `--keep-token` is set.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use venmo_cli::api::ApiClient;
use venmo_cli::config::{Cli, Config};
use venmo_cli::ui::{login, main_menu};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = Config::from_cli(&cli);
    let mut api = ApiClient::new(&config).context("Failed to build HTTP client")?;

    if !login(&mut api, &config.auth_file)? {
        return Ok(());
    }

    // Run the menu, then revoke the token even if the menu failed.
    let run_result = main_menu(&api);
    if config.revoke_on_exit {
        match api.logout() {
            Ok(()) => println!("Successfully revoked the active token."),
            Err(e) => tracing::warn!(error = %e, "failed to revoke access token"),
        }
    }
    run_result
}
