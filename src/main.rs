mod api;
mod cli;
mod commands;
mod display;
mod model;
mod query;
mod session;
mod table;
mod upload;
mod util;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::api::ApiError;
use crate::cli::{Cli, Commands};
use crate::session::NotSignedIn;

const EXIT_FAILURE: i32 = 1;
const EXIT_LOGIN_REQUIRED: i32 = 2;

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }

        if requires_login(&err) {
            error!("sign in again with `contractwise login`");
            std::process::exit(EXIT_LOGIN_REQUIRED);
        }
        std::process::exit(EXIT_FAILURE);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    match cli.command {
        Commands::Signup(args) => runtime.block_on(commands::auth::signup(args)),
        Commands::Login(args) => runtime.block_on(commands::auth::login(args)),
        Commands::Logout(args) => commands::auth::logout(args),
        Commands::Status(args) => commands::status::run(args),
        Commands::Contracts(command) => runtime.block_on(commands::contracts::run(command)),
        Commands::Upload(args) => runtime.block_on(commands::upload::run(args)),
        Commands::Ask(args) => runtime.block_on(commands::ask::run(args)),
    }
}

fn requires_login(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause.is::<NotSignedIn>() || matches!(cause.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized))
    })
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_boundary_is_detected_through_context() {
        let err = Err::<(), _>(NotSignedIn)
            .context("failed to load contracts")
            .expect_err("error");
        assert!(requires_login(&err));

        let err = Err::<(), _>(ApiError::Unauthorized)
            .context("failed to load contracts")
            .expect_err("error");
        assert!(requires_login(&err));

        let err = anyhow::anyhow!("Contract not found (HTTP 404)");
        assert!(!requires_login(&err));
    }
}
