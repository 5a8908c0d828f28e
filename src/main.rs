mod assignment;
mod auth;
mod cli;
mod client;
mod commands;
mod config;
mod error;
mod filter;
mod ids;
mod logging;
mod output;
mod profile;
mod reports;
mod store;
mod timeline;
mod types;

use std::io;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use clap_complete::generate;

use auth::{Auth, SharedAuth, TokenSource};
use cli::{Cli, Commands, IssueCommands, WorkerCommands};
use client::FirebaseClient;
use config::Config;
use error::{CivicError, ErrorKind, Result};
use std::error::Error;
use store::DataStore;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        if e.kind() == ErrorKind::Remote {
            tracing::error!("{e}");
        }
        eprintln!("Error: {e}");

        // Show error chain if verbose flag was passed
        if std::env::args().any(|arg| arg == "--verbose" || arg == "-v") {
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("Caused by: {cause}");
                source = std::error::Error::source(cause);
            }
        }

        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose);
    output::set_format(cli.output_format());
    output::set_quiet(cli.quiet);

    match cli.command {
        // Commands that don't require config/session
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "civic", &mut io::stdout());
        }
        Commands::Init => {
            commands::init::run()?;
        }
        command => {
            let config = Config::load()?;
            let mut auth = Auth::new(config.api_key()?, Config::session_path()?);

            match command {
                Commands::Login { email } => {
                    commands::auth::login(&mut auth, &config, email).await?;
                }
                Commands::Logout => {
                    commands::auth::logout(&mut auth)?;
                }
                Commands::Whoami => {
                    commands::auth::whoami(&auth)?;
                }
                // Commands that require a signed-in database client
                command => {
                    auth.id_token().await?;
                    let mut auth_state = auth.subscribe();
                    let tokens: Arc<dyn TokenSource> = Arc::new(SharedAuth::new(auth));
                    let store = FirebaseClient::new(&config.database_url()?, Some(tokens))?;
                    tokio::select! {
                        result = dispatch(&store, &config, command) => result?,
                        _ = auth::signed_out(&mut auth_state) => return Err(CivicError::NotSignedIn),
                    }
                }
            }
        }
    }

    Ok(())
}

async fn dispatch(store: &dyn DataStore, config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Issues(args) => {
            commands::issues::list(store, args).await?;
        }
        Commands::Issue { action } => match action {
            IssueCommands::Show { id, watch } => {
                commands::issues::show(store, &id, watch).await?;
            }
            IssueCommands::Assign { id, worker } => {
                commands::issues::assign(store, &id, &worker).await?;
            }
            IssueCommands::Status { id, status } => {
                commands::issues::status(store, &id, &status).await?;
            }
        },
        Commands::Workers(args) => {
            commands::workers::list(store, args).await?;
        }
        Commands::Worker { action } => match action {
            WorkerCommands::Show { id } => {
                commands::workers::show(store, &id).await?;
            }
            WorkerCommands::Create(args) => {
                commands::workers::create(store, config, args).await?;
            }
        },
        Commands::Dashboard { watch } => {
            commands::dashboard::run(store, watch).await?;
        }
        Commands::Report(args) => {
            commands::report::run(store, args).await?;
        }
        Commands::Completions { .. }
        | Commands::Init
        | Commands::Login { .. }
        | Commands::Logout
        | Commands::Whoami => {
            // Already handled in run()
        }
    }
    Ok(())
}
