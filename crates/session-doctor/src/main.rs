//! Session Doctor - inspect and repair the local authentication session.

mod app;
mod commands;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use session_config_and_utils::{init_logging, parse_level, Config, Paths};

use crate::app::SessionApp;

/// Session Doctor command-line interface.
#[derive(Parser)]
#[command(name = "session-doctor")]
#[command(about = "Inspect, reconcile and recover the local auth session")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config, cache and logs. Defaults to ~/.session-doctor
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OauthProvider {
    Google,
    Github,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the session as the three sources see it (no network)
    Status,
    /// Sign in with email and password (the password is prompted for)
    SignIn {
        #[arg(long)]
        email: String,
    },
    /// Sign out remotely and clear local state
    SignOut,
    /// Reconcile and repair, retrying up to the configured budget
    Repair,
    /// Wipe the local cache and transition markers
    Clear,
    /// Continue as a local-only guest
    Guest,
    /// Begin a redirect sign-in and print the URL to open
    OauthStart {
        #[arg(long, value_enum)]
        provider: OauthProvider,
    },
    /// Finish a redirect sign-in from the callback URL
    OauthFinish {
        /// The full callback URL, including the #fragment
        callback_url: String,
    },
    /// Run the background checker and print every session change
    Watch,
    /// Write the current configuration to config.json for editing
    ConfigInit {
        /// Overwrite an existing config.json
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let level = parse_level(level).as_str().to_ascii_lowercase();
    init_logging(&level, Some(paths.log_file()));

    let app = SessionApp::open(&paths, config)?;

    let succeeded = match cli.command {
        Commands::Status => commands::status::run(&app),
        Commands::SignIn { email } => {
            let password =
                commands::auth::read_password(|| rpassword::prompt_password("Password: "))?;
            commands::auth::sign_in(&app, &email, &password).await
        }
        Commands::SignOut => commands::auth::sign_out(&app).await,
        Commands::Repair => commands::recovery::repair(&app).await,
        Commands::Clear => commands::recovery::clear(&app).await,
        Commands::Guest => commands::recovery::guest(&app).await,
        Commands::OauthStart { provider } => {
            let provider = match provider {
                OauthProvider::Google => auth_reconciler::Provider::OauthGoogle,
                OauthProvider::Github => auth_reconciler::Provider::OauthGithub,
            };
            commands::auth::oauth_start(&app, provider)?
        }
        Commands::OauthFinish { callback_url } => {
            commands::auth::oauth_finish(&app, &callback_url).await
        }
        Commands::Watch => commands::watch::run(&app).await?,
        Commands::ConfigInit { force } => commands::config::init(&paths, &app.config, force)?,
    };

    Ok(exit_code(succeeded))
}

fn exit_code(succeeded: bool) -> ExitCode {
    if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
