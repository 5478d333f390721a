//! storefront-auth binary entry point.

use std::process::ExitCode;

use storefront_auth::cli::{self, Args, Command};
use storefront_auth::config::Config;
use storefront_auth::{logging, ExchangeError, LoginOutcome, SessionContainer};
use tracing::{error, info};

/// Password from `--password`, else `STOREFRONT_AUTH_PASSWORD`.
fn password(args: &Args) -> Option<String> {
    args.password
        .clone()
        .or_else(|| std::env::var("STOREFRONT_AUTH_PASSWORD").ok())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Run with --help for usage.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }

    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };

    logging::init_with_filter(config.log_filter()).ok();

    let container = match config.build_container() {
        Ok(container) => container,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match args.command {
        Command::Status => {
            print!("{}", cli::describe_session(&container.snapshot()));
            ExitCode::SUCCESS
        }
        Command::Logout => {
            container.logout();
            info!("signed out");
            print!("{}", cli::describe_session(&container.snapshot()));
            ExitCode::SUCCESS
        }
        Command::Login => {
            let email = args.email.clone().unwrap_or_default();
            let password = password(&args).unwrap_or_default();

            let outcome = container.login(email, password).await;
            print!("{}", cli::describe_session(&container.snapshot()));

            match outcome {
                LoginOutcome::Succeeded(_) => ExitCode::SUCCESS,
                LoginOutcome::Failed(e) => {
                    error!(kind = e.kind(), "login failed: {}", e);
                    ExitCode::FAILURE
                }
                LoginOutcome::InFlight | LoginOutcome::Superseded => ExitCode::FAILURE,
            }
        }
        Command::Users | Command::AddUser | Command::ChangePassword => {
            match run_account(&args, &config, &container).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!(kind = e.kind(), "{:?} failed: {}", args.command, e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

/// Run an account command with the stored session's token.
async fn run_account(
    args: &Args,
    config: &Config,
    container: &SessionContainer,
) -> Result<(), ExchangeError> {
    let session = container.snapshot();
    let (Some(user), Some(token)) = (session.user, session.token) else {
        return Err(ExchangeError::Rejected(
            "not signed in; run `storefront-auth login` first".into(),
        ));
    };
    if args.command.needs_admin() && !user.is_admin() {
        return Err(ExchangeError::Rejected(format!(
            "{} is not an admin",
            user.email
        )));
    }

    let client = config
        .build_account()
        .map_err(|e| ExchangeError::Transport(e.to_string()))?;

    match args.command {
        Command::Users => {
            let users = client.list_users(&token).await?;
            print!("{}", cli::describe_users(&users));
        }
        Command::AddUser => {
            let name = args.name.as_deref().unwrap_or_default();
            let email = args.email.as_deref().unwrap_or_default();
            let password = password(args).unwrap_or_default();
            client.add_user(&token, name, email, &password).await?;
            println!("Added");
        }
        Command::ChangePassword => {
            let old = password(args).unwrap_or_default();
            let new = args
                .new_password
                .clone()
                .or_else(|| std::env::var("STOREFRONT_AUTH_NEW_PASSWORD").ok())
                .ok_or_else(|| ExchangeError::Rejected("missing --new-password".into()))?;
            client.change_password(&token, &old, &new).await?;
            println!("Password changed");
        }
        Command::Status | Command::Login | Command::Logout => {}
    }

    Ok(())
}
