//! Command-line interface for storefront-auth.
//!
//! Uses lexopt for minimal binary size overhead (~34KB).

use std::ffi::OsString;
use std::path::PathBuf;

use crate::session::{Session, User};

/// What the binary should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    /// Print the persisted session.
    #[default]
    Status,
    /// Sign in and persist the session.
    Login,
    /// Clear the persisted session.
    Logout,
    /// List users (admin).
    Users,
    /// Create a user with the `user` role (admin).
    AddUser,
    /// Change the signed-in user's password.
    ChangePassword,
}

impl Command {
    /// Check if the command is reserved for admins.
    pub fn needs_admin(self) -> bool {
        matches!(self, Self::Users | Self::AddUser)
    }
}

impl std::str::FromStr for Command {
    type Err = ArgsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "status" => Ok(Self::Status),
            "login" => Ok(Self::Login),
            "logout" => Ok(Self::Logout),
            "users" => Ok(Self::Users),
            "add-user" => Ok(Self::AddUser),
            "change-password" => Ok(Self::ChangePassword),
            _ => Err(ArgsError::UnexpectedArgument(s.to_string())),
        }
    }
}

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Subcommand to run.
    pub command: Command,
    /// Login email.
    pub email: Option<String>,
    /// Login password, new user's password, or current password.
    pub password: Option<String>,
    /// Name of the user to add.
    pub name: Option<String>,
    /// Replacement password.
    pub new_password: Option<String>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Authentication endpoint (overrides config file).
    pub endpoint: Option<String>,
    /// Storage directory (overrides config file).
    pub storage_dir: Option<PathBuf>,
    /// Use the demo exchange.
    pub demo: bool,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut command_seen = false;
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('e') | Long("email") => {
                result.email = Some(parser.value()?.parse()?);
            }
            Short('P') | Long("password") => {
                result.password = Some(parser.value()?.parse()?);
            }
            Short('n') | Long("name") => {
                result.name = Some(parser.value()?.parse()?);
            }
            Long("new-password") => {
                result.new_password = Some(parser.value()?.parse()?);
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('u') | Long("endpoint") => {
                result.endpoint = Some(parser.value()?.parse()?);
            }
            Short('d') | Long("storage-dir") => {
                result.storage_dir = Some(parser.value()?.parse()?);
            }
            Long("demo") => {
                result.demo = true;
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) if !command_seen => {
                let name = val.to_string_lossy();
                result.command = name.parse()?;
                command_seen = true;
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    if !result.help {
        match result.command {
            Command::Login | Command::AddUser if result.email.is_none() => {
                return Err(ArgsError::MissingValue("email"));
            }
            Command::AddUser if result.name.is_none() => {
                return Err(ArgsError::MissingValue("name"));
            }
            _ => {}
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"storefront-auth {version}
Storefront session client: sign in, sign out, inspect the stored session

USAGE:
    storefront-auth [OPTIONS] [COMMAND]

COMMANDS:
    status                  Show the stored session [default]
    login                   Sign in and store the session
    logout                  Clear the stored session
    users                   List users (admin)
    add-user                Add a user with the user role (admin)
    change-password         Change the signed-in user's password

OPTIONS:
    -e, --email <EMAIL>     Email (required for login and add-user)
    -P, --password <PASS>   Password (login, add-user, current for change-password)
    -n, --name <NAME>       Name of the user to add
        --new-password <P>  New password for change-password
    -c, --config <FILE>     Path to configuration file (JSON)
    -u, --endpoint <URL>    Authentication endpoint
    -d, --storage-dir <DIR> Directory holding the stored session
        --demo              Accept any credentials as the demo admin
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    STOREFRONT_AUTH_MODE         Exchange mode: http or demo
    STOREFRONT_AUTH_ENDPOINT     Authentication endpoint (overrides config)
    STOREFRONT_AUTH_STORAGE_DIR  Storage directory (overrides config)
    STOREFRONT_AUTH_PASSWORD     Password when --password is absent
    STOREFRONT_AUTH_NEW_PASSWORD New password when --new-password is absent
    STOREFRONT_AUTH_LOG_LEVEL    Log level (overrides config)
    RUST_LOG                     Alternative log level setting

EXAMPLES:
    # Sign in against a local backend
    storefront-auth login -e you@company.com -P secret

    # Try the flow without a backend
    storefront-auth --demo login -e you@company.com -P x

    # Show who is signed in
    storefront-auth status

    # Add a shop user as an admin
    storefront-auth add-user -n Jane -e jane@company.com -P secret
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("storefront-auth {}", env!("CARGO_PKG_VERSION"));
}

/// Render a session for the terminal. The token is shortened.
pub fn describe_session(session: &Session) -> String {
    let mut out = format!("status: {}\n", session.status);

    match session.user {
        Some(ref user) => {
            out.push_str(&format!("user:   {} <{}>\n", user.name, user.email));
            out.push_str(&format!(
                "role:   {}{}\n",
                user.role,
                if user.is_admin() { " (admin panel)" } else { "" }
            ));
        }
        None => out.push_str("user:   (none)\n"),
    }

    if let Some(ref token) = session.token {
        out.push_str(&format!("token:  {}\n", mask_token(token)));
    }

    if let Some(ref error) = session.error {
        out.push_str(&format!("error:  {}\n", error));
    }

    out
}

/// Tokens shorter than this are hidden entirely.
const MIN_PREFIXED_TOKEN: usize = 12;

/// Render a user list, one `name (email) - role` line each.
pub fn describe_users(users: &[User]) -> String {
    if users.is_empty() {
        return "No users found.\n".to_string();
    }

    users
        .iter()
        .map(|u| format!("{} ({}) - {}\n", u.name, u.email, u.role))
        .collect()
}

fn mask_token(token: &str) -> String {
    if token.chars().count() < MIN_PREFIXED_TOKEN {
        return "****".to_string();
    }
    let visible: String = token.chars().take(4).collect();
    format!("{visible}****")
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Required option not given.
    MissingValue(&'static str),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::MissingValue(name) => write!(f, "missing required option --{}", name),
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
