use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::debug;

use crate::arch::os_version::{FixedOsVersion, OsVersionProvider, SwVersProvider};
use crate::arch::runner::{CommandRunner, SystemCommandRunner};
use crate::arch::tools::{tool_program, Tool};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::shadow::Pbkdf2Overrides;
use crate::user::{UserProvider, UserSpec};

#[derive(Parser, Debug)]
#[command(name = "macuser", version, about = "Manage macOS local users and their password hashes")]
pub struct Cli {
    /// JSON config file. Falls back to $MACUSER_CONFIG.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Treat the host as this macOS version instead of asking sw_vers.
    #[arg(long, global = true, value_name = "VERSION")]
    pub os_version: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// List every local user as JSON.
    List,
    /// Show one user as JSON.
    Show { name: String },
    /// Exit 0 if the user exists, 1 otherwise.
    Exists { name: String },
    /// Create a user.
    Create(CreateArgs),
    /// Delete a user record.
    Delete { name: String },
    /// Print the user's groups, comma-separated.
    Groups { name: String },
    /// Add the user to groups.
    SetGroups {
        name: String,
        /// Comma-separated group names.
        groups: String,
        /// Also remove the user from groups not listed.
        #[arg(long)]
        inclusive: bool,
    },
    /// Print the user's password hash.
    Password {
        name: String,
        /// Print one PBKDF2 field instead: entropy, salt or iterations.
        #[arg(long)]
        field: Option<String>,
    },
    /// Set the user's password hash.
    SetPassword(SetPasswordArgs),
    /// Print the next free uid.
    NextUid {
        #[arg(long)]
        min: Option<u32>,
    },
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct Pbkdf2Args {
    /// PBKDF2 salt as 64 hex characters.
    #[arg(long, value_name = "HEX")]
    pub salt: Option<String>,
    /// PBKDF2 iteration count.
    #[arg(long)]
    pub iterations: Option<u64>,
}

impl Pbkdf2Args {
    fn overrides(&self) -> Result<Pbkdf2Overrides> {
        Pbkdf2Overrides::parse(self.salt.as_deref(), self.iterations)
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct CreateArgs {
    pub name: String,
    #[arg(long)]
    pub uid: Option<u32>,
    #[arg(long)]
    pub gid: Option<u32>,
    /// Full name (RealName).
    #[arg(long)]
    pub comment: Option<String>,
    #[arg(long, value_name = "PATH")]
    pub home: Option<PathBuf>,
    #[arg(long)]
    pub shell: Option<String>,
    /// Password hash in the host's scheme.
    #[arg(long, value_name = "HEX")]
    pub password: Option<String>,
    /// Comma-separated group names.
    #[arg(long)]
    pub groups: Option<String>,
    #[command(flatten)]
    pub pbkdf2: Pbkdf2Args,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SetPasswordArgs {
    pub name: String,
    /// Hex hash. Read from stdin when omitted, which keeps it out of `ps`.
    pub hash: Option<String>,
    #[command(flatten)]
    pub pbkdf2: Pbkdf2Args,
}

/// Wire the real collaborators from config and run one command.
pub fn dispatch(cli: Cli, out: &mut dyn Write) -> Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(version) = cli.os_version {
        config.os_version = Some(version);
    }
    debug!(?config, "effective config");

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner::new());
    let os_version = version_provider(&config, runner.clone())?;
    let provider = UserProvider::from_config(runner, os_version, config)?;

    let stdin = io::stdin();
    let positive = execute(&provider, cli.command, &mut stdin.lock(), out)?;
    Ok(if positive {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn version_provider(
    config: &Config,
    runner: Arc<dyn CommandRunner>,
) -> Result<Box<dyn OsVersionProvider>> {
    Ok(match config.pinned_os_version()? {
        Some(version) => Box::new(FixedOsVersion(version)),
        None => Box::new(SwVersProvider::new(
            runner,
            tool_program(Tool::SwVers, config.sw_vers.as_deref()),
        )),
    })
}

/// Run one command against `provider`.
///
/// `Ok(false)` is a negative answer (no such user, no stored hash) rather than a
/// failure; the binary exits 1 for it.
pub fn execute(
    provider: &UserProvider,
    command: Command,
    stdin: &mut dyn BufRead,
    out: &mut dyn Write,
) -> Result<bool> {
    match command {
        Command::List => {
            let users = provider.instances()?;
            writeln!(out, "{}", serde_json::to_string_pretty(&users)?)?;
        }
        Command::Show { name } => match provider.find(&name)? {
            Some(user) => writeln!(out, "{}", serde_json::to_string_pretty(&user)?)?,
            None => return Err(Error::Validation(format!("no such user: {name}"))),
        },
        Command::Exists { name } => {
            let exists = provider.exists(&name);
            writeln!(out, "{exists}")?;
            return Ok(exists);
        }
        Command::Create(args) => {
            let spec = UserSpec {
                name: args.name,
                uid: args.uid,
                gid: args.gid,
                comment: args.comment,
                home: args.home,
                shell: args.shell,
                password: args.password,
                password_overrides: args.pbkdf2.overrides()?,
                groups: args.groups,
            };
            provider.create(&spec)?;
        }
        Command::Delete { name } => provider.delete(&name)?,
        Command::Groups { name } => writeln!(out, "{}", provider.groups(&name)?)?,
        Command::SetGroups {
            name,
            groups,
            inclusive,
        } => provider.set_groups(&name, &groups, inclusive)?,
        Command::Password { name, field } => {
            let value = match field {
                Some(field) => provider
                    .password_field(&name, &field)?
                    .map(|v| v.to_string()),
                None => provider.password(&name)?,
            };
            match value {
                Some(value) => writeln!(out, "{value}")?,
                None => return Ok(false),
            }
        }
        Command::SetPassword(args) => {
            let overrides = args.pbkdf2.overrides()?;
            let hash = match args.hash {
                Some(hash) => hash,
                None => read_hash(stdin)?,
            };
            provider.set_password(&args.name, hash.trim(), &overrides)?;
        }
        Command::NextUid { min } => {
            let min = min.unwrap_or(provider.config().defaults.min_uid);
            writeln!(out, "{}", provider.next_system_id(min)?)?;
        }
    }
    Ok(true)
}

fn read_hash(stdin: &mut dyn BufRead) -> Result<String> {
    let mut line = String::new();
    stdin.read_line(&mut line)?;
    let hash = line.trim().to_string();
    if hash.is_empty() {
        return Err(Error::Validation(
            "no password hash given on the command line or stdin".to_string(),
        ));
    }
    Ok(hash)
}
