pub mod commands;
pub mod context;
pub mod logging;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;
use uuid::Uuid;

/// Protect and unprotect strings with purpose-bound keys.
#[derive(Parser, Debug)]
#[command(
    name = "data-protector",
    version,
    about,
    long_about = None,
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Operation mode: E to protect, D to unprotect
    pub mode: Option<String>,

    /// Namespace (purpose) the data is bound to
    pub namespace: Option<String>,

    /// Plaintext to protect or payload to unprotect
    #[arg(allow_hyphen_values = true)]
    pub input: Option<String>,

    /// Pass `true` to silence the banner
    pub silence: Option<String>,

    /// Path to alternative config file
    #[arg(long, global = true, env = "DP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding key records (overrides KeyOutputLocation)
    #[arg(long, global = true, env = "DP_KEY_LOCATION")]
    pub key_location: Option<PathBuf>,

    /// Application identity (overrides ApplicationName)
    #[arg(long, global = true, env = "DP_APPLICATION_NAME")]
    pub application: Option<String>,

    /// Base64 key used to wrap master keys at rest
    #[arg(long, global = true, env = "DP_KEY_ENCRYPTION_KEY", hide_env_values = true)]
    pub key_encryption_key: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect and manage the key ring
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum KeysAction {
    /// List every key record with its status
    List,
    /// Generate a new active key and retire the current one
    Rotate,
    /// Revoke a key so payloads protected with it are rejected
    Revoke {
        /// Key id as shown by `keys list`
        id: Uuid,
    },
}

/// Operation selected by the mode argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Protect,
    Unprotect,
}

/// A validated positional invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub mode: Mode,
    pub namespace: String,
    pub input: String,
    pub silence: bool,
}

/// Misuse of the positional form. Always reported with exit status 2.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("missing required arguments")]
    MissingArguments,

    #[error("You need to specify {0}!")]
    Empty(&'static str),

    #[error("Unknown operation mode '{0}'. Please provide 'E' or 'D'.")]
    UnknownMode(String),

    #[error("Silence flag must be 'true' or 'false', got '{0}'.")]
    BadSilenceFlag(String),
}

impl Cli {
    /// Validate the positional arguments.
    ///
    /// An empty input is passed through so the protector can reject it
    /// as `EmptyInput`.
    pub fn invocation(&self) -> Result<Invocation, UsageError> {
        let (Some(mode), Some(namespace), Some(input)) =
            (&self.mode, &self.namespace, &self.input)
        else {
            return Err(UsageError::MissingArguments);
        };

        if mode.is_empty() {
            return Err(UsageError::Empty("an operation mode"));
        }
        if namespace.is_empty() {
            return Err(UsageError::Empty("a namespace"));
        }

        let mode = match mode.to_ascii_lowercase().as_str() {
            "e" => Mode::Protect,
            "d" => Mode::Unprotect,
            _ => return Err(UsageError::UnknownMode(mode.clone())),
        };

        let silence = match self.silence.as_deref() {
            None => false,
            Some(flag) if flag.eq_ignore_ascii_case("true") => true,
            Some(flag) if flag.eq_ignore_ascii_case("false") => false,
            Some(flag) => return Err(UsageError::BadSilenceFlag(flag.to_string())),
        };

        Ok(Invocation {
            mode,
            namespace: namespace.clone(),
            input: input.clone(),
            silence,
        })
    }
}
