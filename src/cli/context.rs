use std::path::PathBuf;

use crate::cli::Cli;

/// Global options shared by every command, resolved once from the
/// command line and environment.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub config: Option<PathBuf>,
    pub key_location: Option<PathBuf>,
    pub application: Option<String>,
    pub key_encryption_key: Option<String>,
}

impl Settings {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            config: cli.config.clone(),
            key_location: cli.key_location.clone(),
            application: cli.application.clone(),
            key_encryption_key: cli.key_encryption_key.clone(),
        }
    }
}
