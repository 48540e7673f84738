mod adapters;
mod cli;
mod config;
mod core;

use clap::Parser;

use cli::context::Settings;
use cli::{Cli, Commands, Invocation, Mode, UsageError};

fn main() {
    let args = Cli::parse();
    cli::logging::init(args.verbose);
    let settings = Settings::from_cli(&args);

    let result = match &args.command {
        Some(Commands::Keys { action }) => cli::commands::keys::execute(&settings, action),
        None => match args.invocation() {
            Ok(invocation) => run(&settings, &invocation),
            Err(UsageError::MissingArguments) => {
                cli::output::usage();
                std::process::exit(2);
            }
            Err(e) => {
                cli::output::error(&format!("ERROR: {e}"));
                std::process::exit(2);
            }
        },
    };

    if let Err(e) = result {
        cli::output::error(&format!("Error: {e}"));
        std::process::exit(1);
    }
}

fn run(settings: &Settings, invocation: &Invocation) -> crate::core::errors::Result<()> {
    if !invocation.silence {
        cli::output::banner();
    }

    let provider = cli::commands::provider_helpers::build_provider(settings)?;
    match invocation.mode {
        Mode::Protect => {
            cli::commands::protect::execute(&provider, &invocation.namespace, &invocation.input)
        }
        Mode::Unprotect => {
            cli::commands::unprotect::execute(&provider, &invocation.namespace, &invocation.input)
        }
    }
}
