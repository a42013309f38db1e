use clap::Parser;
use dbackup::commands::{self, Cli};
use dbackup::{logging, sysexits};
use std::process;

/// Entry point for the dbk CLI application.
/// Parses command-line arguments and dispatches to the appropriate command handler.
fn main() {
    let cli = Cli::parse();
    let Some(commands) = cli.commands else {
        eprintln!("dbk requires at least one command to execute. See 'dbk --help' for usage.");
        process::exit(sysexits::EX_KEYWORD);
    };

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
    }

    if let Err(e) = commands::execute(commands, cli.config_file.as_deref()) {
        eprintln!("Error: {e:#}");
        let code = e
            .downcast_ref::<dbackup::Error>()
            .map(sysexits::exit_code)
            .unwrap_or(sysexits::EX_SOFTWARE);
        process::exit(code);
    }
}
