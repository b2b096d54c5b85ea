use std::io;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

mod cli;
mod commands;
mod logging;

use cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging_with_level(&cli.log_level);

    let mut stdout = io::stdout().lock();
    match commands::run(cli, &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}
