#![forbid(unsafe_code)]

//! bdu: disk usage and stat views over a backup catalog.

use clap::Parser;
use colored::Colorize;

mod cli_app;

fn main() {
    let args = match cli_app::Cli::try_parse() {
        Ok(args) => args,
        // Help and version go to stdout with status 0; usage errors are user errors.
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };
    if let Err(e) = cli_app::run(&args) {
        eprintln!("{} {e}", "bdu:".red().bold());
        std::process::exit(e.exit_code());
    }
}
