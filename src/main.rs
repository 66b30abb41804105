use btlens::cli::{init_logging, run, Cli};
use clap::Parser;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);
    run(cli)
}
