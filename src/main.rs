use clap::Parser;

use hotbackup::cli::{execute, Cli};
use hotbackup::logging::init_logging;

fn main() {
    init_logging();
    let cli = Cli::parse();
    std::process::exit(execute(cli));
}
