use clap::Parser;
use zuri::cli::commands::Cli;
use zuri::cli::handlers;

fn main() {
    let cli = Cli::parse();
    zuri::logging::init(cli.verbose);

    if let Err(e) = handlers::dispatch(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
