use clap::Parser;
use taskmaster::cli::commands::Cli;
use taskmaster::cli::handlers;
use tracing_subscriber::EnvFilter;

fn main() {
    // Warnings (e.g. storage failures) go to stderr; RUST_LOG overrides.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = handlers::dispatch(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
