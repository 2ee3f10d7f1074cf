use anyhow::Result;
use clap::Parser;
use oscan::cli::{self, Cli};
use oscan::output;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_from(cli::expand_help_keyword(std::env::args_os()));
    init_logging(&cli);

    tokio::select! {
        result = cli.execute() => {
            if let Err(e) = result {
                output::print_error(&e.to_string());
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            // Dropping the scan future aborts in-flight probes
            output::print_warning("Interrupted");
            std::process::exit(130);
        }
    }

    Ok(())
}

/// Log to stderr so results on stdout stay machine-readable.
fn init_logging(cli: &Cli) {
    let default_level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("oscan={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
