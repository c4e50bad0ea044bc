//! amplitude-extract command-line entry point

use amplitude_extract::cli::Cli;
use amplitude_extract::pipeline::with_thousands;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Initialize tracing with an env filter and optional JSON output (`LOG_FORMAT=json`)
fn init_tracing(verbose: bool) {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("amplitude_extract={default_level}")));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.into_config() {
        Ok(config) => amplitude_extract::extract(config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(summary) => {
            println!(
                "\nextracted {} files for {} events\n",
                with_thousands(summary.output_files.len() as u64),
                with_thousands(summary.event_count)
            );
            println!("hooray! all done!");
            println!("have a great day!");
        }
        Err(e) => {
            eprintln!("uh oh! something didn't work...");
            eprintln!("{e}");
            eprintln!("have a great day!");
            std::process::exit(1);
        }
    }
}
