use anyhow::{Context, Result};
use clap::Parser;
use registry_keywords::{run_build, Cli};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let controls = cli.build_controls();
    let report = run_build(controls.clone()).with_context(|| {
        format!("failed to build keyword entities from {}", controls.source())
    })?;
    report.report();
    Ok(())
}

fn setup_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("registry_keywords=debug,info")
        } else {
            EnvFilter::new("registry_keywords=info,warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
