use clap::Parser;
use color_eyre::eyre;
use kube_migrate_cli::{Cli, logging};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::setup_logging(
        cli.logging.log_level,
        cli.logging.log_format,
        termcolor::ColorChoice::Auto,
    )?;

    kube_migrate_cli::run(&cli)?;
    Ok(())
}
