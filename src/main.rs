use anyhow::{Context, Result};
use clap::Parser;

use watchdiff::{
    cli::Cli, watch_diff, DiffConfig, DiffRenderer, Dispatcher, InterruptController, Normalizer,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(err) = cli.validate() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }

    cli.setup_logging();
    cli.log_options();

    if let Err(err) = run(&cli).await {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: &Cli) -> Result<()> {
    let config = DiffConfig::load_or_default(cli.config.as_deref())
        .context("failed to load config file")?
        .with_env()
        .merge(cli.diff_config());
    config.validate()?;

    let normalizer = Normalizer::from_config(&config)?;
    let renderer = DiffRenderer::new(!config.no_color);

    let interrupt = InterruptController::new();
    interrupt.install()?;

    let locator = cli.locator();
    let mut dispatcher = Dispatcher::new(normalizer, renderer, std::io::stdout(), std::io::stderr());

    watch_diff(locator.as_ref(), &mut dispatcher, &interrupt.token()).await?;

    if interrupt.is_interrupted() {
        tracing::info!("watch cancelled, tracked {} resources", dispatcher.tracked());
    }
    Ok(())
}
