use clap::Parser;
use rootclay::cli::Cli;
use rootclay::{commands, init_logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    let cli = Cli::parse();
    tracing::debug!("rootclay {} (built {})", rootclay::VERSION, rootclay::BUILD_DATE);
    commands::run(cli).await
}
