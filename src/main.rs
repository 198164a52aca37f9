use anyhow::Result;
use katalyst::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
