use clap::Parser;
use rtclink_lib::commands::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rtclink_lib::run(Cli::parse()).await
}
