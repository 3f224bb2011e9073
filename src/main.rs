use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use bookstore_kernel::Settings;

#[derive(Parser, Debug)]
#[command(name = "bookstore", version, about = "Book catalogue HTTP service")]
struct Args {
    /// Directory holding base.toml and the per-environment overlays
    #[arg(short, long, value_name = "DIR")]
    config: Option<PathBuf>,

    /// Override the configured listen host
    #[arg(short, long, value_name = "ADDR")]
    bind: Option<String>,

    /// Override the configured listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(args.config).context("failed to load bookstore settings")?;
    if let Some(host) = args.bind {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }

    bookstore_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        database = %settings.database.name,
        address = %settings.bind_address(),
        "bookstore bootstrap starting"
    );

    bookstore_app::app::run(settings, bookstore_http::lifecycle::shutdown_signal()).await
}
