#![cfg(not(tarpaulin_include))]

use clap::Parser;
use sheetmap::app::{self, ServerConfig};
use sheetmap::logging::init_logging;

/// Serve the spreadsheet-to-JSON upload page
#[derive(Parser, Debug)]
#[command(name = "website", version)]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Largest accepted upload, in MiB
    #[arg(long, default_value_t = 32)]
    max_upload_mb: usize,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Main entry point for the web application
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose, false);

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        max_upload_bytes: args.max_upload_mb * 1024 * 1024,
    };

    app::run(config).await
}
