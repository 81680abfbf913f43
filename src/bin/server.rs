//! BasaltKV Server Binary
//!
//! Starts the RESP TCP server for BasaltKV.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use basaltkv::network::Server;
use basaltkv::{Config, LsmEngine};

/// BasaltKV Server
#[derive(Parser, Debug)]
#[command(name = "basaltkv-server")]
#[command(about = "Write-optimized LSM key-value store with a RESP front end")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:9001")]
    listen: String,

    /// Memtable size limit in MiB before rotation
    #[arg(short = 'm', long, default_value = "32")]
    memtable_mb: usize,

    /// Segment count that triggers compaction
    #[arg(short = 's', long, default_value = "100")]
    max_segments: usize,
}

fn main() {
    // Initialize tracing/logging on stderr
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,basaltkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::info!("BasaltKV Server v{}", basaltkv::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    // Build config from args
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .memtable_size_limit(args.memtable_mb * 1024 * 1024)
        .max_segment_count(args.max_segments)
        .build();

    // Open engine
    let engine = match LsmEngine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    // Bind the event loop; bind/poll-creation failures are fatal
    let mut server = match Server::bind(&config, engine) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
