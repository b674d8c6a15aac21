use clap::Parser;
use std::path::PathBuf;

use washi::config::Config;
use washi::modules;

/// Washi - on-demand image transformation service with signed URLs
#[derive(Parser, Debug)]
#[command(name = "washi")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,
}

#[tokio::main]
async fn main() {
    washi::logging::init_subscriber().expect("Failed to initialize logging subsystem");

    let args = Args::parse();

    let config = Config::from_file(&args.config).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::process::exit(1);
    });

    let ctx = modules::build_context(&config).unwrap_or_else(|e| {
        eprintln!("Failed to initialize modules: {}", e);
        std::process::exit(1);
    });

    tracing::info!(
        config_file = %args.config.display(),
        address = %config.server.address,
        port = config.server.port,
        loader = %config.loader.kind,
        storage = %config.storage.kind,
        result_storage = %config.result_storage.kind,
        auto_webp = config.auto_webp,
        "Configuration loaded successfully"
    );

    if args.test {
        println!("Configuration OK");
        return;
    }

    if let Err(e) = washi::server::run(ctx, &config.server.address, config.server.port).await {
        tracing::error!(error = %e, "server terminated");
        std::process::exit(1);
    }
}
