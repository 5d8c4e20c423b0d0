//! Flix — personal movie library server
//!
//! Usage:
//!   flix serve  --config config.toml        # start the HTTP API
//!   flix list   --config config.toml        # print the local library
//!   flix status --config config.toml        # print library totals

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use flix::api::{self, AppState};
use flix::catalog;
use flix::config::Config;

#[derive(Parser)]
#[command(name = "flix", about = "Personal movie library server", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API server.
    Serve {
        /// Path to the TOML configuration file.
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// List the movies in the local library.
    List {
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Print a brief library status snapshot and exit.
    Status {
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config } => {
            run_serve(config).await;
        }
        Command::List { config } => {
            run_list(config).await;
        }
        Command::Status { config } => {
            run_status(config).await;
        }
    }
}

fn load_config(path: &PathBuf) -> Config {
    match Config::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Failed to load config");
            std::process::exit(1);
        }
    }
}

async fn run_serve(config_path: PathBuf) {
    let cfg = load_config(&config_path);

    info!(
        movies_dir = ?cfg.library.movies_dir,
        port = cfg.api.port,
        frontend = cfg.api.frontend_origin,
        "Starting Flix"
    );

    if !cfg.library.movies_dir.exists() {
        info!(dir = ?cfg.library.movies_dir, "Movies directory does not exist yet");
    }

    let port = cfg.api.port;
    let state = Arc::new(AppState::new(cfg));

    tokio::select! {
        _ = api::start_server(state, port) => {}
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Received CTRL+C, shutting down…"),
                Err(e) => error!(error = %e, "Signal error"),
            }
        }
    }
}

async fn run_list(config_path: PathBuf) {
    let cfg = load_config(&config_path);

    match catalog::scan(&cfg.library.movies_dir).await {
        Ok(movies) => {
            println!("=== Flix Library ({} movies) ===", movies.len());
            for m in &movies {
                println!(
                    "  {:40} {:>12}  {}",
                    m.title,
                    catalog::format_bytes(m.size),
                    m.filename
                );
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run_status(config_path: PathBuf) {
    let cfg = load_config(&config_path);

    match catalog::stats(&cfg.library.movies_dir).await {
        Ok((count, total)) => {
            println!("=== Flix Status ===");
            println!("Movies dir  : {}", cfg.library.movies_dir.display());
            println!("Movies      : {}", count);
            println!("Total size  : {}", catalog::format_bytes(total));
            println!("API port    : {}", cfg.api.port);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
