//! blinkdb server entry point.
//!
//! Binds the RESP-2 listener, starts the TTL reaper, and serves until
//! SIGINT or SIGTERM arrives. Exit code 0 on graceful shutdown, 1 on
//! an argument or initialization failure.

use anyhow::Context;
use blinkdb::server::{Server, ServerConfig};
use blinkdb::storage::{start_reaper, Store};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

struct Config {
    port: u16,
    max_connections: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: blinkdb::DEFAULT_PORT,
            max_connections: blinkdb::DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Config {
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "-p" | "--port" => {
                    i += 1;
                    config.port = match args.get(i).and_then(|a| a.parse().ok()) {
                        Some(port) => port,
                        None => {
                            eprintln!("Error: --port requires an integer");
                            std::process::exit(1);
                        }
                    };
                }
                "-c" | "--connections" => {
                    i += 1;
                    config.max_connections = match args.get(i).and_then(|a| a.parse().ok()) {
                        Some(n) => n,
                        None => {
                            eprintln!("Error: --connections requires an integer");
                            std::process::exit(1);
                        }
                    };
                }
                "-h" | "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown option: {}", other);
                    print_help();
                    std::process::exit(1);
                }
            }
            i += 1;
        }

        config
    }
}

fn print_help() {
    println!(
        r#"blinkdb-server - In-Memory Key-Value Database Server

USAGE:
    blinkdb-server [OPTIONS]

OPTIONS:
    -p, --port <PORT>         Port to listen on (default: {port})
    -c, --connections <N>     Max concurrent connections (default: {conns})
    -h, --help                Print this help message

CONNECTING:
    Any Redis client works, e.g.:
    $ redis-cli -p {port}
    127.0.0.1:{port}> SET name blink
    OK
    127.0.0.1:{port}> GET name
    "blink"
"#,
        port = blinkdb::DEFAULT_PORT,
        conns = blinkdb::DEFAULT_MAX_CONNECTIONS,
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!(version = blinkdb::VERSION, "starting blinkdb-server");

    let store = Arc::new(Store::new());
    let reaper = start_reaper(Arc::clone(&store));

    let server = Server::bind(
        ServerConfig {
            port: config.port,
            max_connections: config.max_connections,
        },
        Arc::clone(&store),
    )
    .await
    .with_context(|| format!("failed to bind port {}", config.port))?;

    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .context("failed to install SIGTERM handler")?;

    tokio::select! {
        _ = server.run() => {}
        _ = signal::ctrl_c() => {
            info!("received SIGINT, shutting down");
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down");
        }
    }

    reaper.stop();
    let stats = store.stats();
    info!(
        keys = stats.keys,
        sets = stats.set_ops,
        gets = stats.get_ops,
        "server shutdown complete"
    );
    Ok(())
}
