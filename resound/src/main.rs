//! TLS WebSocket echo server binary.

use clap::Parser;
use resound_server::logging::init_logging;
use resound_server::Server;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing::error;

#[derive(Debug, Parser)]
#[command(name = "resound", version, about = "TLS WebSocket echo server")]
struct Args {
    /// Path to the PEM certificate chain
    #[arg(long, value_name = "FILE")]
    cert: PathBuf,

    /// Path to the PEM private key
    #[arg(long, value_name = "FILE")]
    key: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Port to listen on
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Request path that upgrades to a WebSocket session
    #[arg(long, default_value = "/")]
    path: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging();

    let result = Server::builder()
        .bind(SocketAddr::new(args.bind, args.port))
        .tls(args.cert, args.key)
        .upgrade_path(args.path)
        .build();

    let server = match result {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.serve().await {
        error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
}
