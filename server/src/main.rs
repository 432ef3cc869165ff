use clap::Parser;
use log::info;
use server::network::GameServer;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Address to bind the listening socket to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Port to listen on
    #[clap(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,
}

/// Starts the arena server and runs until interrupted.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let server = GameServer::new();
    let addr = server.start(&format!("{}:{}", args.host, args.port)).await?;
    info!("Arena server ready on {}, waiting for players", addr);

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down gracefully");
    server.stop().await;

    Ok(())
}
