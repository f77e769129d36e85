use clap::Parser;
use log::info;
use server::config::{GameConfig, ServerConfig};
use server::network::Server;
use shared::{DEFAULT_COUNTDOWN, DEFAULT_PORT, DEFAULT_TICK_RATE, DEFAULT_WIN_SCORE};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value_t = DEFAULT_TICK_RATE)]
    tick_rate: u32,

    /// Score that ends a match
    #[arg(short, long, default_value_t = DEFAULT_WIN_SCORE)]
    win_score: u32,

    /// First value of the pre-match countdown
    #[arg(short, long, default_value_t = DEFAULT_COUNTDOWN)]
    countdown: u8,

    /// Milliseconds between countdown steps
    #[arg(long, default_value = "1000")]
    countdown_ms: u64,

    /// End a match in favour of the remaining player when the other disconnects
    #[arg(long)]
    forfeit_on_leave: bool,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            host: args.host,
            port: args.port,
            game: GameConfig {
                tick_rate: args.tick_rate,
                win_score: args.win_score,
                countdown_from: args.countdown,
                countdown_interval: Duration::from_millis(args.countdown_ms),
                forfeit_on_leave: args.forfeit_on_leave,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = ServerConfig::from(args);

    info!("Starting server on {}", config.address());
    if config.game.forfeit_on_leave {
        info!("Matches end when a player leaves");
    }

    let server = Server::new(config).await?;

    tokio::select! {
        _ = server.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
