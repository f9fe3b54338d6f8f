// CLI entry point for the wayfarer relay.
//
// Starts a standalone relay server that game clients connect to. The relay
// forwards positions and party rosters between clients; it never runs game
// logic. See `server.rs` for the networking architecture and `session.rs` for
// the routing rules.
//
// Usage:
//   relay [OPTIONS]
//     --port <PORT>           Listen port (default: 7878)
//     --max-players <N>       Max players (default: 16)
//
// Log verbosity follows `RUST_LOG` (default: info).

use log::{error, info};
use wayfarer_relay::server::{RelayConfig, start_relay};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = parse_args(std::env::args().skip(1)).unwrap_or_else(|msg| {
        eprintln!("{msg}");
        print_usage();
        std::process::exit(1);
    });

    let (_handle, addr) = match start_relay(config) {
        Ok(result) => result,
        Err(e) => {
            error!("failed to start relay: {e}");
            std::process::exit(1);
        }
    };
    info!("relay ready on {addr}; stop with Ctrl+C");

    // The process exits on SIGINT/SIGTERM; relay threads go down with it.
    loop {
        std::thread::park();
    }
}

/// Parse command-line arguments into a `RelayConfig`. Plain argument
/// matching, no CLI framework.
fn parse_args(args: impl IntoIterator<Item = String>) -> Result<RelayConfig, String> {
    let mut config = RelayConfig::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--port" => {
                config.port = args
                    .next()
                    .and_then(|s| s.parse().ok())
                    .ok_or("--port requires a valid port number")?;
            }
            "--max-players" => {
                config.max_players = args
                    .next()
                    .and_then(|s| s.parse().ok())
                    .filter(|&n| n > 0)
                    .ok_or("--max-players requires a positive number")?;
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => return Err(format!("Unknown argument: {other}")),
        }
    }

    Ok(config)
}

fn print_usage() {
    println!("Usage: relay [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --port <PORT>           Listen port (default: 7878)");
    println!("  --max-players <N>       Max players (default: 16)");
    println!("  --help, -h              Show this help");
}
