// CLI entry point for a standalone Sightline session host.
//
// Runs the authoritative session — accept loop, per-connection readers, and
// the fixed-rate tick — with an idle local player (the host binary has no
// input devices attached; a windowed build drives the same `host_tick` with
// real input instead). See `host.rs` for the architecture and `session.rs`
// for the canonical state.
//
// Usage:
//   host [OPTIONS]
//     --port <PORT>        Listen port (default: 7878)
//     --name <NAME>        Host player name (default: Host)
//     --team <TEAM>        Host player team (default: Red)
//     --map <MAP>          Map identifier (default: arena)
//     --max-players <N>    Max participants including the host (default: 4)
//     --tick-hz <N>        Simulation/broadcast rate (default: 120)

use sightline_net::host::{HostConfig, run_host_loop, start_host};
use sightline_sim::{GameConfig, InputState, MapGrid, Simulation};

fn main() {
    env_logger::init();
    let config = parse_args();

    let Some(map) = MapGrid::builtin(&config.map) else {
        eprintln!("Unknown map '{}'", config.map);
        std::process::exit(1);
    };
    let sim = Simulation::new(
        GameConfig::default(),
        map,
        &config.host_team,
        sightline_protocol::PlayerIndex(0),
    );

    let (handle, addr) = match start_host(&config) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Failed to start host: {e}");
            std::process::exit(1);
        }
    };

    println!("Hosting '{}' on {addr}", config.map);
    println!("Press Ctrl+C to stop.");

    // The tick loop runs on the main thread until the process is killed;
    // SIGINT tears the sockets down with it, which peers observe as a
    // disconnect. Graceful quit broadcasting happens via `HostHandle::stop`
    // when the host is embedded in the game instead.
    run_host_loop(
        handle.session(),
        handle.keep_running(),
        sim,
        config.tick_hz,
        InputState::default(),
    );
    handle.stop();
}

/// Parse command-line arguments into a `HostConfig`. Uses simple
/// `std::env::args()` matching — no clap dependency.
fn parse_args() -> HostConfig {
    let mut config = HostConfig::default();
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                i += 1;
                config.port = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--port requires a valid port number");
                    std::process::exit(1);
                });
            }
            "--name" => {
                i += 1;
                config.host_name = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--name requires a value");
                    std::process::exit(1);
                });
            }
            "--team" => {
                i += 1;
                config.host_team = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--team requires a value");
                    std::process::exit(1);
                });
            }
            "--map" => {
                i += 1;
                config.map = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--map requires a value");
                    std::process::exit(1);
                });
            }
            "--max-players" => {
                i += 1;
                config.max_players =
                    args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                        eprintln!("--max-players requires a valid number");
                        std::process::exit(1);
                    });
            }
            "--tick-hz" => {
                i += 1;
                config.tick_hz = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--tick-hz requires a valid number");
                    std::process::exit(1);
                });
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    config
}

fn print_usage() {
    println!("Usage: host [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --port <PORT>        Listen port (default: 7878)");
    println!("  --name <NAME>        Host player name (default: Host)");
    println!("  --team <TEAM>        Host player team (default: Red)");
    println!("  --map <MAP>          Map identifier (default: arena)");
    println!("  --max-players <N>    Max participants including the host (default: 4)");
    println!("  --tick-hz <N>        Simulation/broadcast rate (default: 120)");
    println!("  --help, -h           Show this help");
}
