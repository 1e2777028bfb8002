// Arena server binary.
//
// Usage: arena-server [--config PATH] [--host HOST] [--port PORT]
//                     [--tick-ms MS] [--max-sessions N] [--seed SEED]
//                     [--log-level FILTER]
//
// Defaults: 0.0.0.0:9876, 1 s tick, 9 concurrent sessions.

use std::process::ExitCode;

use arena_server::cli::CliArgs;
use arena_server::logging::init_logging;
use arena_server::server::start_server;
use clap::Parser;
use tracing::{error, info};

fn main() -> ExitCode {
    let args = CliArgs::parse();
    let config = match args.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("arena-server: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.log_level);

    match start_server(config) {
        Ok((handle, addr)) => {
            info!(%addr, "accepting players");
            handle.wait();
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "failed to start arena server");
            ExitCode::FAILURE
        }
    }
}
