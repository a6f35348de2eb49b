// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `udevbrokerctl`: a thin client over the admin control socket,
//! mirroring `udevadm control`'s flag surface. One command per
//! invocation; no daemon auto-start, no retries — if nothing is
//! listening, say so and exit non-zero.

mod args;
mod client;

use std::process::ExitCode;
use udevbroker_daemon::protocol::{ControlResponse, DEFAULT_TIMEOUT};

const HELP: &str = "\
Usage: udevbrokerctl [options] <command>

Commands:
  -e, --exit                  ask the daemon to exit
  -R, --reload                reload rule files
  -s, --stop-exec-queue       stop executing new worker processes
  -S, --start-exec-queue      resume executing worker processes
      --ping                  check the daemon is listening
  -l, --log-priority=LEVEL    set the daemon's console log priority (0-7)
  -p, --property=KEY=VALUE    set a global property for future workers
  -m, --children-max=N        set the maximum number of worker processes

Options:
  -t, --timeout=SECONDS       seconds to wait for the daemon's reply (default 5)
  -h, --help                  print this help and exit
  -V, --version               print the version and exit
";

#[tokio::main]
async fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().skip(1).collect();

    let parsed = match args::parse(argv) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("udevbrokerctl: {err}");
            return ExitCode::FAILURE;
        }
    };

    if parsed.help {
        print!("{HELP}");
        return ExitCode::SUCCESS;
    }
    if parsed.version {
        println!("udevbrokerctl {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let Some(command) = parsed.command else {
        eprintln!("udevbrokerctl: no command given (see --help)");
        return ExitCode::FAILURE;
    };

    let timeout = parsed.timeout.unwrap_or(DEFAULT_TIMEOUT);
    let socket_path = client::default_socket_path();

    match client::send(&socket_path, &command, timeout).await {
        Ok(ControlResponse::Ok | ControlResponse::Pong) => ExitCode::SUCCESS,
        Ok(ControlResponse::Error { message }) => {
            eprintln!("udevbrokerctl: daemon reported an error: {message}");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!(
                "udevbrokerctl: failed to reach daemon at {}: {err}",
                socket_path.display()
            );
            ExitCode::FAILURE
        }
    }
}
