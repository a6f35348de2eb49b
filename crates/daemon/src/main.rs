// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `udevbrokerd`: binds the kernel uevent netlink socket and the admin
//! control socket, then runs a single reactor task over both plus the
//! worker pool's report channel and the inotify watch-list bridge.
//!
//! Re-execs itself under `--worker` as each worker subprocess's entry
//! point; see `worker_main`.

// Allow panic!/unwrap/expect in test code; `main.rs` is its own crate
// root distinct from `lib.rs` so it needs its own copy of this.
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::time::Duration;

use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter};
use udevbroker_adapters::{
    key_for_event, DeviceEventSource, DevicePersistence, FsDevicePersistence, InotifyWatcher,
    LinuxInotifyWatcher, NetlinkEventSink, NetlinkUeventSource, ProcessRuleExecutor,
    ProcessedEventSink, TracedSink,
};
use udevbroker_broker::worker_pool::WorkerReport;
use udevbroker_broker::{Broker, ControlCommand};
use udevbroker_core::{Event, EventAction, SystemClock};
use udevbroker_daemon::env::{self, InheritedFds};
use udevbroker_daemon::lifecycle::{update_marker, Config, SupervisorState};
use udevbroker_daemon::protocol::{self, ControlResponse};
use udevbroker_daemon::worker_main::{self, WorkerDeps};
use udevbroker_daemon::SubprocessWorkerSpawner;

/// Cadence of the periodic timeout-sweep / idle-kill housekeeping tick.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(5);

/// Ceiling on how long `Draining` waits for the queue and pool to empty
/// before the reactor gives up and stops anyway.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("--worker") {
        run_as_worker().await;
        return;
    }

    let cli = match env::parse_cli(args.drain(..)) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("udevbrokerd: {e}");
            std::process::exit(2);
        }
    };
    if cli.help {
        print_help();
        return;
    }
    if cli.version {
        println!("udevbrokerd {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let kernel = env::parse_kernel_cmdline(&env::read_kernel_cmdline());
    let config = Config::resolve(&cli, &kernel);
    let (reload_handle, _log_guard) = match setup_logging(&config) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("udevbrokerd: failed to set up logging: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_reactor(config, reload_handle).await {
        tracing::error!(error = %e, "daemon exited with an error");
        std::process::exit(1);
    }
}

fn print_help() {
    println!(
        "Usage: udevbrokerd [--daemon] [--debug] [--children-max=N] [--exec-delay=SEC] \
         [--event-timeout=SEC] [--resolve-names=early|late|never]"
    );
}

#[derive(Debug, thiserror::Error)]
enum DaemonError {
    #[error("failed to bind control socket at {path}: {source}")]
    Bind {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("netlink uevent source: {0}")]
    Source(#[from] udevbroker_adapters::SourceError),
    #[error("inotify bridge: {0}")]
    Inotify(#[from] udevbroker_adapters::InotifyError),
    #[error("netlink event sink: {0}")]
    Sink(#[from] udevbroker_adapters::SinkError),
    #[error("failed to install signal handler: {0}")]
    Signal(std::io::Error),
}

type AppBroker = Broker<SubprocessWorkerSpawner, SystemClock>;

async fn run_reactor(
    config: Config,
    reload_handle: reload::Handle<EnvFilter, tracing_subscriber::Registry>,
) -> Result<(), DaemonError> {
    let mut state = SupervisorState::Starting;

    let fds = env::inherited_fds();
    let listener = bind_control_socket(&config, fds)?;
    let mut source = NetlinkUeventSource::bind()?;
    let mut watcher = LinuxInotifyWatcher::new()?;
    let sink = TracedSink::new(NetlinkEventSink::bind()?);
    let persistence = FsDevicePersistence::new(&config.data_dir);
    let spawner = SubprocessWorkerSpawner::new(&config.rule_engine_path, &config.data_dir)
        .map_err(|e| DaemonError::Bind {
            path: config.control_socket.clone(),
            source: e,
        })?;

    let mut broker: AppBroker = Broker::new(spawner, SystemClock, config.children_max);
    // Inotify-synthesized "change" events have no kernel-assigned seqnum of
    // their own; mint one just past the highest kernel seqnum seen so far
    // so ordering against real uevents is preserved. A collision with a
    // future kernel seqnum is the same "kernel bug, not handled" class the
    // queue already excuses for duplicate seqnums.
    let mut next_synthetic_seqnum: u64 = 1;

    let (control_tx, mut control_rx) = mpsc::unbounded_channel::<ControlRequest>();
    tokio::spawn(accept_control_connections(listener, control_tx));

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .map_err(DaemonError::Signal)?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
        .map_err(DaemonError::Signal)?;
    let mut housekeeping = tokio::time::interval(HOUSEKEEPING_INTERVAL);
    let mut drain_deadline: Option<std::pin::Pin<Box<tokio::time::Sleep>>> = None;

    state = state.start_complete();
    tracing::info!("udevbrokerd ready");

    loop {
        if state == SupervisorState::Stopped {
            break;
        }

        tokio::select! {
            biased;

            report = broker.pool.next_report() => {
                match report {
                    Some(WorkerReport::Completed { worker }) => {
                        broker.on_completion(worker);
                        broker.dispatch_pass().await;
                    }
                    Some(WorkerReport::Exited { worker }) => {
                        if let Some(freed) = broker.on_child_exit(worker) {
                            requeue_unprocessed(&sink, &persistence, freed).await;
                        }
                        broker.dispatch_pass().await;
                    }
                    None => {}
                }
            }

            uevent = source.recv(), if state.is_accepting_events() => {
                match uevent {
                    Ok(raw) => {
                        next_synthetic_seqnum = next_synthetic_seqnum.max(raw.seqnum + 1);
                        broker.insert_event(raw.into_event());
                        broker.dispatch_pass().await;
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to receive kernel uevent"),
                }
            }

            _ = sigterm.recv() => {
                tracing::info!("SIGTERM received, draining");
                state = state.begin_drain();
                broker.begin_drain();
                drain_deadline.get_or_insert_with(|| Box::pin(tokio::time::sleep(DRAIN_TIMEOUT)));
            }
            _ = sigint.recv() => {
                tracing::info!("SIGINT received, draining");
                state = state.begin_drain();
                broker.begin_drain();
                drain_deadline.get_or_insert_with(|| Box::pin(tokio::time::sleep(DRAIN_TIMEOUT)));
            }

            _ = async {
                match drain_deadline.as_mut() {
                    Some(deadline) => deadline.await,
                    None => std::future::pending().await,
                }
            } => {
                tracing::warn!("drain timeout elapsed, stopping with workers still outstanding");
                state = state.drain_complete();
            }

            watch_event = watcher.next() => {
                match watch_event {
                    Ok(udevbroker_adapters::InotifyEvent::CloseWrite { devpath }) => {
                        let seqnum = next_synthetic_seqnum;
                        next_synthetic_seqnum += 1;
                        let event = Event::new(seqnum, devpath, "block", EventAction::Change);
                        broker.insert_event(event);
                        broker.dispatch_pass().await;
                    }
                    Ok(udevbroker_adapters::InotifyEvent::WatchEnded { devpath }) => {
                        tracing::debug!(devpath = %devpath, "inotify watch ended");
                    }
                    Err(e) => tracing::warn!(error = %e, "inotify bridge error"),
                }
            }

            Some(request) = control_rx.recv() => {
                let response = apply_control(&mut broker, &config, &reload_handle, request.command.clone());
                let _ = request.reply.send(response);
                if matches!(request.command, ControlCommand::Exit) {
                    state = state.begin_drain();
                    broker.begin_drain();
                    drain_deadline.get_or_insert_with(|| Box::pin(tokio::time::sleep(DRAIN_TIMEOUT)));
                }
                broker.dispatch_pass().await;
            }

            _ = housekeeping.tick() => {
                broker.timeout_sweep(config.warn_timeout, config.event_timeout);
                if broker.is_idle() {
                    broker.kill_idle();
                }
            }
        }

        if let Err(e) = update_marker(&config.queue_marker, broker.is_idle()) {
            tracing::warn!(error = %e, "failed to update queue marker");
        }

        if state == SupervisorState::Draining && broker.is_idle() {
            state = state.drain_complete();
        }
    }

    tracing::info!("udevbrokerd stopped");
    Ok(())
}

async fn requeue_unprocessed<K: ProcessedEventSink, P: DevicePersistence>(
    sink: &K,
    persistence: &P,
    event: Event,
) {
    tracing::warn!(seqnum = event.seqnum, devpath = %event.devpath, "worker died holding an event, re-forwarding unprocessed");
    let key = key_for_event(&event);
    if let Err(e) = persistence.delete(&key).await {
        tracing::warn!(error = %e, "failed to delete persistence record for crashed worker's event");
    }
    if let Err(e) = persistence.untag(&key).await {
        tracing::warn!(error = %e, "failed to untag persistence record for crashed worker's event");
    }
    if let Err(e) = sink.publish(&event).await {
        tracing::warn!(error = %e, "failed to re-publish unprocessed event");
    }
}

#[allow(unsafe_code)]
fn bind_control_socket(config: &Config, fds: InheritedFds) -> Result<UnixListener, DaemonError> {
    use std::os::fd::FromRawFd;

    if let Some(raw_fd) = fds.control {
        // SAFETY: `LISTEN_PID`/`LISTEN_FDS` matched this process (checked in
        // `env::inherited_fds`), so this fd is ours to adopt exactly once.
        let std_listener = unsafe { std::os::unix::net::UnixListener::from_raw_fd(raw_fd) };
        std_listener
            .set_nonblocking(true)
            .map_err(|e| DaemonError::Bind {
                path: config.control_socket.clone(),
                source: e,
            })?;
        return UnixListener::from_std(std_listener).map_err(|e| DaemonError::Bind {
            path: config.control_socket.clone(),
            source: e,
        });
    }

    if let Some(parent) = config.control_socket.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::remove_file(&config.control_socket);
    UnixListener::bind(&config.control_socket).map_err(|e| DaemonError::Bind {
        path: config.control_socket.clone(),
        source: e,
    })
}

struct ControlRequest {
    command: ControlCommand,
    reply: oneshot::Sender<ControlResponse>,
}

async fn accept_control_connections(
    listener: UnixListener,
    control_tx: mpsc::UnboundedSender<ControlRequest>,
) {
    loop {
        let (stream, _addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "failed to accept control connection");
                continue;
            }
        };
        let control_tx = control_tx.clone();
        tokio::spawn(handle_control_connection(stream, control_tx));
    }
}

async fn handle_control_connection(
    mut stream: UnixStream,
    control_tx: mpsc::UnboundedSender<ControlRequest>,
) {
    let command = match protocol::read_command(&mut stream, protocol::DEFAULT_TIMEOUT).await {
        Ok(command) => command,
        Err(e) => {
            tracing::debug!(error = %e, "control connection sent a malformed command");
            return;
        }
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    if control_tx
        .send(ControlRequest {
            command,
            reply: reply_tx,
        })
        .is_err()
    {
        return;
    }

    let response = reply_rx.await.unwrap_or(ControlResponse::Error {
        message: "reactor shut down before answering".to_string(),
    });
    let _ = protocol::write_response(&mut stream, &response, protocol::DEFAULT_TIMEOUT).await;
}

fn apply_control(
    broker: &mut AppBroker,
    config: &Config,
    reload_handle: &reload::Handle<EnvFilter, tracing_subscriber::Registry>,
    command: ControlCommand,
) -> ControlResponse {
    if let ControlCommand::SetLogLevel { level } = &command {
        let filter = log_level_to_filter(*level);
        if let Err(e) = reload_handle.reload(filter) {
            tracing::warn!(error = %e, "failed to reload log filter");
        }
    }
    broker.apply_control(command.clone());
    if matches!(command, ControlCommand::Reload) {
        let _ = broker.take_reload();
        tracing::info!(rule_engine = %config.rule_engine_path.display(), "reload requested, rules re-evaluated on next dispatch");
    }
    match command {
        ControlCommand::Ping => ControlResponse::Pong,
        _ => ControlResponse::Ok,
    }
}

/// Map udev's numeric log-priority scale (syslog severities) onto a
/// `tracing` filter, for the `SET_LOG_LEVEL` control command.
fn log_level_to_filter(level: u8) -> EnvFilter {
    let directive = match level {
        0..=3 => "error",
        4 => "warn",
        5 | 6 => "info",
        _ => "debug",
    };
    EnvFilter::new(directive)
}

/// Wire up the daemon's own log file with a runtime-reloadable filter
/// backing `SET_LOG_LEVEL`.
fn setup_logging(
    config: &Config,
) -> Result<
    (
        reload::Handle<EnvFilter, tracing_subscriber::Registry>,
        tracing_appender::non_blocking::WorkerGuard,
    ),
    std::io::Error,
> {
    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = config
        .log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
    let file_name = config
        .log_path
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("udevbrokerd.log"));
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_directive = if config.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let (filter, reload_handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
        .init();

    Ok((reload_handle, guard))
}

async fn run_as_worker() {
    let properties = std::env::var("UDEV_PROPERTIES")
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default();
    let rule_engine_path =
        std::env::var("UDEV_RULE_ENGINE").unwrap_or_else(|_| "/lib/udev/rule-engine".to_string());
    let data_dir = std::env::var("UDEV_DATA_DIR").unwrap_or_else(|_| "/run/udev/data".to_string());

    let sink = match NetlinkEventSink::bind() {
        Ok(sink) => sink,
        Err(e) => {
            eprintln!("udevbrokerd worker: failed to bind event sink: {e}");
            std::process::exit(1);
        }
    };
    let deps = WorkerDeps {
        rules: ProcessRuleExecutor::new(rule_engine_path),
        persistence: FsDevicePersistence::new(data_dir),
        sink,
        properties,
    };

    if let Err(e) = worker_main::run(deps).await {
        eprintln!("udevbrokerd worker: {e}");
        std::process::exit(1);
    }
}
