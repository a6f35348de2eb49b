//! Test helpers for `udevbrokerctl` behavioral specs.
//!
//! These are black-box: they invoke the `udevbrokerctl` binary and
//! check stdout/stderr/exit code, same as the daemon's own unit tests
//! check the broker directly. A real `udevbrokerd` needs `/run/udev/*`
//! and a kernel netlink socket, neither available to a sandboxed test
//! run, so the control-socket roundtrip specs stand up a minimal fake
//! peer with the same wire protocol instead of the full reactor.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::net::{UnixListener, UnixStream};
use udevbroker_broker::ControlCommand;
use udevbroker_daemon::protocol::{self, ControlResponse};

fn ctl_command() -> Command {
    Command::cargo_bin("udevbrokerctl").expect("udevbrokerctl binary should be built")
}

/// Build an `udevbrokerctl` invocation.
pub fn ctl() -> CliBuilder {
    CliBuilder::new()
}

pub struct CliBuilder {
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl CliBuilder {
    fn new() -> Self {
        Self {
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn env(mut self, key: &str, value: impl AsRef<str>) -> Self {
        self.envs
            .push((key.to_string(), value.as_ref().to_string()));
        self
    }

    fn command(self) -> Command {
        let mut cmd = ctl_command();
        cmd.args(&self.args);
        for (key, value) in self.envs {
            cmd.env(key, value);
        }
        cmd
    }

    pub fn passes(self) -> RunAssert {
        let output = self.command().output().expect("command should run");
        assert!(
            output.status.success(),
            "expected command to pass, got exit code {:?}\nstdout: {}\nstderr: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    pub fn fails(self) -> RunAssert {
        let output = self.command().output().expect("command should run");
        assert!(
            !output.status.success(),
            "expected command to fail, but it passed\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }
}

pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            stdout.contains(expected),
            "stdout does not contain '{expected}'\nstdout: {stdout}"
        );
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(
            stderr.contains(expected),
            "stderr does not contain '{expected}'\nstderr: {stderr}"
        );
        self
    }

    /// Exact match, with a readable diff on mismatch. Prefer this over
    /// `stdout_has` for format specs — it catches stray-output regressions
    /// a substring check would miss.
    pub fn stdout_eq(self, expected: &str) -> Self {
        let stdout = self.stdout();
        similar_asserts::assert_eq!(stdout, expected);
        self
    }
}

/// A fake control-socket peer speaking the same length-prefixed JSON
/// framing as the real daemon (`udevbroker_daemon::protocol`), so CLI
/// specs can exercise a full roundtrip without the netlink-backed
/// reactor. Accepts exactly one connection, decodes one command, and
/// replies with whatever `respond_with` returns for it.
pub struct FakeDaemon {
    path: PathBuf,
    handle: tokio::task::JoinHandle<ControlCommand>,
}

impl FakeDaemon {
    /// Bind a fake peer at a fresh temp path and reply to the single
    /// command it receives with `response`.
    pub fn spawn(response: ControlResponse) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("control.sock");
        // Keep the tempdir alive for the socket's lifetime by leaking it;
        // the OS reclaims the path once the test process exits.
        std::mem::forget(dir);

        let rt = tokio::runtime::Handle::try_current();
        let listener_path = path.clone();
        let handle = match rt {
            Ok(handle) => handle.spawn(Self::accept_one(listener_path, response)),
            Err(_) => panic!("FakeDaemon::spawn must run inside a tokio runtime"),
        };

        Self { path, handle }
    }

    async fn accept_one(path: PathBuf, response: ControlResponse) -> ControlCommand {
        let listener = UnixListener::bind(&path).expect("bind fake control socket");
        let (mut stream, _) = listener.accept().await.expect("accept connection");
        let command = read_one_command(&mut stream).await;
        protocol::write_response(&mut stream, &response, protocol::DEFAULT_TIMEOUT)
            .await
            .expect("write fake response");
        command
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the single command the fake peer received.
    pub async fn received(self) -> ControlCommand {
        self.handle.await.expect("fake daemon task panicked")
    }
}

async fn read_one_command(stream: &mut UnixStream) -> ControlCommand {
    protocol::read_command(stream, protocol::DEFAULT_TIMEOUT)
        .await
        .expect("decode control command")
}
