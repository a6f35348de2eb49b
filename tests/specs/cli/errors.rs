//! `udevbrokerctl` argv error specs — these never touch the control
//! socket, since `args::parse` rejects them before a connection attempt.

use crate::prelude::*;

#[test]
fn unknown_flag_is_rejected() {
    ctl()
        .args(&["--bogus"])
        .fails()
        .stderr_has("unrecognized argument '--bogus'");
}

#[test]
fn two_commands_at_once_is_rejected() {
    ctl()
        .args(&["--exit", "--ping"])
        .fails()
        .stderr_has("more than one command");
}

#[test]
fn malformed_log_priority_is_rejected() {
    ctl()
        .args(&["--log-priority=loud"])
        .fails()
        .stderr_has("invalid value for --log-priority");
}

#[test]
fn malformed_children_max_is_rejected() {
    ctl()
        .args(&["--children-max=many"])
        .fails()
        .stderr_has("invalid value for --children-max");
}

#[test]
fn unreachable_socket_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("no-such-control.sock");

    ctl()
        .args(&["--ping", "--timeout=1"])
        .env("UDEV_CONTROL_SOCKET", missing.to_string_lossy())
        .fails()
        .stderr_has("failed to reach daemon");
}
