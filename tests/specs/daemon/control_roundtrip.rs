//! Roundtrip specs for `udevbrokerctl` against the admin control-socket
//! wire protocol. A [`FakeDaemon`] stands in for the reactor
//! loop's `accept_control_connections`/`handle_control_connection` pair
//! (see `daemon/src/main.rs`), since driving the real netlink-backed
//! daemon needs root and `/run/udev/*`.

use crate::prelude::*;
use udevbroker_broker::ControlCommand;
use udevbroker_daemon::protocol::ControlResponse;

#[tokio::test]
async fn exit_command_is_sent_and_ack_reported_as_success() {
    let fake = FakeDaemon::spawn(ControlResponse::Ok);

    let output = tokio::task::spawn_blocking({
        let sock = fake.path().to_path_buf();
        move || {
            ctl()
                .args(&["--exit"])
                .env("UDEV_CONTROL_SOCKET", sock.to_string_lossy())
                .passes()
        }
    })
    .await
    .unwrap();
    drop(output);

    assert_eq!(fake.received().await, ControlCommand::Exit);
}

#[tokio::test]
async fn ping_receives_explicit_pong() {
    let fake = FakeDaemon::spawn(ControlResponse::Pong);

    let sock = fake.path().to_path_buf();
    tokio::task::spawn_blocking(move || {
        ctl()
            .args(&["--ping"])
            .env("UDEV_CONTROL_SOCKET", sock.to_string_lossy())
            .passes();
    })
    .await
    .unwrap();

    assert_eq!(fake.received().await, ControlCommand::Ping);
}

#[tokio::test]
async fn daemon_error_response_surfaces_on_stderr_and_fails() {
    let fake = FakeDaemon::spawn(ControlResponse::Error {
        message: "rules directory not found".to_string(),
    });

    let sock = fake.path().to_path_buf();
    tokio::task::spawn_blocking(move || {
        ctl()
            .args(&["--reload"])
            .env("UDEV_CONTROL_SOCKET", sock.to_string_lossy())
            .fails()
            .stderr_has("rules directory not found");
    })
    .await
    .unwrap();

    assert_eq!(fake.received().await, ControlCommand::Reload);
}

#[tokio::test]
async fn set_env_carries_the_raw_assignment() {
    let fake = FakeDaemon::spawn(ControlResponse::Ok);

    let sock = fake.path().to_path_buf();
    tokio::task::spawn_blocking(move || {
        ctl()
            .args(&["--property=ID_FOO=bar"])
            .env("UDEV_CONTROL_SOCKET", sock.to_string_lossy())
            .passes();
    })
    .await
    .unwrap();

    assert_eq!(
        fake.received().await,
        ControlCommand::SetEnv {
            assignment: "ID_FOO=bar".to_string()
        }
    );
}

#[tokio::test]
async fn set_max_children_carries_the_parsed_number() {
    let fake = FakeDaemon::spawn(ControlResponse::Ok);

    let sock = fake.path().to_path_buf();
    tokio::task::spawn_blocking(move || {
        ctl()
            .args(&["--children-max=12"])
            .env("UDEV_CONTROL_SOCKET", sock.to_string_lossy())
            .passes();
    })
    .await
    .unwrap();

    assert_eq!(
        fake.received().await,
        ControlCommand::SetMaxChildren { max: 12 }
    );
}
