// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use udevbroker_core::EventAction;

fn ev(seqnum: u64, devpath: &str) -> Event {
    Event::new(seqnum, devpath, "block", EventAction::Change)
}

#[tokio::test]
async fn fake_sink_records_publishes() {
    let sink = FakeEventSink::new();
    sink.publish(&ev(1, "/devices/a")).await.unwrap();
    sink.publish(&ev(2, "/devices/b")).await.unwrap();

    let calls = sink.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].seqnum, 1);
    assert_eq!(calls[1].devpath, "/devices/b");
}

#[tokio::test]
async fn fake_sink_clone_shares_recorded_calls() {
    let sink = FakeEventSink::new();
    let clone = sink.clone();
    clone.publish(&ev(3, "/devices/c")).await.unwrap();
    assert_eq!(sink.calls().len(), 1);
}
