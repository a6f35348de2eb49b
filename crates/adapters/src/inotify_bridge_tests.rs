// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn fake_watcher_tracks_watched_devpaths() {
    let mut watcher = FakeInotifyWatcher::new();
    watcher.watch(Path::new("/dev/sda1"), "/devices/a").unwrap();
    assert!(watcher.is_watching("/devices/a"));

    watcher.unwatch("/devices/a");
    assert!(!watcher.is_watching("/devices/a"));
}

#[tokio::test]
async fn fake_watcher_replays_pushed_events() {
    let mut watcher = FakeInotifyWatcher::new();
    watcher.push(InotifyEvent::CloseWrite {
        devpath: "/devices/a".to_string(),
    });

    let event = watcher.next().await.unwrap();
    assert_eq!(
        event,
        InotifyEvent::CloseWrite {
            devpath: "/devices/a".to_string()
        }
    );
}

#[tokio::test]
async fn fake_watcher_pends_when_empty() {
    let mut watcher = FakeInotifyWatcher::new();
    let result = tokio::time::timeout(std::time::Duration::from_millis(20), watcher.next()).await;
    assert!(result.is_err(), "expected timeout, watcher had nothing pending");
}
