//! Shared helpers for the supervisor integration tests.
//!
//! Tests drive real children through `/bin/sh`, so everything here is about
//! building configs, polling observable state (status file, events) with
//! deadlines instead of fixed sleeps, and recording published events.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use genvisor::events::{Event, EventKind};
use genvisor::{Config, Subscribe};

/// Builds a config that runs `script` under `/bin/sh -c`.
pub fn sh_config(script: &str) -> Config {
    Config {
        command: "/bin/sh".into(),
        args: vec!["-c".into(), script.into()],
        ..Config::default()
    }
}

/// Polls `cond` every 10ms until it holds or `timeout` elapses.
pub async fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

/// Parses status-file contents into `(generation, pid)` pairs.
pub fn parse_status(contents: &str) -> Vec<(u64, i32)> {
    contents
        .lines()
        .filter_map(|line| {
            let (generation, pid) = line.split_once(':')?;
            Some((generation.parse().ok()?, pid.parse().ok()?))
        })
        .collect()
}

/// Reads and parses the status file; empty when absent.
pub fn read_status(path: &std::path::Path) -> Vec<(u64, i32)> {
    std::fs::read_to_string(path)
        .map(|s| parse_status(&s))
        .unwrap_or_default()
}

/// Subscriber that records every event for later assertions.
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }

    pub fn of_kind(&self, kind: EventKind) -> Vec<Event> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}
