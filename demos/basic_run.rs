//! Supervise a worker on an inherited TCP socket.
//!
//! Run with:
//! ```bash
//! cargo run --example basic_run
//! ```
//! then `kill -HUP <pid>` to roll a generation, `kill -TERM <pid>` to stop.

use std::sync::Arc;
use std::time::Duration;

use genvisor::{Config, LogWriter, Supervisor};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let mut cfg = Config::default();
    // a stand-in worker: reads its inherited socket from the environment
    cfg.command = "/bin/sh".into();
    cfg.args = vec![
        "-c".into(),
        "echo \"worker $$ generation $SERVER_STARTER_GENERATION on $SERVER_STARTER_PORT\"; exec sleep 3600".into(),
    ];
    cfg.ports = vec!["127.0.0.1:0".into()];
    cfg.interval = Duration::from_secs(1);
    cfg.status_file = Some(std::env::temp_dir().join("genvisor-demo.status"));

    let supervisor = Supervisor::new(cfg, vec![Arc::new(LogWriter)]);
    println!("supervisor pid {}", std::process::id());
    supervisor.run().await?;
    Ok(())
}
