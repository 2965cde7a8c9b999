//! Programmatic rolling reloads, no signals involved.
//!
//! Rolls a new generation every two seconds, then shuts down gracefully.

use std::sync::Arc;
use std::time::Duration;

use genvisor::{Config, LogWriter, Supervisor};
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let mut cfg = Config::default();
    cfg.command = "/bin/sh".into();
    cfg.args = vec![
        "-c".into(),
        "echo \"generation $SERVER_STARTER_GENERATION up\"; exec sleep 3600".into(),
    ];
    cfg.ports = vec!["127.0.0.1:0".into()];
    cfg.interval = Duration::from_millis(500);

    let supervisor = Arc::new(Supervisor::new(cfg, vec![Arc::new(LogWriter)]));

    let runner = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run().await })
    };

    for _ in 0..3 {
        tokio::time::sleep(Duration::from_secs(2)).await;
        supervisor.reload().await?;
    }

    tokio::time::sleep(Duration::from_secs(1)).await;
    supervisor.shutdown(&CancellationToken::new()).await?;
    runner.await??;
    Ok(())
}
