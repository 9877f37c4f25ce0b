//! Test server management.
//!
//! Spawns and manages driftd instances for integration testing.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::sleep;

/// Timing knobs that integration tests tighten to keep wall-clock short.
pub struct TestTuning {
    pub grace_period_ms: u64,
    pub ping_interval_ms: u64,
    pub max_missed_pings: u32,
    pub sweep_interval_ms: u64,
}

impl Default for TestTuning {
    fn default() -> Self {
        Self {
            // Long enough that background machinery never interferes with
            // a test unless the test asks for it.
            grace_period_ms: 60_000,
            ping_interval_ms: 60_000,
            max_missed_pings: 2,
            sweep_interval_ms: 60_000,
        }
    }
}

/// A test server instance.
pub struct TestServer {
    child: Child,
    port: u16,
    data_dir: PathBuf,
}

impl TestServer {
    /// Spawn a new test server with default (inert) tuning.
    pub async fn spawn(port: u16) -> anyhow::Result<Self> {
        Self::spawn_with(port, TestTuning::default()).await
    }

    /// Spawn a new test server with the given timing tuning.
    pub async fn spawn_with(port: u16, tuning: TestTuning) -> anyhow::Result<Self> {
        let data_dir = std::env::temp_dir().join(format!("driftd-test-{}", port));
        std::fs::create_dir_all(&data_dir)?;

        let config_path = data_dir.join("drift.toml");
        let config_content = format!(
            r#"
[server]
name = "drift-test"
listen = "127.0.0.1:{port}"

[timing]
grace_period_ms = {grace}
ping_interval_ms = {ping}
max_missed_pings = {missed}
sweep_interval_ms = {sweep}
"#,
            port = port,
            grace = tuning.grace_period_ms,
            ping = tuning.ping_interval_ms,
            missed = tuning.max_missed_pings,
            sweep = tuning.sweep_interval_ms,
        );
        std::fs::write(&config_path, config_content)?;

        let child = Command::new(env!("CARGO_BIN_EXE_driftd"))
            .arg("-c")
            .arg(&config_path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let server = Self {
            child,
            port,
            data_dir,
        };
        server.wait_until_ready().await?;
        Ok(server)
    }

    /// The address clients should connect to.
    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..100 {
            if TcpStream::connect(self.address()).await.is_ok() {
                return Ok(());
            }
            sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server on port {} never became ready", self.port)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}
