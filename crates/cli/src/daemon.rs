//! Process lifecycle for `steward serve`: PID file and shutdown signals.

use std::path::PathBuf;

use tokio::signal;
use tracing::{info, warn};

/// PID file written while the server runs.
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.steward/steward.pid`, or `./steward.pid` without `HOME`.
    pub fn default_path() -> PathBuf {
        crate::config::Config::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("steward.pid")
    }

    pub async fn write(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, std::process::id().to_string()).await?;
        info!(path = %self.path.display(), "PID file written");
        Ok(())
    }

    pub async fn remove(&self) {
        if tokio::fs::remove_file(&self.path).await.is_ok() {
            info!(path = %self.path.display(), "PID file removed");
        }
    }
}

/// Resolves on SIGINT or, on unix, SIGTERM.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received SIGINT, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!("SIGTERM handler unavailable ({e}); waiting for Ctrl-C only"),
        }
    }

    if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl-C, shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_ends_with_steward_pid() {
        let path = PidFile::default_path();
        assert!(path.to_string_lossy().ends_with("steward.pid"));
    }

    #[tokio::test]
    async fn write_and_remove_pid_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let pid_path = tmp.path().join("nested/steward.pid");
        let pid_file = PidFile::new(&pid_path);

        pid_file.write().await.expect("pid write");
        let written = tokio::fs::read_to_string(&pid_path)
            .await
            .expect("read pid");
        assert_eq!(written.parse::<u32>().expect("numeric pid"), std::process::id());

        pid_file.remove().await;
        assert!(!pid_path.exists());
        pid_file.remove().await;
    }
}
