//! Append-only failure log for operators (`~/.newsrelay/log.txt`).
//! Fire-and-forget: a failing write is reported through tracing only.

use std::path::{Path, PathBuf};

use newsrelay_core::error::CycleError;
use newsrelay_core::types::EntityKey;
use tokio::io::AsyncWriteExt;

pub struct FailureLog {
    path: PathBuf,
}

impl FailureLog {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line: `<timestamp> [<entity>] <trigger> <kind>: <error>`.
    pub async fn record(&self, entity: &EntityKey, trigger: &str, error: &CycleError) {
        let line = format!(
            "{} [{}] {} {}: {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            entity,
            trigger,
            error.kind(),
            error
        );
        if let Err(e) = self.append_line(&line).await {
            tracing::warn!("⚠️ Failed to write failure log {}: {e}", self.path.display());
        }
    }

    async fn append_line(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsrelay_core::error::FetchError;
    use std::time::Duration;

    #[tokio::test]
    async fn test_appends_lines() {
        let dir = std::env::temp_dir().join(format!("newsrelay-test-faillog-{}", std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        let log = FailureLog::new(&dir.join("log.txt"));
        let entity = EntityKey::from("5");

        log.record(&entity, "18:00", &FetchError::Timeout(Duration::from_secs(10)).into())
            .await;
        log.record(&entity, "on-demand", &FetchError::Auth("rejected".into()).into())
            .await;

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[5] 18:00 fetch: fetch failed: timed out after 10s"));
        assert!(lines[1].contains("on-demand"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
