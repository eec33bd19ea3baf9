use crate::app::ports::{LineSinkPort, LineSourcePort};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Reads UTF-8 text files, one record per line
pub struct FileLineSource;

#[async_trait]
impl LineSourcePort for FileLineSource {
    async fn read_lines(&self, location: &str) -> Result<Vec<String>, String> {
        let content = tokio::fs::read_to_string(location)
            .await
            .map_err(|e| format!("Failed to read '{}': {}", location, e))?;
        let lines: Vec<String> = content.lines().map(|l| l.to_string()).collect();
        debug!("Read {} lines from {}", lines.len(), location);
        Ok(lines)
    }
}

/// Writes the whole result set to a single file in one go.
pub struct FileLineSink {
    path: PathBuf,
}

impl FileLineSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/<prefix>_<uuid>.txt`, matching the naming of earlier runs.
    pub fn with_generated_name(dir: &Path, prefix: &str) -> Self {
        let name = format!("{}_{}.txt", prefix, uuid::Uuid::new_v4());
        Self::new(dir.join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LineSinkPort for FileLineSink {
    async fn write_lines(&self, lines: &[String]) -> Result<String, String> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| format!("Failed to create '{}': {}", dir.display(), e))?;
            }
        }

        let mut buf = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
        for line in lines {
            buf.push_str(line);
            buf.push('\n');
        }
        tokio::fs::write(&self.path, buf)
            .await
            .map_err(|e| format!("Failed to write '{}': {}", self.path.display(), e))?;

        let location = self.path.display().to_string();
        info!("Wrote {} lines to {}", lines.len(), location);
        Ok(location)
    }
}
