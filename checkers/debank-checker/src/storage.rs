//! Output sinks: the per-address error log and the buffered file writer.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use core_logic::LineWriter;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

const WRITE_BUFFER: usize = 64 * 1024;

/// Messages grouped by context (usually an address), kept in arrival order
/// within each group. Groups are reported in key order.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Mutex<BTreeMap<String, Vec<String>>>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_error(&self, context: &str, message: impl Into<String>) {
        self.errors
            .lock()
            .entry(context.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.lock().is_empty()
    }

    pub fn errors_for(&self, context: &str) -> Vec<String> {
        self.errors.lock().get(context).cloned().unwrap_or_default()
    }

    /// The report as written by [`write_errors`](Self::write_errors).
    pub fn report_lines(&self) -> Vec<String> {
        let errors = self.errors.lock();
        if errors.is_empty() {
            return vec!["\n\n=== NO PROCESSING ERRORS FOUND ===\n".to_string()];
        }

        let mut lines = vec!["\n\n=== PROCESSING ERRORS ===\n".to_string()];
        for (context, messages) in errors.iter() {
            lines.push(format!("\n[{}] errors:", context));
            lines.extend(messages.iter().map(|m| format!("  - {}", m)));
        }
        lines
    }

    pub async fn write_errors(&self, writer: &dyn LineWriter) -> Result<()> {
        let lines = self.report_lines();
        tracing::debug!("Writing {} error lines", lines.len());
        writer.write(&lines).await
    }
}

/// Appends lines to a file through a 64 KiB buffer, flushing after every
/// write call.
pub struct FileWriter {
    path: PathBuf,
    inner: tokio::sync::Mutex<Option<BufWriter<File>>>,
}

impl FileWriter {
    /// Creates (or truncates) `path`, making parent directories as needed.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let file = File::create(&path)
            .await
            .with_context(|| format!("Failed to create file {}", path.display()))?;

        Ok(Self {
            path,
            inner: tokio::sync::Mutex::new(Some(BufWriter::with_capacity(WRITE_BUFFER, file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LineWriter for FileWriter {
    async fn write(&self, lines: &[String]) -> Result<()> {
        if lines.is_empty() {
            return Ok(());
        }

        let mut guard = self.inner.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| anyhow!("writer for {} is closed", self.path.display()))?;

        for line in lines {
            writer
                .write_all(line.as_bytes())
                .await
                .context("failed to write line")?;
            writer.write_all(b"\n").await.context("failed to write line")?;
        }
        writer.flush().await.context("failed to flush buffer")
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        if let Some(mut writer) = guard.take() {
            writer.flush().await.context("failed to flush buffer")?;
            writer
                .into_inner()
                .sync_all()
                .await
                .context("failed to close file")?;
        }
        Ok(())
    }
}
