use anyhow::Result;
use async_trait::async_trait;

/// Per-task work executed by the scheduler's workers.
#[async_trait]
pub trait TaskProcessor<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    /// Processes one task and returns its output lines. An empty vector
    /// means "nothing to report" and is not forwarded.
    async fn process(&self, task: T) -> Result<Vec<String>>;
}

/// Line-oriented sink for results and error reports.
#[async_trait]
pub trait LineWriter: Send + Sync {
    /// Appends `lines`, each terminated by a newline.
    async fn write(&self, lines: &[String]) -> Result<()>;

    /// Flushes and releases the sink. Calling it twice is a no-op.
    async fn close(&self) -> Result<()>;
}
