use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Empty command")]
    EmptyCommand,
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A producer of text lines that can be asked to stop.
///
/// Implemented by [`ProcessSource`](crate::source::ProcessSource) for real
/// child processes; tests provide in-memory sources.
#[async_trait]
pub trait LineSource: Send {
    /// Returns the next line, or `None` once the output has closed.
    async fn next_line(&mut self) -> Option<String>;

    /// Requests termination without waiting for it. Must be a no-op once the
    /// producer has already exited or a request was already sent.
    fn terminate(&mut self);

    /// Waits for the producer to exit, escalating to a hard kill if it is
    /// still alive after `grace`.
    async fn wait(&mut self, grace: std::time::Duration) -> Result<(), SourceError>;
}
