//! Work handles: the capability a task invokes when it runs.
//!
//! A work handle is stored on the [`Task`](crate::core::Task) at registration
//! time. The runner never inspects what a handle does, only whether the
//! future it returns resolves to `Ok` or to a [`WorkError`].

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Error raised by a unit of work.
///
/// Only the rendered message is kept in the run results.
#[derive(Error, Debug)]
pub enum WorkError {
    #[error("{0}")]
    Failed(String),

    #[error("command exited with {}: {stderr}", exit_label(.code))]
    Exit { code: Option<i32>, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "signal".to_string(),
    }
}

impl WorkError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl From<String> for WorkError {
    fn from(message: String) -> Self {
        Self::Failed(message)
    }
}

impl From<&str> for WorkError {
    fn from(message: &str) -> Self {
        Self::Failed(message.to_string())
    }
}

pub type WorkResult = std::result::Result<(), WorkError>;

/// A unit of ETL work that runs to completion or fails.
pub trait Work: Send + Sync {
    fn run(&self) -> BoxFuture<'_, WorkResult>;
}

/// Shared handle stored on a task.
pub type WorkHandle = Arc<dyn Work>;

/// Adapter turning an async closure into a [`Work`].
pub struct FnWork<F> {
    f: F,
}

impl<F, Fut> Work for FnWork<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = WorkResult> + Send + 'static,
{
    fn run(&self) -> BoxFuture<'_, WorkResult> {
        (self.f)().boxed()
    }
}

/// Wrap an async closure as a work handle.
///
/// ```ignore
/// let handle = work_fn(|| async { Ok(()) });
/// ```
pub fn work_fn<F, Fut>(f: F) -> WorkHandle
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = WorkResult> + Send + 'static,
{
    Arc::new(FnWork { f })
}
