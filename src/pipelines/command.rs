//! Shell-command work handle.
//!
//! Each ETL pipeline is an external program (extract from the row store,
//! reshape, load into the warehouse). The runner only needs to start it and
//! see whether it exits cleanly.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::core::work::{Work, WorkError, WorkResult};
use crate::{elog_debug, elog_trace};

/// Runs `sh -c <command>` and treats a non-zero exit as failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandWork {
    command: String,
    working_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
}

impl CommandWork {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            working_dir: None,
            env: BTreeMap::new(),
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    async fn execute(&self) -> WorkResult {
        elog_debug!("Executing: sh -c {:?}", self.command);
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&self.command)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A timed-out attempt drops this future; take the child with it.
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            elog_trace!("{}: {}", self.command, stdout.trim());
        }

        if output.status.success() {
            Ok(())
        } else {
            Err(WorkError::Exit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl Work for CommandWork {
    fn run(&self) -> BoxFuture<'_, WorkResult> {
        self.execute().boxed()
    }
}
