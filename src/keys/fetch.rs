//! Remote key retrieval through an external command-line tool.
//!
//! The tool is run as `<tool> <parameters...> <uri>` and its standard output
//! is taken as the key-file content. Only its presence and exit status are
//! interpreted; the transport is entirely the tool's business.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::{Error, Result};

/// Fetch tool invocation settings.
#[derive(Debug, Clone)]
pub struct FetchTool {
    pub program: PathBuf,
    /// Shell-style parameter string placed before the URI.
    pub parameters: String,
    pub timeout: Duration,
}

impl FetchTool {
    pub fn new(program: impl Into<PathBuf>, parameters: impl Into<String>, timeout: Duration) -> Self {
        Self { program: program.into(), parameters: parameters.into(), timeout }
    }

    /// Runs the tool for `uri` and returns what it printed.
    ///
    /// The child is killed if the timeout elapses or the returned future is
    /// dropped.
    pub async fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        let mut args = shlex::split(&self.parameters).ok_or_else(|| Error::InvalidParameter(format!("malformed fetch parameters: {}", self.parameters)))?;
        args.push(uri.to_owned());

        tracing::info!(tool = %self.program.display(), uri, "fetching remote key");

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&self.program, &e))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output.map_err(|e| spawn_error(&self.program, &e))?,
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "fetch tool timed out");
                return Err(Error::FetchTimedOut);
            }
        };

        if !output.status.success() {
            tracing::warn!(status = %output.status, stderr = %String::from_utf8_lossy(&output.stderr).trim(), "fetch tool failed");
            return Err(Error::FetchNonZeroExit { code: output.status.code() });
        }

        tracing::debug!(size = output.stdout.len(), "remote key fetched");
        Ok(output.stdout)
    }
}

fn spawn_error(program: &Path, error: &std::io::Error) -> Error {
    if error.kind() == ErrorKind::NotFound {
        Error::FetchToolNotFound(program.to_path_buf())
    } else {
        Error::CannotOpenEncryptionKey { path: program.to_path_buf(), reason: error.to_string() }
    }
}
