//! Tools backed by an external program.
//!
//! The tool input is written to the child's stdin (strings verbatim,
//! structured input as JSON) and stdout becomes the result: parsed as
//! JSON when it parses, otherwise returned as text. A non-zero exit
//! status is an invocation failure carrying the child's stderr.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use super::{stringify_result, Tool};

/// Default wall-clock limit for a single invocation.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// A tool that runs `program args...` once per call.
#[derive(Debug, Clone)]
pub struct CommandTool {
    name: String,
    description: String,
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl CommandTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        program: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            program: program.into(),
            args,
            working_dir: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl Tool for CommandTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, input: Value) -> anyhow::Result<Value> {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("{}: spawn `{}` failed", self.name, self.program))?;

        let payload = stringify_result(&input);
        let stdin = child.stdin.take();
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok::<(), anyhow::Error>(());
            };
            // A child that never reads stdin may exit before we write.
            match stdin.write_all(payload.as_bytes()).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    tracing::debug!(tool = %self.name, "child closed stdin early");
                    Ok(())
                }
                Err(e) => Err(e).with_context(|| format!("{}: writing stdin failed", self.name)),
            }
            // Dropping stdin closes the pipe so the child sees EOF.
        };

        // Feed stdin while stdout drains; the timeout bounds both.
        let run = async {
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            fed?;
            output.with_context(|| format!("{}: wait failed", self.name))
        };

        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(result) => result?,
            Err(_elapsed) => anyhow::bail!(
                "{}: timed out after {}s (child killed)",
                self.name,
                self.timeout.as_secs_f64()
            ),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            anyhow::bail!(
                "{} exited with status {}: {}",
                self.name,
                output.status.code().unwrap_or(-1),
                if stderr.is_empty() { &stdout } else { &stderr }
            );
        }

        Ok(serde_json::from_str(&stdout).unwrap_or(Value::String(stdout)))
    }
}
