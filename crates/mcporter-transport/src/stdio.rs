//! Stdio transport (C5): a child process speaking newline-framed JSON-RPC
//! over its stdin/stdout pipes; stderr is piped (never inherited) and
//! buffered by the [`crate::reaper`].
//!
//! Grounded on `child_process::ChildProcessTransport`'s STDIN-writer /
//! STDOUT-reader task-pair pattern, adapted to carry `serde_json::Value`
//! messages instead of raw strings and to route stderr through the
//! reaper's ring instead of only logging it.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use mcporter_config::placeholder;
use mcporter_core::{Result, RuntimeError};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex as TokioMutex};

use crate::reaper::{self, StderrRing};
use mcporter_wire::Transport;

const CHANNEL_CAPACITY: usize = 256;

/// Resolve `env`'s placeholders, dropping entries whose resolved value is
/// empty (spec.md §4.5).
pub fn resolve_env(env: &HashMap<String, String>) -> Result<Vec<(String, String)>> {
    let mut resolved = Vec::with_capacity(env.len());
    for (key, template) in env {
        let value = placeholder::resolve(template)?;
        if !value.is_empty() {
            resolved.push((key.clone(), value));
        }
    }
    Ok(resolved)
}

/// A connected stdio child process.
pub struct StdioTransport {
    label: String,
    connected: Arc<StdMutex<bool>>,
    child: Arc<TokioMutex<Option<Child>>>,
    stdin_tx: TokioMutex<Option<mpsc::Sender<Value>>>,
    stdout_rx: TokioMutex<Option<mpsc::Receiver<Value>>>,
    stderr: StderrRing,
    tasks: StdMutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl StdioTransport {
    /// Spawn `command args` in `cwd` with `env` applied on top of the
    /// inherited process environment, and start the stdin/stdout/stderr
    /// pump tasks.
    pub async fn spawn(
        command: &str,
        args: &[String],
        cwd: &Path,
        env: &HashMap<String, String>,
    ) -> Result<Self> {
        if command.is_empty() {
            return Err(RuntimeError::TransportFailure("stdio command is empty".into()));
        }

        let mut cmd = Command::new(command);
        cmd.args(args)
            .current_dir(cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in resolve_env(env)? {
            cmd.env(key, value);
        }

        let label = format!("{command} {}", args.join(" "));
        let mut child = cmd.spawn().map_err(|e| {
            RuntimeError::TransportFailure(format!("failed to spawn `{label}`: {e}"))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RuntimeError::TransportFailure("child did not expose stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RuntimeError::TransportFailure("child did not expose stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RuntimeError::TransportFailure("child did not expose stderr".into()))?;

        let (stdin_tx, mut stdin_rx) = mpsc::channel::<Value>(CHANNEL_CAPACITY);
        let stdin_task = tokio::spawn(async move {
            let mut writer = BufWriter::new(stdin);
            while let Some(message) = stdin_rx.recv().await {
                let Ok(mut line) = serde_json::to_vec(&message) else { continue };
                line.push(b'\n');
                if writer.write_all(&line).await.is_err() || writer.flush().await.is_err() {
                    break;
                }
            }
        });

        let (stdout_tx, stdout_rx) = mpsc::channel::<Value>(CHANNEL_CAPACITY);
        let stdout_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Ok(value) = serde_json::from_str::<Value>(&line) {
                    if stdout_tx.send(value).await.is_err() {
                        break;
                    }
                } else {
                    tracing::debug!(line, "ignoring non-JSON line on stdio transport stdout");
                }
            }
        });

        let ring = StderrRing::new();
        let stderr_task = ring.spawn_reader(stderr);

        Ok(Self {
            label,
            connected: Arc::new(StdMutex::new(true)),
            child: Arc::new(TokioMutex::new(Some(child))),
            stdin_tx: TokioMutex::new(Some(stdin_tx)),
            stdout_rx: TokioMutex::new(Some(stdout_rx)),
            stderr: ring,
            tasks: StdMutex::new(vec![stdin_task, stdout_task, stderr_task]),
        })
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&self, message: Value) -> Result<()> {
        if !*self.connected.lock().expect("stdio connected flag poisoned") {
            return Err(RuntimeError::TransportFailure("stdio transport is closed".into()));
        }
        let guard = self.stdin_tx.lock().await;
        let sender = guard
            .as_ref()
            .ok_or_else(|| RuntimeError::TransportFailure("stdio transport is closed".into()))?;
        sender
            .send(message)
            .await
            .map_err(|_| RuntimeError::TransportFailure("stdio child's stdin channel closed".into()))
    }

    async fn recv(&self) -> Result<Value> {
        let mut guard = self.stdout_rx.lock().await;
        let receiver = guard
            .as_mut()
            .ok_or_else(|| RuntimeError::TransportFailure("stdio transport is closed".into()))?;
        receiver
            .recv()
            .await
            .ok_or_else(|| RuntimeError::TransportFailure("stdio child's stdout closed".into()))
    }

    async fn close(&self) -> Result<()> {
        *self.connected.lock().expect("stdio connected flag poisoned") = false;
        self.stdin_tx.lock().await.take();
        self.stdout_rx.lock().await.take();

        let mut child_guard = self.child.lock().await;
        let exit_code = if let Some(mut child) = child_guard.take() {
            let outcome = reaper::reap(&mut child).await;
            tracing::debug!(command = %self.label, ?outcome, "stdio child reaped");
            child.try_wait().ok().flatten().and_then(|s| s.code())
        } else {
            None
        };
        drop(child_guard);

        for task in self.tasks.lock().expect("stdio tasks mutex poisoned").drain(..) {
            task.abort();
        }
        self.stderr.log_if_noteworthy(&self.label, exit_code);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_newline_delimited_json() {
        let transport = StdioTransport::spawn("cat", &[], Path::new("."), &HashMap::new())
            .await
            .unwrap();

        transport.send(serde_json::json!({"hello": "world"})).await.unwrap();
        let echoed = transport.recv().await.unwrap();
        assert_eq!(echoed, serde_json::json!({"hello": "world"}));

        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn rejects_empty_command() {
        let err = StdioTransport::spawn("", &[], Path::new("."), &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::TransportFailure(_)));
    }

    #[test]
    fn resolve_env_drops_empty_values() {
        std::env::remove_var("MCPORTER_TEST_EMPTY_VAR");
        let mut env = HashMap::new();
        env.insert("API_KEY".to_string(), "${MCPORTER_TEST_EMPTY_VAR:-}".to_string());
        env.insert("MODE".to_string(), "production".to_string());

        let resolved = resolve_env(&env).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0], ("MODE".to_string(), "production".to_string()));
    }
}
