//! Control socket: server (during `tempo run`) and client (for `tempo cancel`).
//! Protocol: one line per command, "cancel <id>".

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tempo_core::control::JobControl;
use tempo_core::model::JobId;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Parse one protocol line. Malformed lines yield None.
pub(crate) fn parse_command(line: &str) -> Option<JobId> {
    let rest = line.trim().strip_prefix("cancel ")?;
    rest.trim().parse().ok()
}

/// Spawns a task that listens on `path` and calls `job_control.request_cancel(id)`
/// for each "cancel <id>" line. Ignores malformed lines.
pub fn spawn_control_listener(
    job_control: Arc<JobControl>,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)?;
    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let control = Arc::clone(&job_control);
                    tokio::spawn(async move {
                        let mut reader = BufReader::new(stream).lines();
                        while let Ok(Some(line)) = reader.next_line().await {
                            match parse_command(&line) {
                                Some(id) => {
                                    let found = control.request_cancel(id);
                                    tracing::info!(job_id = id, found, "cancel requested over control socket");
                                }
                                None => tracing::debug!(%line, "ignoring control line"),
                            }
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

/// Sends "cancel <job_id>\n". Returns false if no listener is there.
pub async fn send_cancel(socket_path: &Path, job_id: JobId) -> Result<bool> {
    if !socket_path.exists() {
        return Ok(false);
    }
    let mut stream = match UnixStream::connect(socket_path).await {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    stream.write_all(format!("cancel {job_id}\n").as_bytes()).await?;
    stream.shutdown().await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cancel_lines() {
        assert_eq!(parse_command("cancel 7"), Some(7));
        assert_eq!(parse_command("  cancel  12 \n"), Some(12));
        assert_eq!(parse_command("pause 7"), None);
        assert_eq!(parse_command("cancel x"), None);
    }

    #[tokio::test]
    async fn listener_cancels_registered_job() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        let control = Arc::new(JobControl::new());
        let token = control.register(3);
        let handle = spawn_control_listener(Arc::clone(&control), &path).unwrap();

        assert!(send_cancel(&path, 3).await.unwrap());
        tokio::time::timeout(std::time::Duration::from_secs(5), token.cancelled())
            .await
            .unwrap();
        handle.abort();
    }

    #[tokio::test]
    async fn missing_socket_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!send_cancel(&dir.path().join("none.sock"), 1).await.unwrap());
    }
}
