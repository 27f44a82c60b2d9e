//! `tempo cancel <id>` – signal a running `tempo run` to stop a job.

use anyhow::Result;
use tempo_core::model::JobId;

use crate::cli::control_socket;

pub async fn run_cancel(id: JobId) -> Result<()> {
    let path = tempo_core::control::default_control_socket_path()?;
    if control_socket::send_cancel(&path, id).await? {
        println!("Cancel requested for job {id}; its unfinished days stay pending.");
    } else {
        println!("No `tempo run` is active; nothing to cancel.");
    }
    Ok(())
}
