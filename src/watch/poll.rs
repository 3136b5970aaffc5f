//! HTTP polling fallback for when the push subscription cannot be
//! established. Never runs concurrently with the push channel; the switch is
//! one-way for the life of a watch session.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::api::models::JobStatus;

use super::StatusApi;

/// Poll the active-run endpoint at a fixed interval, delivering every
/// non-absent status into `updates`.
///
/// The loop ends on its own when a finished status is observed, when the
/// receiver is dropped, or when `cancel` fires — cancellation aborts the
/// inter-poll sleep immediately and delivers nothing further. Transport
/// errors are logged and retried on the next tick.
pub async fn run<S: StatusApi>(
    client: &S,
    session_id: &str,
    interval: Duration,
    updates: mpsc::Sender<JobStatus>,
    cancel: CancellationToken,
) {
    while !cancel.is_cancelled() {
        match client.get_active_run(session_id).await {
            Ok(Some(status)) => {
                let finished = status.is_finished;
                if updates.send(status).await.is_err() {
                    return;
                }
                if finished {
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => warn!("status poll failed, retrying: {e}"),
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
