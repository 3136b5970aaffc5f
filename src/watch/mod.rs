//! Live generation-progress watching.
//!
//! The watcher subscribes to the per-session push hub and drives the
//! renderer/evaluator pair from a single coordinator loop fed by a bounded
//! channel. If the subscription cannot be established it switches, once and
//! permanently, to HTTP polling. Push delivery can also stall silently, so
//! every quiet period triggers an idle verification round against the status
//! endpoints. Completion is terminal: once declared, the watcher tears down
//! and returns.

pub mod evaluate;
pub mod poll;
pub mod push;
pub mod render;

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::models::{JobStatus, Snapshot};
use crate::api::{self, ApiClient};

use evaluate::Verdict;
use push::{PushConnect, PushUpdate};
use render::ProgressRenderer;

/// How long push delivery may stay quiet before a verification round.
const IDLE_VERIFY_DELAY: Duration = Duration::from_secs(5);
/// Fixed interval for the polling fallback.
const POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Bounded capacity of the coordinator's update channel.
const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// Terminal result of one watch session. `run` always returns one of these;
/// no failure escapes as a panic or error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    Completed,
    /// The server declared the session invalid.
    Failed,
    /// Stopped by user interrupt; a clean stop, not an error.
    Cancelled,
}

/// Status calls the watcher needs, seamed so tests can script responses.
pub trait StatusApi {
    async fn get_active_run(&self, session_id: &str) -> api::Result<Option<JobStatus>>;
    async fn get_generation_steps(&self) -> api::Result<Snapshot>;
}

impl StatusApi for ApiClient {
    async fn get_active_run(&self, session_id: &str) -> api::Result<Option<JobStatus>> {
        ApiClient::get_active_run(self, session_id).await
    }

    async fn get_generation_steps(&self) -> api::Result<Snapshot> {
        ApiClient::get_generation_steps(self).await
    }
}

pub struct GenerationWatcher<'a, S> {
    client: &'a S,
    session_id: &'a str,
    renderer: ProgressRenderer,
    cancel: CancellationToken,
}

impl<'a, S: StatusApi> GenerationWatcher<'a, S> {
    pub fn new(client: &'a S, session_id: &'a str) -> Self {
        Self {
            client,
            session_id,
            renderer: ProgressRenderer::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the watch session when cancelled; `run` wires ctrl-c
    /// to it, callers may hold a clone for programmatic shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Watch the session to completion. Always returns normally; transport
    /// problems downgrade to polling or are retried, they never escape.
    pub async fn run<P: PushConnect>(mut self, connector: &P) -> WatchOutcome {
        let ctrl_c_cancel = self.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctrl_c_cancel.cancel();
            }
        });

        // Paint the block immediately so the user sees state (or the waiting
        // placeholder) before the first push arrives.
        self.render_current_steps().await;

        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let outcome = match connector.connect(tx).await {
            Ok(channel) => {
                let pump = tokio::spawn(channel.run(self.cancel.clone()));
                let outcome = self.run_streaming(rx).await;
                self.cancel.cancel();
                // The subscription is closed before control returns.
                let _ = pump.await;
                outcome
            }
            Err(e) => {
                warn!("push subscription unavailable: {e}");
                println!("Falling back to HTTP polling...");
                drop(rx);
                self.run_polling().await
            }
        };

        self.cancel.cancel();
        self.renderer.reset_area();
        outcome
    }

    /// Coordinator loop for push mode: consume snapshot deliveries, and treat
    /// silence as a cue to verify against the status endpoints.
    async fn run_streaming(&mut self, mut rx: mpsc::Receiver<PushUpdate>) -> WatchOutcome {
        let cancel = self.cancel.clone();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return WatchOutcome::Cancelled,
                received = timeout(IDLE_VERIFY_DELAY, rx.recv()) => match received {
                    Ok(Some(update)) => {
                        debug!(project_id = %update.project_id, action_id = %update.action_id, "push update");
                        if let Some(outcome) = self.apply_snapshot(&update.snapshot, None) {
                            return outcome;
                        }
                    }
                    // Channel gone means the subscription shut down.
                    Ok(None) => return WatchOutcome::Cancelled,
                    Err(_) => {
                        if let Some(outcome) = self.verify_idle().await {
                            return outcome;
                        }
                    }
                }
            }
        }
    }

    /// Polling mode: pump statuses through the same channel shape and feed
    /// them to the identical render/evaluate path.
    async fn run_polling(&mut self) -> WatchOutcome {
        self.render_current_steps().await;

        let client = self.client;
        let session_id = self.session_id;
        let cancel = self.cancel.clone();
        let (tx, mut rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);

        let pump = poll::run(client, session_id, POLL_INTERVAL, tx, cancel.clone());
        let consume = async {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return WatchOutcome::Cancelled,
                    status = rx.recv() => match status {
                        Some(status) => {
                            if let Some(outcome) = self.handle_status(status).await {
                                return outcome;
                            }
                        }
                        None => {
                            // The poller stopped on its own: finished flag
                            // observed, or it noticed the cancellation first.
                            return if self.cancel.is_cancelled() {
                                WatchOutcome::Cancelled
                            } else {
                                WatchOutcome::Completed
                            };
                        }
                    }
                }
            }
        };

        let (_, outcome) = tokio::join!(pump, consume);
        outcome
    }

    /// One idle-verification round: check the run status, and on any answer
    /// re-render from the step breakdown. Transport failures are retried on
    /// the next quiet period.
    async fn verify_idle(&mut self) -> Option<WatchOutcome> {
        debug!("no push update for {IDLE_VERIFY_DELAY:?}, verifying via status API");
        let status = match self.client.get_active_run(self.session_id).await {
            Ok(status) => status?,
            Err(e) => {
                warn!("idle status check failed: {e}");
                return None;
            }
        };
        self.handle_status(status).await
    }

    async fn handle_status(&mut self, status: JobStatus) -> Option<WatchOutcome> {
        if status.is_invalid_session() {
            return Some(self.fail_invalid_session());
        }

        match self.client.get_generation_steps().await {
            Ok(snapshot) => self.apply_snapshot(&snapshot, Some(&status)),
            Err(e) => {
                debug!("step breakdown unavailable: {e}");
                if status.is_finished {
                    self.renderer.reset_area();
                    println!("Exiting watcher...");
                    self.cancel.cancel();
                    return Some(WatchOutcome::Completed);
                }
                None
            }
        }
    }

    /// Render a snapshot and evaluate it; `Some` means the session is over.
    fn apply_snapshot(
        &mut self,
        snapshot: &Snapshot,
        status: Option<&JobStatus>,
    ) -> Option<WatchOutcome> {
        self.renderer.render(snapshot);

        match evaluate::evaluate(Some(snapshot), status) {
            Verdict::StillRunning => None,
            Verdict::Completed => {
                self.renderer.reset_area();
                self.renderer.show_completion_summary(snapshot);
                println!("Exiting watcher...");
                self.cancel.cancel();
                Some(WatchOutcome::Completed)
            }
            Verdict::InvalidSession => Some(self.fail_invalid_session()),
        }
    }

    fn fail_invalid_session(&mut self) -> WatchOutcome {
        self.renderer.reset_area();
        println!("❌ Invalid generation session (run id -1). Exiting watcher...");
        self.cancel.cancel();
        WatchOutcome::Failed
    }

    async fn render_current_steps(&mut self) {
        let snapshot = match self.client.get_generation_steps().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!("could not fetch initial steps: {e}");
                Snapshot::default()
            }
        };
        self.renderer.render(&snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::push::{PushChannel, PushError};
    use super::*;
    use crate::api::models::{Action, Field, Step};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted status API: pops one response per call, repeating the last.
    #[derive(Default)]
    struct ScriptedApi {
        statuses: Mutex<VecDeque<Option<JobStatus>>>,
        snapshots: Mutex<VecDeque<Snapshot>>,
        status_calls: Mutex<usize>,
    }

    impl StatusApi for ScriptedApi {
        async fn get_active_run(&self, _session_id: &str) -> api::Result<Option<JobStatus>> {
            *self.status_calls.lock().unwrap() += 1;
            let mut statuses = self.statuses.lock().unwrap();
            match statuses.len() {
                0 => Ok(None),
                1 => Ok(statuses.front().cloned().unwrap()),
                _ => Ok(statuses.pop_front().unwrap()),
            }
        }

        async fn get_generation_steps(&self) -> api::Result<Snapshot> {
            let mut snapshots = self.snapshots.lock().unwrap();
            match snapshots.len() {
                0 => Ok(Snapshot::default()),
                1 => Ok(snapshots.front().cloned().unwrap()),
                _ => Ok(snapshots.pop_front().unwrap()),
            }
        }
    }

    /// Push connector that always fails, forcing the polling fallback.
    struct FailingPush;

    impl PushConnect for FailingPush {
        async fn connect(
            &self,
            _tx: mpsc::Sender<PushUpdate>,
        ) -> Result<PushChannel, PushError> {
            Err(PushError::Unavailable)
        }
    }

    fn running_status(run_id: i64) -> JobStatus {
        JobStatus {
            active_run_id: run_id,
            ..JobStatus::default()
        }
    }

    fn finished_status(run_id: i64) -> JobStatus {
        JobStatus {
            active_run_id: run_id,
            is_finished: true,
            ..JobStatus::default()
        }
    }

    fn step(action_id: i64, description: &str) -> Step {
        Step {
            action_id,
            description: description.to_string(),
        }
    }

    fn completed_action(id: i64) -> Action {
        Action {
            id,
            is_completed: true,
            elapsed_time: Field::Value(1000.0),
            ..Action::default()
        }
    }

    fn update(snapshot: Snapshot) -> PushUpdate {
        PushUpdate {
            project_id: serde_json::Value::Null,
            action_id: serde_json::Value::Null,
            snapshot,
        }
    }

    #[tokio::test]
    async fn test_streaming_completes_on_final_snapshot() {
        let client = ScriptedApi::default();
        let mut watcher = GenerationWatcher::new(&client, "session");

        let incomplete = Snapshot {
            all_steps: vec![step(1, "Build")],
            all_actions: vec![],
        };
        let complete = Snapshot {
            all_steps: vec![step(1, "Build")],
            all_actions: vec![completed_action(1)],
        };

        let (tx, rx) = mpsc::channel(4);
        tx.send(update(incomplete)).await.unwrap();
        tx.send(update(complete)).await.unwrap();

        let outcome = watcher.run_streaming(rx).await;
        assert_eq!(outcome, WatchOutcome::Completed);
        assert!(watcher.cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_streaming_cancel_is_clean_stop() {
        let client = ScriptedApi::default();
        let mut watcher = GenerationWatcher::new(&client, "session");
        watcher.cancel_token().cancel();

        let (_tx, rx) = mpsc::channel::<PushUpdate>(4);
        let outcome = watcher.run_streaming(rx).await;
        assert_eq!(outcome, WatchOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_streaming_idle_verification_detects_completion() {
        let client = ScriptedApi::default();
        client
            .statuses
            .lock()
            .unwrap()
            .push_back(Some(finished_status(7)));
        client.snapshots.lock().unwrap().push_back(Snapshot {
            all_steps: vec![step(1, "Build")],
            all_actions: vec![completed_action(1)],
        });

        let mut watcher = GenerationWatcher::new(&client, "session");
        let (_tx, rx) = mpsc::channel::<PushUpdate>(4);

        // No pushes ever arrive; the idle timer must find the finished run.
        let outcome = watcher.run_streaming(rx).await;
        assert_eq!(outcome, WatchOutcome::Completed);
        assert_eq!(*client.status_calls.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_streaming_invalid_session_fails() {
        let client = ScriptedApi::default();
        client
            .statuses
            .lock()
            .unwrap()
            .push_back(Some(running_status(JobStatus::INVALID_RUN_ID)));

        let mut watcher = GenerationWatcher::new(&client, "session");
        let (_tx, rx) = mpsc::channel::<PushUpdate>(4);

        let outcome = watcher.run_streaming(rx).await;
        assert_eq!(outcome, WatchOutcome::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_failure_falls_back_to_polling_until_finished() {
        let client = ScriptedApi::default();
        {
            let mut statuses = client.statuses.lock().unwrap();
            statuses.push_back(Some(running_status(7)));
            statuses.push_back(Some(running_status(7)));
            statuses.push_back(Some(finished_status(7)));
        }
        client.snapshots.lock().unwrap().push_back(Snapshot {
            all_steps: vec![step(1, "Build")],
            all_actions: vec![],
        });

        let watcher = GenerationWatcher::new(&client, "session");
        let outcome = watcher.run(&FailingPush).await;

        assert_eq!(outcome, WatchOutcome::Completed);
        // Scripted as: two running polls, then the finishing one.
        assert_eq!(*client.status_calls.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_on_invalid_session() {
        let client = ScriptedApi::default();
        client
            .statuses
            .lock()
            .unwrap()
            .push_back(Some(running_status(JobStatus::INVALID_RUN_ID)));

        let watcher = GenerationWatcher::new(&client, "session");
        let outcome = watcher.run(&FailingPush).await;
        assert_eq!(outcome, WatchOutcome::Failed);
    }

    #[tokio::test]
    async fn test_external_cancellation_ends_polling() {
        let client = ScriptedApi::default();
        let watcher = GenerationWatcher::new(&client, "session");
        let cancel = watcher.cancel_token();

        let (outcome, ()) = tokio::join!(watcher.run(&FailingPush), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });
        assert_eq!(outcome, WatchOutcome::Cancelled);
    }
}
