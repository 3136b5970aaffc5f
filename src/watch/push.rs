//! Push subscription to the generation hub.
//!
//! One WebSocket per watch session, keyed by session id. The server pushes a
//! full step/action snapshot per frame; every decoded frame is delivered into
//! a bounded channel for the watcher's coordinator loop. Reconnection after
//! the initial connect is automatic and invisible to the consumer.

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::api::models::{Action, Snapshot, Step};

const RECONNECT_BACKOFF_START: Duration = Duration::from_secs(1);
const RECONNECT_BACKOFF_MAX: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum PushError {
    #[error("invalid hub URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("hub connection failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("push subscription unavailable")]
    Unavailable,
}

/// One decoded hub frame: the snapshot plus the frame's correlation ids,
/// which are opaque to the watcher.
#[derive(Debug)]
pub struct PushUpdate {
    pub project_id: serde_json::Value,
    pub action_id: serde_json::Value,
    pub snapshot: Snapshot,
}

/// Seam for establishing the push subscription, so tests can substitute a
/// connector that fails or scripts deliveries.
pub trait PushConnect {
    fn connect(
        &self,
        tx: mpsc::Sender<PushUpdate>,
    ) -> impl std::future::Future<Output = Result<PushChannel, PushError>>;
}

/// Connects to the generation hub over a WebSocket derived from the API base
/// URL (http → ws, https → wss).
pub struct HubConnector {
    hub_url: Url,
}

impl HubConnector {
    pub fn new(api_base: &Url, session_id: &str) -> Result<Self, PushError> {
        Ok(Self {
            hub_url: hub_url(api_base, session_id)?,
        })
    }
}

impl PushConnect for HubConnector {
    async fn connect(&self, tx: mpsc::Sender<PushUpdate>) -> Result<PushChannel, PushError> {
        let (ws, _) = connect_async(self.hub_url.as_str()).await?;
        debug!(url = %self.hub_url, "hub connected");
        Ok(PushChannel {
            ws,
            url: self.hub_url.clone(),
            tx,
        })
    }
}

fn hub_url(api_base: &Url, session_id: &str) -> Result<Url, PushError> {
    let mut url = api_base
        .join("hub/generator")
        .map_err(|e| PushError::InvalidUrl {
            url: api_base.to_string(),
            reason: e.to_string(),
        })?;

    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(PushError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{other}'"),
            })
        }
    };
    url.set_scheme(scheme).map_err(|_| PushError::InvalidUrl {
        url: url.to_string(),
        reason: "cannot derive websocket scheme".to_string(),
    })?;
    url.set_query(Some(&format!("sessionId={session_id}")));
    Ok(url)
}

/// An established hub subscription.
pub struct PushChannel {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    url: Url,
    tx: mpsc::Sender<PushUpdate>,
}

impl PushChannel {
    /// Pump frames into the update channel until cancelled. Connection drops
    /// after the initial connect are retried with backoff; a reconnect is not
    /// an update and delivers nothing by itself.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut backoff = RECONNECT_BACKOFF_START;
        loop {
            let reason = loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        // Best-effort close on shutdown.
                        let _ = self.ws.close(None).await;
                        return;
                    }
                    msg = self.ws.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(update) = parse_frame(&text) {
                                if self.tx.send(update).await.is_err() {
                                    // Consumer is gone; nothing left to do.
                                    let _ = self.ws.close(None).await;
                                    return;
                                }
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = self.ws.send(Message::Pong(payload)).await;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => break e.to_string(),
                        None => break "connection closed".to_string(),
                    }
                }
            };

            debug!("hub connection lost ({reason}), reconnecting");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(backoff) => {}
                }
                match connect_async(self.url.as_str()).await {
                    Ok((ws, _)) => {
                        debug!(url = %self.url, "hub reconnected");
                        self.ws = ws;
                        backoff = RECONNECT_BACKOFF_START;
                        break;
                    }
                    Err(e) => {
                        warn!("hub reconnect failed: {e}");
                        backoff = (backoff * 2).min(RECONNECT_BACKOFF_MAX);
                    }
                }
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HubFrame {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    project_id: serde_json::Value,
    #[serde(default)]
    action_id: serde_json::Value,
    #[serde(default)]
    all_actions: Vec<Action>,
    #[serde(default)]
    all_steps: Vec<Step>,
}

/// Decode one hub frame; anything that is not a well-formed generator status
/// update is dropped silently.
fn parse_frame(text: &str) -> Option<PushUpdate> {
    let frame: HubFrame = serde_json::from_str(text).ok()?;
    if !frame.kind.eq_ignore_ascii_case("updateGeneratorStatus") {
        debug!(kind = %frame.kind, "ignoring hub frame");
        return None;
    }
    Some(PushUpdate {
        project_id: frame.project_id,
        action_id: frame.action_id,
        snapshot: Snapshot {
            all_steps: frame.all_steps,
            all_actions: frame.all_actions,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_url_derivation() {
        let base = Url::parse("https://api.example.com/").unwrap();
        let url = hub_url(&base, "abc123").unwrap();
        assert_eq!(url.as_str(), "wss://api.example.com/hub/generator?sessionId=abc123");

        let base = Url::parse("http://localhost:5000/").unwrap();
        let url = hub_url(&base, "s").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:5000/hub/generator?sessionId=s");
    }

    #[test]
    fn test_hub_url_rejects_odd_schemes() {
        let base = Url::parse("ftp://example.com/").unwrap();
        assert!(matches!(
            hub_url(&base, "s"),
            Err(PushError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_parse_update_frame() {
        let update = parse_frame(
            r#"{"type":"updateGeneratorStatus","projectId":7,"actionId":2,
                "allSteps":[{"actionId":2,"description":"Build"}],
                "allActions":[{"id":2,"isCompleted":true,"elapsedTime":100}]}"#,
        )
        .unwrap();
        assert_eq!(update.snapshot.all_steps.len(), 1);
        assert_eq!(update.snapshot.all_actions.len(), 1);

        // Older server builds send the method name in PascalCase.
        assert!(parse_frame(r#"{"type":"UpdateGeneratorStatus"}"#).is_some());
    }

    #[test]
    fn test_parse_ignores_other_frames() {
        assert!(parse_frame(r#"{"type":"heartbeat"}"#).is_none());
        assert!(parse_frame("not json").is_none());
        assert!(parse_frame("{}").is_none());
    }
}
