//! Single-flight connection manager.
//!
//! Holds at most one backend session for the lifetime of the process. The state
//! lock serializes transitions; callers that arrive while an attempt is in
//! flight subscribe to its broadcast and wait for the shared outcome instead of
//! starting a second attempt.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{instrument, Instrument};

use crate::config::{Credentials, BROADCAST_CHANNEL_CAPACITY};

use super::backend::{ChannelSession, Connector};
use super::error::FetchError;

type ConnectOutcome = Result<Arc<dyn ChannelSession>, FetchError>;

/// Observable connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

enum ConnectionState {
    Disconnected,
    Connecting {
        tx: broadcast::Sender<ConnectOutcome>,
        started_at: Instant,
    },
    Connected(Arc<dyn ChannelSession>),
    Failed(FetchError),
}

impl ConnectionState {
    fn status(&self) -> ConnectionStatus {
        match self {
            ConnectionState::Disconnected => ConnectionStatus::Disconnected,
            ConnectionState::Connecting { .. } => ConnectionStatus::Connecting,
            ConnectionState::Connected(_) => ConnectionStatus::Connected,
            ConnectionState::Failed(_) => ConnectionStatus::Failed,
        }
    }
}

pub struct ConnectionManager {
    credentials: Credentials,
    connector: Arc<dyn Connector>,
    connect_timeout: Duration,
    state: Arc<Mutex<ConnectionState>>,
}

impl ConnectionManager {
    pub fn new(
        credentials: Credentials,
        connector: Arc<dyn Connector>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            credentials,
            connector,
            connect_timeout,
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
        }
    }

    /// Whether the credential bundle is complete enough to attempt a connection
    pub fn has_credentials(&self) -> bool {
        self.credentials.is_complete()
    }

    /// Connect if needed and report whether a session is available.
    pub async fn ensure_connected(&self) -> bool {
        self.session().await.is_ok()
    }

    pub async fn state(&self) -> ConnectionStatus {
        self.state.lock().await.status()
    }

    /// Return the live session, connecting on first use.
    ///
    /// The attempt itself runs on a detached task, so a caller that is
    /// dropped mid-connect never leaves the state stuck in `Connecting`.
    #[instrument(
        name = "telegram.connection.session",
        skip(self),
        fields(coalesced = false, duration_ms)
    )]
    pub async fn session(&self) -> Result<Arc<dyn ChannelSession>, FetchError> {
        let start = Instant::now();
        let mut state = self.state.lock().await;

        match &*state {
            ConnectionState::Connected(session) => return Ok(session.clone()),
            ConnectionState::Connecting { tx, started_at } => {
                let remaining = self.connect_timeout.saturating_sub(started_at.elapsed());
                if !remaining.is_zero() {
                    let rx = tx.subscribe();
                    drop(state); // Release lock while waiting
                    tracing::Span::current().record("coalesced", true);
                    return wait_for_outcome(rx, remaining).await;
                }
                tracing::debug!("Pending connection attempt timed out, starting new attempt");
            }
            ConnectionState::Disconnected | ConnectionState::Failed(_) => {}
        }

        let missing = self.credentials.missing_fields();
        if !missing.is_empty() {
            tracing::warn!(
                missing = ?missing,
                "Telegram credentials incomplete, live data disabled"
            );
            return Err(FetchError::MissingCredentials(missing.join(", ")));
        }

        let (tx, rx) = broadcast::channel(BROADCAST_CHANNEL_CAPACITY);
        *state = ConnectionState::Connecting {
            tx: tx.clone(),
            started_at: Instant::now(),
        };
        drop(state);
        self.spawn_connect(tx);

        let outcome = wait_for_outcome(rx, self.connect_timeout).await;
        tracing::Span::current().record("duration_ms", start.elapsed().as_millis() as u64);
        outcome
    }

    /// Run one connect attempt in the background, publishing the result to
    /// the shared state and to every subscriber of `tx`.
    fn spawn_connect(&self, tx: broadcast::Sender<ConnectOutcome>) {
        let connector = self.connector.clone();
        let credentials = self.credentials.clone();
        let state = self.state.clone();
        let connect_timeout = self.connect_timeout;

        let task = async move {
            tracing::info!("Connecting to Telegram");
            let outcome =
                match tokio::time::timeout(connect_timeout, connector.connect(&credentials)).await
                {
                    Ok(Ok(session)) => Ok(session),
                    Ok(Err(e)) => Err(FetchError::ConnectionFailure(e.to_string())),
                    Err(_) => Err(FetchError::ConnectionFailure(format!(
                        "Connect timed out after {}s",
                        connect_timeout.as_secs()
                    ))),
                };

            *state.lock().await = match &outcome {
                Ok(session) => {
                    tracing::info!("Telegram session established");
                    ConnectionState::Connected(session.clone())
                }
                Err(e) => {
                    tracing::error!(category = e.category(), error = %e, "Telegram connection failed");
                    ConnectionState::Failed(e.clone())
                }
            };
            let _ = tx.send(outcome);
        };
        tokio::spawn(task.instrument(tracing::info_span!("telegram.connection.connect")));
    }
}

async fn wait_for_outcome(
    mut rx: broadcast::Receiver<ConnectOutcome>,
    wait: Duration,
) -> ConnectOutcome {
    match tokio::time::timeout(wait, rx.recv()).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(_)) => Err(FetchError::ConnectionFailure(
            "Connection attempt abandoned".into(),
        )),
        Err(_) => Err(FetchError::ConnectionFailure("Connect timeout".into())),
    }
}
