//! Shared fixtures for integration tests: an in-memory backend and a manual clock.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};

use telefeed::config::{AppConfig, Credentials};
use telefeed::telegram::{
    BackendError, ChannelHandle, ChannelMessage, ChannelSession, Connector, ManualClock,
    PhotoBytes, PhotoRef, TelegramService,
};

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
}

pub fn credentials() -> Credentials {
    Credentials {
        api_id: Some("12345".to_string()),
        api_hash: Some("0123456789abcdef".to_string()),
        session: Some("1BVtsOKBu".to_string()),
    }
}

/// A text message with the given views, `id` minutes before the start time.
pub fn message(id: i64, views: u64) -> ChannelMessage {
    ChannelMessage {
        id,
        text: Some(format!("Post {}", id)),
        views: Some(views),
        reactions: Some(views / 20),
        replies: Some(views / 100),
        date: start_time() - chrono::Duration::minutes(id),
        photo: None,
    }
}

pub fn photo_message(id: i64, views: u64, location: &str) -> ChannelMessage {
    ChannelMessage {
        photo: Some(PhotoRef {
            location: location.to_string(),
        }),
        ..message(id, views)
    }
}

/// In-memory channel backend.
#[derive(Default)]
pub struct FakeSession {
    /// Channel username -> messages, newest first
    pub channels: HashMap<String, Vec<ChannelMessage>>,
    pub photos: HashMap<String, PhotoBytes>,
    pub scanned: AtomicUsize,
    pub resolves: AtomicUsize,
    pub fail_resolve: AtomicBool,
    pub fail_messages: AtomicBool,
    /// Never answer resolve calls
    pub stall_resolve: AtomicBool,
    /// Never yield a message
    pub stall_messages: AtomicBool,
}

impl FakeSession {
    pub fn with_channel(mut self, username: &str, messages: Vec<ChannelMessage>) -> Self {
        self.channels.insert(username.to_string(), messages);
        self
    }

    pub fn with_photo(mut self, location: &str, bytes: &[u8], content_type: &str) -> Self {
        self.photos.insert(
            location.to_string(),
            PhotoBytes {
                content_type: content_type.to_string(),
                bytes: bytes.to_vec(),
            },
        );
        self
    }

    pub fn scanned(&self) -> usize {
        self.scanned.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelSession for FakeSession {
    async fn resolve_channel(&self, username: &str) -> Result<ChannelHandle, BackendError> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        if self.stall_resolve.load(Ordering::SeqCst) {
            future::pending::<()>().await;
        }
        if self.fail_resolve.load(Ordering::SeqCst) || !self.channels.contains_key(username) {
            return Err(BackendError::new(format!("No user has \"{}\" as username", username)));
        }
        Ok(ChannelHandle {
            username: username.to_string(),
            title: username.to_string(),
        })
    }

    fn iter_messages<'a>(
        &'a self,
        channel: &'a ChannelHandle,
        limit: usize,
    ) -> BoxStream<'a, Result<ChannelMessage, BackendError>> {
        if self.stall_messages.load(Ordering::SeqCst) {
            return stream::pending::<Result<ChannelMessage, BackendError>>().boxed();
        }
        if self.fail_messages.load(Ordering::SeqCst) {
            return stream::once(async { Err(BackendError::new("FLOOD_WAIT_30")) }).boxed();
        }
        let messages = self
            .channels
            .get(&channel.username)
            .cloned()
            .unwrap_or_default();
        stream::iter(messages.into_iter().take(limit))
            .map(move |message| {
                self.scanned.fetch_add(1, Ordering::SeqCst);
                Ok(message)
            })
            .boxed()
    }

    async fn get_message(
        &self,
        channel: &ChannelHandle,
        message_id: i64,
    ) -> Result<Option<ChannelMessage>, BackendError> {
        Ok(self
            .channels
            .get(&channel.username)
            .and_then(|messages| messages.iter().find(|m| m.id == message_id))
            .cloned())
    }

    async fn download_photo(&self, photo: &PhotoRef) -> Result<PhotoBytes, BackendError> {
        self.photos
            .get(&photo.location)
            .cloned()
            .ok_or_else(|| BackendError::new("FILE_REFERENCE_EXPIRED"))
    }
}

/// Connector handing out a shared [`FakeSession`].
pub struct FakeConnector {
    pub session: Arc<FakeSession>,
    pub connects: AtomicUsize,
    pub fail: AtomicBool,
    pub delay: Duration,
}

impl FakeConnector {
    pub fn new(session: FakeSession) -> Self {
        Self {
            session: Arc::new(session),
            connects: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            delay: Duration::from_millis(20),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        _credentials: &Credentials,
    ) -> Result<Arc<dyn ChannelSession>, BackendError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(BackendError::new("AUTH_KEY_UNREGISTERED"));
        }
        Ok(self.session.clone())
    }
}

pub struct Harness {
    pub config: AppConfig,
    pub connector: Arc<FakeConnector>,
    pub clock: Arc<ManualClock>,
    pub service: TelegramService,
}

pub fn harness(config: AppConfig, credentials: Credentials, session: FakeSession) -> Harness {
    let connector = Arc::new(FakeConnector::new(session));
    let clock = Arc::new(ManualClock::new(start_time()));
    let service = TelegramService::new(&config, credentials, connector.clone(), clock.clone());
    Harness {
        config,
        connector,
        clock,
        service,
    }
}

/// Three channels of the default `fashion` category with distinct view counts.
pub fn fashion_session() -> FakeSession {
    FakeSession::default()
        .with_channel(
            "rogov24",
            vec![message(10, 9_000), message(9, 300), message(8, 4_000), message(7, 2_500)],
        )
        .with_channel(
            "burimovasasha",
            vec![message(20, 12_000), message(19, 800), message(18, 700)],
        )
        .with_channel(
            "zarina_brand",
            vec![message(30, 600), message(29, 20_000), message(28, 5_500)],
        )
}

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Route events emitted on this thread into the capture until the guard drops.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Config with a one second per-call backend timeout.
pub fn short_request_timeout(demo_fallback: bool) -> AppConfig {
    let mut config = AppConfig::default();
    config.telegram.request_timeout_seconds = 1;
    config.telegram.demo_fallback = demo_fallback;
    config
}
