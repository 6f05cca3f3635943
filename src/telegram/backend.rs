//! Backend capability traits.
//!
//! A [`Connector`] turns a credential bundle into a live [`ChannelSession`].
//! The service holds exactly one session for the process lifetime.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::Credentials;

use super::error::BackendError;
use super::{ChannelHandle, ChannelMessage, PhotoBytes, PhotoRef};

/// Opens a session with the messaging backend.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Start and authenticate a session from a complete credential bundle.
    async fn connect(&self, credentials: &Credentials)
        -> Result<Arc<dyn ChannelSession>, BackendError>;
}

/// Operations available on an established session.
#[async_trait]
pub trait ChannelSession: Send + Sync {
    /// Resolve a channel username to a handle. Unknown or inaccessible channels are errors.
    async fn resolve_channel(&self, username: &str) -> Result<ChannelHandle, BackendError>;

    /// Stream the channel's messages newest-first, yielding at most `limit` items.
    fn iter_messages<'a>(
        &'a self,
        channel: &'a ChannelHandle,
        limit: usize,
    ) -> BoxStream<'a, Result<ChannelMessage, BackendError>>;

    /// Fetch a single message by id.
    async fn get_message(
        &self,
        channel: &ChannelHandle,
        message_id: i64,
    ) -> Result<Option<ChannelMessage>, BackendError>;

    /// Download a photo attached to a message.
    async fn download_photo(&self, photo: &PhotoRef) -> Result<PhotoBytes, BackendError>;
}
