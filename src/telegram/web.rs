//! Channel web preview backend.
//!
//! Reads the public preview pages served at `https://t.me/s/<channel>`. The
//! preview lists the newest messages of a public channel with their view
//! counts, reactions and photo links. Older pages are requested with
//! `?before=<message id>`. Only public channels are reachable this way; the
//! credential bundle still gates whether a session is opened at all.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use scraper::{ElementRef, Html, Selector};

use crate::config::{
    Credentials, TelegramSettings, DEFAULT_PHOTO_CONTENT_TYPE, ENV_API_ID, WEB_PREVIEW_USER_AGENT,
};

use super::backend::{ChannelSession, Connector};
use super::error::BackendError;
use super::{ChannelHandle, ChannelMessage, PhotoBytes, PhotoRef};

/// Strip the `@`, `t.me/` and `https://t.me/` forms down to a bare username.
pub fn normalize_channel(input: &str) -> String {
    let mut name = input.trim();
    for prefix in ["https://", "http://"] {
        name = name.strip_prefix(prefix).unwrap_or(name);
    }
    name = name.strip_prefix("t.me/").unwrap_or(name);
    name = name.strip_prefix("s/").unwrap_or(name);
    name = name.strip_prefix('@').unwrap_or(name);
    name.trim_end_matches('/').to_string()
}

/// Opens sessions against the public web preview.
///
/// `connect` only checks that the api id parses as a number and that the
/// preview host answers. The api hash and session string are never sent
/// anywhere, so a wrong hash or an expired session still connects; only
/// public channels can be read.
pub struct WebPreviewConnector {
    base_url: String,
    timeout: Duration,
}

impl WebPreviewConnector {
    pub fn new(settings: &TelegramSettings) -> Self {
        Self {
            base_url: settings.web_base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(settings.request_timeout_seconds),
        }
    }
}

#[async_trait]
impl Connector for WebPreviewConnector {
    async fn connect(
        &self,
        credentials: &Credentials,
    ) -> Result<Arc<dyn ChannelSession>, BackendError> {
        if credentials.api_id_number().is_none() {
            return Err(BackendError::new(format!("{} is not a number", ENV_API_ID)));
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(WEB_PREVIEW_USER_AGENT)
            .build()?;

        client
            .get(&self.base_url)
            .send()
            .await?
            .error_for_status()?;

        tracing::debug!(base_url = %self.base_url, "Web preview reachable");
        Ok(Arc::new(WebPreviewSession {
            client,
            base_url: self.base_url.clone(),
            selectors: Arc::new(PreviewSelectors::new()?),
        }))
    }
}

pub struct WebPreviewSession {
    client: reqwest::Client,
    base_url: String,
    selectors: Arc<PreviewSelectors>,
}

impl WebPreviewSession {
    async fn fetch_page(
        &self,
        username: &str,
        before: Option<i64>,
    ) -> Result<Vec<ChannelMessage>, BackendError> {
        let mut url = format!("{}/s/{}", self.base_url, urlencoding::encode(username));
        if let Some(before) = before {
            url.push_str(&format!("?before={}", before));
        }

        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let mut messages = parse_messages(&body, &self.selectors);
        messages.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(messages)
    }
}

struct PageCursor {
    before: Option<i64>,
    buffered: VecDeque<ChannelMessage>,
    remaining: usize,
    exhausted: bool,
}

#[async_trait]
impl ChannelSession for WebPreviewSession {
    async fn resolve_channel(&self, username: &str) -> Result<ChannelHandle, BackendError> {
        let username = normalize_channel(username);
        let url = format!("{}/s/{}", self.base_url, urlencoding::encode(&username));
        let response = self.client.get(&url).send().await?;

        // Private or unknown channels redirect away from the preview
        if !response.url().path().starts_with("/s/") {
            return Err(BackendError::new("Channel has no public preview"));
        }

        let body = response.error_for_status()?.text().await?;
        let title = parse_channel_title(&body, &self.selectors)
            .ok_or_else(|| BackendError::new("Channel has no public preview"))?;

        Ok(ChannelHandle { username, title })
    }

    fn iter_messages<'a>(
        &'a self,
        channel: &'a ChannelHandle,
        limit: usize,
    ) -> BoxStream<'a, Result<ChannelMessage, BackendError>> {
        let cursor = PageCursor {
            before: None,
            buffered: VecDeque::new(),
            remaining: limit,
            exhausted: false,
        };

        stream::unfold(cursor, move |mut cursor| async move {
            if cursor.remaining == 0 {
                return None;
            }

            if cursor.buffered.is_empty() && !cursor.exhausted {
                match self.fetch_page(&channel.username, cursor.before).await {
                    Ok(page) => {
                        let page: Vec<_> = page
                            .into_iter()
                            .filter(|m| cursor.before.map_or(true, |before| m.id < before))
                            .collect();
                        match page.last() {
                            Some(oldest) => cursor.before = Some(oldest.id),
                            None => cursor.exhausted = true,
                        }
                        cursor.buffered.extend(page);
                    }
                    Err(e) => {
                        cursor.remaining = 0;
                        return Some((Err(e), cursor));
                    }
                }
            }

            let message = cursor.buffered.pop_front()?;
            cursor.remaining -= 1;
            Some((Ok(message), cursor))
        })
        .boxed()
    }

    async fn get_message(
        &self,
        channel: &ChannelHandle,
        message_id: i64,
    ) -> Result<Option<ChannelMessage>, BackendError> {
        let url = format!(
            "{}/{}/{}?embed=1&mode=tme",
            self.base_url,
            urlencoding::encode(&channel.username),
            message_id
        );
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response.error_for_status()?.text().await?;
        Ok(parse_messages(&body, &self.selectors)
            .into_iter()
            .find(|m| m.id == message_id))
    }

    async fn download_photo(&self, photo: &PhotoRef) -> Result<PhotoBytes, BackendError> {
        let response = self
            .client
            .get(&photo.location)
            .send()
            .await?
            .error_for_status()?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(DEFAULT_PHOTO_CONTENT_TYPE)
            .to_string();
        let bytes = response.bytes().await?.to_vec();

        Ok(PhotoBytes {
            content_type,
            bytes,
        })
    }
}

// =============================================================================
// Preview markup parsing
// =============================================================================

struct PreviewSelectors {
    message: Selector,
    text: Selector,
    views: Selector,
    time: Selector,
    photo: Selector,
    reaction: Selector,
    replies: Selector,
    title: Selector,
}

impl PreviewSelectors {
    fn new() -> Result<Self, BackendError> {
        Ok(Self {
            message: selector("div.tgme_widget_message[data-post]")?,
            text: selector(".tgme_widget_message_text")?,
            views: selector(".tgme_widget_message_views")?,
            time: selector("time[datetime]")?,
            photo: selector("a.tgme_widget_message_photo_wrap")?,
            reaction: selector(".tgme_reaction")?,
            replies: selector(".tgme_widget_message_replies_count")?,
            title: selector(".tgme_channel_info_header_title")?,
        })
    }
}

fn selector(css: &str) -> Result<Selector, BackendError> {
    Selector::parse(css).map_err(|e| BackendError::new(format!("Bad selector {}: {:?}", css, e)))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join("").trim().to_string()
}

fn parse_channel_title(html: &str, selectors: &PreviewSelectors) -> Option<String> {
    let document = Html::parse_document(html);
    let title = element_text(document.select(&selectors.title).next()?);
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// Extract every message widget from a preview or embed page.
fn parse_messages(html: &str, selectors: &PreviewSelectors) -> Vec<ChannelMessage> {
    let document = Html::parse_document(html);
    document
        .select(&selectors.message)
        .filter_map(|widget| parse_message(widget, selectors))
        .collect()
}

fn parse_message(widget: ElementRef<'_>, selectors: &PreviewSelectors) -> Option<ChannelMessage> {
    let id = widget
        .value()
        .attr("data-post")?
        .rsplit('/')
        .next()?
        .parse::<i64>()
        .ok()?;

    // Service messages (pins, title changes) carry no timestamp
    let date = widget
        .select(&selectors.time)
        .next()?
        .value()
        .attr("datetime")
        .and_then(|value| DateTime::parse_from_rfc3339(value).ok())?
        .with_timezone(&Utc);

    let text = widget
        .select(&selectors.text)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty());

    let views = widget
        .select(&selectors.views)
        .next()
        .and_then(|views| parse_count(&element_text(views)));

    let reactions = widget
        .select(&selectors.reaction)
        .map(|reaction| trailing_count(&element_text(reaction)))
        .fold(None, |total: Option<u64>, count| match count {
            Some(count) => Some(total.unwrap_or(0) + count),
            None => total,
        });

    let replies = widget
        .select(&selectors.replies)
        .next()
        .and_then(|replies| trailing_count(&element_text(replies)));

    let photo = widget
        .select(&selectors.photo)
        .next()
        .and_then(|wrap| wrap.value().attr("style"))
        .and_then(background_image_url)
        .map(|location| PhotoRef { location });

    Some(ChannelMessage {
        id,
        text,
        views,
        reactions,
        replies,
        date,
        photo,
    })
}

/// Parse a compact count such as `987`, `1.2K` or `3M`.
pub(crate) fn parse_count(raw: &str) -> Option<u64> {
    let raw = raw.trim().replace(',', "");
    let (number, multiplier) = match raw.chars().last()? {
        'K' | 'k' => (&raw[..raw.len() - 1], 1_000f64),
        'M' | 'm' => (&raw[..raw.len() - 1], 1_000_000f64),
        _ => (raw.as_str(), 1f64),
    };
    let value: f64 = number.trim().parse().ok()?;
    if value < 0.0 {
        return None;
    }
    Some((value * multiplier).round() as u64)
}

/// Count at the end of a label like `👍 1.2K` or `12 comments`.
fn trailing_count(label: &str) -> Option<u64> {
    label
        .split_whitespace()
        .rev()
        .find_map(|token| parse_count(token.trim_start_matches(|c: char| !c.is_ascii_digit())))
}

/// URL inside a `background-image:url('...')` style declaration.
fn background_image_url(style: &str) -> Option<String> {
    let start = style.find("url(")? + "url(".len();
    let end = start + style[start..].find(')')?;
    let url = style[start..end].trim().trim_matches(|c| c == '\'' || c == '"');
    if url.is_empty() {
        None
    } else {
        Some(url.to_string())
    }
}
