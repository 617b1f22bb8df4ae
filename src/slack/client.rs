//! Client for the Slack Web API.
//!
//! Uses reqwest with Bearer token auth. Covers the three calls the relay
//! needs: posting messages, reading channel history and downloading files.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::RelayError;
use crate::relay::{FileFetcher, MessageSink};
use crate::types::{ChannelType, EventFile, InboundEvent};

const SLACK_API_URL: &str = "https://slack.com/api";

/// Messages fetched per history page.
const HISTORY_PAGE_SIZE: u32 = 100;

/// A file attached to a Slack message.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackFile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub url_private: Option<String>,
    #[serde(default)]
    pub url_private_download: Option<String>,
}

/// A message as returned by `conversations.history`.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackMessage {
    pub ts: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub files: Vec<SlackFile>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    messages: Vec<SlackMessage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Slack channel ids starting with `D` are direct-message conversations.
pub fn channel_type_for(channel: &str) -> ChannelType {
    if channel.starts_with('D') {
        ChannelType::DirectMessage
    } else {
        ChannelType::Channel
    }
}

/// Convert a history message into an inbound event.
///
/// Returns None for bot messages (including the relay's own replies) and for
/// subtypes other than plain and file-share messages.
pub fn message_to_event(channel: &str, message: &SlackMessage) -> Option<InboundEvent> {
    if message.bot_id.is_some() {
        return None;
    }
    match message.subtype.as_deref() {
        None | Some("file_share") => {}
        Some(_) => return None,
    }

    let files = message
        .files
        .iter()
        .filter_map(|f| {
            let url = f
                .url_private_download
                .clone()
                .or_else(|| f.url_private.clone())?;
            Some(EventFile {
                id: f.id.clone(),
                name: f.name.clone().unwrap_or_default(),
                mime_type: f.mimetype.clone().unwrap_or_default(),
                url,
            })
        })
        .collect();

    Some(InboundEvent {
        channel: channel.to_string(),
        channel_type: channel_type_for(channel),
        user: message.user.clone(),
        ts: message.ts.clone(),
        files,
    })
}

pub struct SlackClient {
    client: reqwest::Client,
    token: String,
}

impl SlackClient {
    pub fn new(token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.to_string(),
        }
    }

    /// Post a message with `chat.postMessage`.
    pub async fn post_message(&self, channel: &str, text: &str) -> Result<(), RelayError> {
        let body = serde_json::json!({ "channel": channel, "text": text });
        let resp = self
            .client
            .post(format!("{}/chat.postMessage", SLACK_API_URL))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Delivery(format!("Slack request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(RelayError::Delivery(format!(
                "Slack API error {}: {}",
                status, text
            )));
        }

        let parsed: PostMessageResponse = resp
            .json()
            .await
            .map_err(|e| RelayError::Delivery(format!("Failed to parse Slack response: {}", e)))?;

        if !parsed.ok {
            return Err(RelayError::Delivery(
                parsed.error.unwrap_or_else(|| "unknown Slack error".to_string()),
            ));
        }
        Ok(())
    }

    /// Messages in `channel` newer than `oldest`, oldest first.
    pub async fn history_since(
        &self,
        channel: &str,
        oldest: &str,
    ) -> Result<Vec<SlackMessage>, RelayError> {
        let mut messages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![
                ("channel", channel.to_string()),
                ("oldest", oldest.to_string()),
                ("limit", HISTORY_PAGE_SIZE.to_string()),
            ];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            let resp = self
                .client
                .get(format!("{}/conversations.history", SLACK_API_URL))
                .bearer_auth(&self.token)
                .query(&query)
                .send()
                .await
                .map_err(|e| RelayError::Retrieval(format!("Slack request failed: {}", e)))?;

            if !resp.status().is_success() {
                return Err(RelayError::Retrieval(format!(
                    "Slack API error {}",
                    resp.status()
                )));
            }

            let page: HistoryResponse = resp.json().await.map_err(|e| {
                RelayError::Retrieval(format!("Failed to parse Slack history: {}", e))
            })?;

            if !page.ok {
                return Err(RelayError::Retrieval(
                    page.error.unwrap_or_else(|| "unknown Slack error".to_string()),
                ));
            }

            messages.extend(page.messages);

            cursor = page
                .response_metadata
                .and_then(|m| m.next_cursor)
                .filter(|c| !c.is_empty());
            if !page.has_more || cursor.is_none() {
                break;
            }
        }

        // Slack returns newest first.
        messages.sort_by(|a, b| compare_ts(&a.ts, &b.ts));
        Ok(messages)
    }

    /// Download a private file.
    pub async fn download_file(&self, url: &str) -> Result<Vec<u8>, RelayError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| RelayError::Retrieval(format!("download failed: {}", e)))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RelayError::Retrieval("file not found".to_string()));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(RelayError::Retrieval(format!(
                "not authorized to download file ({})",
                status
            )));
        }
        if !status.is_success() {
            return Err(RelayError::Retrieval(format!("download failed with {}", status)));
        }

        // Slack answers unauthorized file requests with its HTML sign-in page.
        let is_html = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("text/html"))
            .unwrap_or(false);
        if is_html {
            return Err(RelayError::Retrieval(
                "not authorized to download file (got a sign-in page; check the files:read scope)"
                    .to_string(),
            ));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| RelayError::Retrieval(format!("download interrupted: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

/// Order Slack timestamps (`seconds.micros`) numerically.
pub fn compare_ts(a: &str, b: &str) -> std::cmp::Ordering {
    let parse = |ts: &str| -> (u64, u64) {
        let (secs, frac) = ts.split_once('.').unwrap_or((ts, "0"));
        (secs.parse().unwrap_or(0), frac.parse().unwrap_or(0))
    };
    parse(a).cmp(&parse(b))
}

#[async_trait]
impl FileFetcher for SlackClient {
    async fn fetch(&self, file: &EventFile) -> Result<Vec<u8>, RelayError> {
        self.download_file(&file.url).await
    }
}

#[async_trait]
impl MessageSink for SlackClient {
    async fn send(&self, channel: &str, text: &str) -> Result<(), RelayError> {
        self.post_message(channel, text).await
    }
}
