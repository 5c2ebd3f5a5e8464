//! Raw record to [`ContentItem`] conversion.
//!
//! Every input record yields exactly one item, in input order. Reshares and
//! quotes whose originals are not embedded cost one remote lookup each,
//! bounded by the lookup timeout. A lookup that fails or runs out of time
//! degrades the item instead of failing the batch.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use html_escape::decode_html_entities;
use serde_json::{json, Value};
use tokio::time::timeout;
use tracing::debug;

use crate::app::{Result, SluiceError};
use crate::domain::{ContentItem, Media, Post, RawRecord, TYPE_ORIGINAL, TYPE_QUOTE, TYPE_RESHARE};
use crate::profile::ProfileResolver;
use crate::remote::PlatformClient;

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(15);

pub struct ContentNormalizer {
    client: Arc<dyn PlatformClient>,
    profiles: Arc<ProfileResolver>,
    source: String,
    lookup_timeout: Duration,
}

impl ContentNormalizer {
    pub fn new(client: Arc<dyn PlatformClient>, profiles: Arc<ProfileResolver>, source: &str) -> Self {
        Self {
            client,
            profiles,
            source: source.to_string(),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_lookup_timeout(mut self, lookup_timeout: Duration) -> Self {
        self.lookup_timeout = lookup_timeout;
        self
    }

    pub async fn normalize(&self, records: &[RawRecord]) -> Vec<ContentItem> {
        join_all(records.iter().map(|record| self.normalize_one(record))).await
    }

    pub async fn normalize_one(&self, record: &RawRecord) -> ContentItem {
        match record {
            RawRecord::Original(post) => {
                let mut item = ContentItem::new(&self.source, &post.id, TYPE_ORIGINAL, post.timestamp);
                self.apply_post(&mut item, post).await;
                item
            }
            RawRecord::Quote {
                post,
                quoted_id,
                quoted,
            } => {
                let mut item = ContentItem::new(&self.source, &post.id, TYPE_QUOTE, post.timestamp);
                self.apply_post(&mut item, post).await;
                self.attach_quote(&mut item, quoted_id, quoted.as_deref()).await;
                item
            }
            RawRecord::Reshare {
                post,
                original,
                original_id,
            } => self.normalize_reshare(post, original.as_deref(), original_id.as_deref()).await,
        }
    }

    async fn normalize_reshare(
        &self,
        post: &Post,
        embedded: Option<&RawRecord>,
        original_id: Option<&str>,
    ) -> ContentItem {
        let mut item = ContentItem::new(&self.source, &post.id, TYPE_RESHARE, post.timestamp);
        item.set_meta(
            "resharedBy",
            json!({
                "userId": post.author.user_id,
                "username": post.author.handle,
            }),
        );

        let resolved: std::result::Result<RawRecord, &'static str> = match (embedded, original_id) {
            (Some(original), _) => Ok(original.clone()),
            (None, Some(id)) => match self.lookup(id).await {
                Ok(Some(original)) => Ok(original),
                Ok(None) => Err("not_found"),
                Err(e) => {
                    debug!(reshare = %post.id, original = id, error = %e, "original lookup failed");
                    Err(fallback_reason(&e))
                }
            },
            (None, None) => Err("missing_id"),
        };

        match resolved {
            Ok(original) => {
                let content = original.post();
                self.apply_post(&mut item, content).await;
                item.set_meta("originalId", content.id.as_str());
                item.set_meta("originalDate", content.timestamp);
                if let RawRecord::Quote {
                    quoted_id, quoted, ..
                } = &original
                {
                    self.attach_quote(&mut item, quoted_id, quoted.as_deref()).await;
                }
            }
            Err(reason) => {
                self.apply_post(&mut item, post).await;
                item.set_meta("resolutionFallback", reason);
            }
        }
        item
    }

    async fn attach_quote(&self, item: &mut ContentItem, quoted_id: &str, embedded: Option<&Post>) {
        let quoted = match embedded {
            Some(post) => Ok(post.clone()),
            None => match self.lookup(quoted_id).await {
                Ok(Some(record)) => Ok(record.post().clone()),
                Ok(None) => Err("not_found"),
                Err(e) => {
                    debug!(quoted = quoted_id, error = %e, "quoted lookup failed");
                    Err(fallback_reason(&e))
                }
            },
        };

        match quoted {
            Ok(post) => {
                let mut quoted_item = json!({
                    "id": post.id,
                    "text": post.text.as_deref().map(decode_text),
                    "link": post.link,
                    "author": post.author.handle,
                    "date": post.timestamp,
                });
                if let Some(avatar) = self.profiles.avatar(&post.author.handle).await {
                    quoted_item["avatar"] = Value::String(avatar);
                }
                item.set_meta("quotedItem", quoted_item);
            }
            Err(reason) => item.set_meta("quotedItemError", reason),
        }
    }

    /// One remote lookup raced against the deadline. The pending call is
    /// dropped when the deadline wins.
    async fn lookup(&self, id: &str) -> Result<Option<RawRecord>> {
        let wire = timeout(self.lookup_timeout, self.client.get_record_by_id(id))
            .await
            .map_err(|_| SluiceError::RemoteTimeout(self.lookup_timeout))??;
        wire.map(RawRecord::try_from).transpose()
    }

    async fn apply_post(&self, item: &mut ContentItem, post: &Post) {
        item.text = post.text.as_deref().map(decode_text);
        item.link = Some(post.link.clone());

        if let Some(user_id) = &post.author.user_id {
            item.set_meta("authorUserId", user_id.as_str());
        }
        item.set_meta("authorUsername", post.author.handle.as_str());
        if let Some(name) = &post.author.name {
            item.set_meta("authorName", name.as_str());
        }
        if let Some(avatar) = self.profiles.avatar(&post.author.handle).await {
            item.set_meta("authorAvatar", avatar);
        }

        item.set_meta("likes", post.likes);
        item.set_meta("replies", post.replies);
        item.set_meta("reshares", post.reshares);
        item.set_meta("isReply", post.is_reply);
        item.set_meta("isPin", post.is_pin);
        item.set_meta("photos", media_json(&post.photos));
        item.set_meta("videos", media_json(&post.videos));
        item.set_meta("urls", post.urls.clone());
        item.set_meta("hashtags", post.hashtags.clone());
        item.set_meta("mentions", post.mentions.clone());
        if let Some(conversation) = &post.conversation_id {
            item.set_meta("conversationId", conversation.as_str());
        }
        if let Some(reply_to) = &post.in_reply_to_id {
            item.set_meta("inReplyToId", reply_to.as_str());
        }
    }
}

fn decode_text(text: &str) -> String {
    decode_html_entities(text).to_string()
}

fn media_json(media: &[Media]) -> Value {
    Value::Array(
        media
            .iter()
            .map(|m| json!({ "url": m.url, "preview": m.preview }))
            .collect(),
    )
}

fn fallback_reason(error: &SluiceError) -> &'static str {
    match error {
        SluiceError::RemoteTimeout(_) => "timeout",
        SluiceError::InvalidRecord(_) => "invalid",
        _ => "error",
    }
}
