//! Raw platform records.
//!
//! [`WireRecord`] mirrors what the remote bridge returns and is deliberately
//! loose. It is narrowed into the tagged [`RawRecord`] union at the ingestion
//! boundary; anything without an id, timestamp or author is rejected there.

use serde::{Deserialize, Serialize};

use crate::app::{Result, SluiceError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireMedia {
    pub id: Option<String>,
    pub url: Option<String>,
    pub preview: Option<String>,
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireMention {
    pub id: Option<String>,
    pub username: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireRecord {
    pub id: Option<String>,
    pub text: Option<String>,
    pub username: Option<String>,
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub timestamp: Option<i64>,
    pub permanent_url: Option<String>,
    pub photos: Vec<WireMedia>,
    pub videos: Vec<WireMedia>,
    pub urls: Vec<String>,
    pub hashtags: Vec<String>,
    pub mentions: Vec<WireMention>,
    pub likes: Option<u64>,
    pub replies: Option<u64>,
    pub retweets: Option<u64>,
    pub is_retweet: bool,
    pub is_quoted: bool,
    pub is_reply: bool,
    pub is_pin: bool,
    pub retweeted_status: Option<Box<WireRecord>>,
    pub retweeted_status_id: Option<String>,
    pub quoted_status: Option<Box<WireRecord>>,
    pub quoted_status_id: Option<String>,
    pub conversation_id: Option<String>,
    pub in_reply_to_status_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub handle: String,
    pub user_id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    pub url: String,
    pub preview: Option<String>,
}

/// Fields shared by every record variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    /// Epoch seconds.
    pub timestamp: i64,
    pub author: Author,
    pub text: Option<String>,
    pub link: String,
    pub photos: Vec<Media>,
    pub videos: Vec<Media>,
    pub urls: Vec<String>,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub likes: u64,
    pub replies: u64,
    pub reshares: u64,
    pub is_reply: bool,
    pub is_pin: bool,
    pub conversation_id: Option<String>,
    pub in_reply_to_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRecord {
    Original(Post),
    Reshare {
        post: Post,
        original: Option<Box<RawRecord>>,
        original_id: Option<String>,
    },
    Quote {
        post: Post,
        quoted_id: String,
        quoted: Option<Box<Post>>,
    },
}

impl RawRecord {
    pub fn post(&self) -> &Post {
        match self {
            RawRecord::Original(post) => post,
            RawRecord::Reshare { post, .. } => post,
            RawRecord::Quote { post, .. } => post,
        }
    }

    pub fn id(&self) -> &str {
        &self.post().id
    }

    pub fn timestamp(&self) -> i64 {
        self.post().timestamp
    }

}

impl TryFrom<WireRecord> for Post {
    type Error = SluiceError;

    fn try_from(wire: WireRecord) -> Result<Self> {
        Post::from_wire(&wire)
    }
}

impl Post {
    fn from_wire(wire: &WireRecord) -> Result<Self> {
        let id = non_empty(wire.id.as_deref())
            .ok_or_else(|| SluiceError::InvalidRecord("record without id".into()))?;
        let timestamp = wire
            .timestamp
            .ok_or_else(|| SluiceError::InvalidRecord(format!("record {} without timestamp", id)))?;
        let handle = non_empty(wire.username.as_deref())
            .ok_or_else(|| SluiceError::InvalidRecord(format!("record {} without author", id)))?;

        let link = non_empty(wire.permanent_url.as_deref())
            .unwrap_or_else(|| format!("https://x.com/{}/status/{}", handle, id));

        Ok(Post {
            author: Author {
                handle,
                user_id: non_empty(wire.user_id.as_deref()),
                name: non_empty(wire.name.as_deref()),
            },
            id,
            timestamp,
            text: wire.text.clone(),
            link,
            photos: media_list(&wire.photos),
            videos: media_list(&wire.videos),
            urls: wire.urls.clone(),
            hashtags: wire.hashtags.clone(),
            mentions: wire
                .mentions
                .iter()
                .filter_map(|m| non_empty(m.username.as_deref()))
                .collect(),
            likes: wire.likes.unwrap_or(0),
            replies: wire.replies.unwrap_or(0),
            reshares: wire.retweets.unwrap_or(0),
            is_reply: wire.is_reply,
            is_pin: wire.is_pin,
            conversation_id: non_empty(wire.conversation_id.as_deref()),
            in_reply_to_id: non_empty(wire.in_reply_to_status_id.as_deref()),
        })
    }
}

impl TryFrom<WireRecord> for RawRecord {
    type Error = SluiceError;

    fn try_from(wire: WireRecord) -> Result<Self> {
        let post = Post::from_wire(&wire)?;

        let is_reshare = wire.is_retweet
            || wire.retweeted_status.is_some()
            || wire.retweeted_status_id.is_some();
        if is_reshare {
            let embedded_id = wire.retweeted_status.as_ref().and_then(|r| r.id.clone());
            let original = match wire.retweeted_status {
                Some(embedded) => match RawRecord::try_from(*embedded) {
                    Ok(record) => Some(Box::new(record)),
                    Err(e) => {
                        tracing::debug!(record = %post.id, error = %e, "ignoring unusable embedded original");
                        None
                    }
                },
                None => None,
            };
            let original_id = non_empty(wire.retweeted_status_id.as_deref())
                .or_else(|| non_empty(embedded_id.as_deref()));
            return Ok(RawRecord::Reshare {
                post,
                original,
                original_id,
            });
        }

        let quoted_embedded_id = wire.quoted_status.as_ref().and_then(|q| q.id.clone());
        let quoted_id = non_empty(wire.quoted_status_id.as_deref())
            .or_else(|| non_empty(quoted_embedded_id.as_deref()));
        if let Some(quoted_id) = quoted_id {
            let quoted = wire
                .quoted_status
                .and_then(|q| Post::try_from(*q).ok())
                .map(Box::new);
            return Ok(RawRecord::Quote {
                post,
                quoted_id,
                quoted,
            });
        }

        Ok(RawRecord::Original(post))
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn media_list(media: &[WireMedia]) -> Vec<Media> {
    media
        .iter()
        .filter_map(|m| {
            non_empty(m.url.as_deref()).map(|url| Media {
                url,
                preview: non_empty(m.preview.as_deref()),
            })
        })
        .collect()
}
