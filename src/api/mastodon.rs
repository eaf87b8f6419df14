//! Mastodon API client

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::error::FetchError;
use crate::models::{Post, PostId, TimelineKind};

use super::PageFetcher;

/// Mastodon API client
#[derive(Debug, Clone)]
pub struct MastodonClient {
    client: Client,
    instance: String,
    access_token: Option<String>,
}

impl MastodonClient {
    /// Create a new Mastodon client; public timelines work without a token
    pub fn new(instance: &str, access_token: Option<String>) -> Self {
        let instance = instance.trim_end_matches('/');
        let instance = if instance.starts_with("http://") || instance.starts_with("https://") {
            instance.to_string()
        } else {
            format!("https://{instance}")
        };

        Self {
            client: Client::new(),
            instance,
            access_token,
        }
    }

    /// Base URL of the instance
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Page source for one timeline of this instance
    pub fn timeline(&self, kind: TimelineKind) -> MastodonTimeline {
        MastodonTimeline {
            client: self.clone(),
            kind,
        }
    }

    /// Build API URL
    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/api/v1{}", self.instance, endpoint)
    }

    async fn statuses(&self, url: &str) -> Result<Vec<Post>, FetchError> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.access_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let statuses: Vec<MastodonStatus> =
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))?;

        Ok(statuses
            .into_iter()
            .map(MastodonStatus::into_post)
            .collect())
    }
}

/// One timeline of a Mastodon instance, paged with `max_id`
#[derive(Debug, Clone)]
pub struct MastodonTimeline {
    client: MastodonClient,
    kind: TimelineKind,
}

impl MastodonTimeline {
    /// Timeline kind served
    pub const fn kind(&self) -> &TimelineKind {
        &self.kind
    }

    fn page_url(&self, cursor: Option<&PostId>, limit: usize) -> String {
        let (endpoint, mut query) = match &self.kind {
            TimelineKind::Home => ("/timelines/home".to_string(), Vec::new()),
            TimelineKind::Local => (
                "/timelines/public".to_string(),
                vec!["local=true".to_string()],
            ),
            TimelineKind::Federated => ("/timelines/public".to_string(), Vec::new()),
            TimelineKind::Hashtag(tag) => (
                format!("/timelines/tag/{}", urlencoding::encode(tag)),
                Vec::new(),
            ),
            TimelineKind::Account(id) => (
                format!("/accounts/{}/statuses", urlencoding::encode(id)),
                Vec::new(),
            ),
        };

        query.push(format!("limit={limit}"));
        if let Some(cursor) = cursor {
            query.push(format!("max_id={}", urlencoding::encode(cursor.as_str())));
        }

        format!("{}?{}", self.client.api_url(&endpoint), query.join("&"))
    }
}

impl PageFetcher for MastodonTimeline {
    async fn fetch_page(
        &self,
        cursor: Option<&PostId>,
        limit: usize,
    ) -> Result<Vec<Post>, FetchError> {
        let url = self.page_url(cursor, limit);
        tracing::debug!("GET {}", url);

        self.client.statuses(&url).await
    }
}

// ==================== API Types ====================

#[derive(Debug, Deserialize)]
struct MastodonStatus {
    id: String,
    created_at: String,
    content: String,
    url: Option<String>,
    account: MastodonAccount,
    reblog: Option<Box<Self>>,
    #[serde(default)]
    favourites_count: u32,
    #[serde(default)]
    reblogs_count: u32,
    #[serde(default)]
    replies_count: u32,
    in_reply_to_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MastodonAccount {
    username: String,
    display_name: String,
    #[serde(default)]
    acct: String,
}

impl MastodonAccount {
    fn handle(&self) -> &str {
        if self.acct.is_empty() {
            &self.username
        } else {
            &self.acct
        }
    }

    fn name(&self) -> &str {
        if self.display_name.is_empty() {
            self.handle()
        } else {
            &self.display_name
        }
    }
}

impl MastodonStatus {
    fn into_post(self) -> Post {
        // Boosts keep their own id so they sort by when they were boosted
        if let Some(reblog) = self.reblog {
            let original = reblog.into_post();
            let mut post = Post::new(self.id);
            post.in_reply_to_id = self.in_reply_to_id.map(PostId::from);
            post.created_at = parse_time(&self.created_at);
            post.is_repost = true;
            post.repost_author = Some(self.account.name().to_string());
            return Post {
                author_handle: original.author_handle,
                author_name: original.author_name,
                content: original.content,
                url: original.url,
                like_count: original.like_count,
                repost_count: original.repost_count,
                reply_count: original.reply_count,
                ..post
            };
        }

        let mut post = Post::new(self.id);
        post.in_reply_to_id = self.in_reply_to_id.map(PostId::from);
        post.author_handle = self.account.handle().to_string();
        post.author_name = self.account.name().to_string();
        post.content = strip_html(&self.content);
        post.created_at = parse_time(&self.created_at);
        post.url = self.url;
        post.like_count = self.favourites_count;
        post.repost_count = self.reblogs_count;
        post.reply_count = self.replies_count;
        post
    }
}

fn parse_time(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

/// Reduce status HTML to plain text
fn strip_html(html: &str) -> String {
    let content = html
        .replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("<br />", "\n")
        .replace("</p><p>", "\n\n");

    // Simple HTML tag removal
    let content = regex_lite::Regex::new(r"<[^>]+>")
        .map(|re| re.replace_all(&content, "").to_string())
        .unwrap_or(content);

    html_escape::decode_html_entities(&content).trim().to_string()
}
