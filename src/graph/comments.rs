// Comment fetching — one page of the post's comment feed per call.
//
// The monitor drives pagination itself (it flushes batches between pages),
// so unlike a collect-everything helper this module only exposes single-page
// reads. Field absence is normalized here: the Graph API omits `from` for
// privacy-restricted accounts and `message` for sticker-only comments.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::error;

use super::client::GraphClient;
use super::traits::CommentSource;

/// Fields requested for each comment.
const COMMENT_FIELDS: &str = "id,created_time,message,from,attachment";

/// A comment on the monitored post, normalized from the wire format.
#[derive(Debug, Clone)]
pub struct Comment {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub created_time: String,
    pub message: String,
    /// Raw attachment descriptor, when the comment carries one. The shape
    /// varies by attachment type; see `attachment_url`.
    pub attachment: Option<serde_json::Value>,
}

impl Comment {
    /// Extract the attached image URL, if the attachment is an image.
    ///
    /// Photo attachments nest the URL at `media.image.src`. Any missing or
    /// differently-shaped level means "no image" — never an error, so a
    /// single malformed comment can't abort its page.
    pub fn attachment_url(&self) -> Option<&str> {
        self.attachment
            .as_ref()?
            .get("media")?
            .get("image")?
            .get("src")?
            .as_str()
    }
}

/// Content of the monitored post itself.
#[derive(Debug, Clone, PartialEq, serde::Serialize, Deserialize)]
pub struct PostContent {
    pub message: String,
    pub created_time: String,
    pub url: String,
}

#[async_trait]
impl CommentSource for GraphClient {
    /// Fetch one page of comments.
    ///
    /// Network failures are absorbed after the client's internal retries:
    /// an empty page with no cursor ends the sweep gracefully instead of
    /// bubbling a transient error into the monitor's failure counter.
    async fn comments_page(
        &self,
        post_id: &str,
        limit: u32,
        after: Option<&str>,
    ) -> Result<(Vec<Comment>, Option<String>)> {
        let limit_str = limit.to_string();
        let mut params: Vec<(&str, &str)> = vec![("fields", COMMENT_FIELDS), ("limit", &limit_str)];
        if let Some(cursor) = after {
            params.push(("after", cursor));
        }

        let path = format!("{post_id}/comments");
        match self.get_json::<CommentsPage>(&path, &params).await {
            Ok(page) => {
                let cursor = page.next_cursor();
                let comments = page.data.into_iter().map(Comment::from).collect();
                Ok((comments, cursor))
            }
            Err(e) => {
                error!(error = %e, post_id = post_id, "Failed to fetch comments page");
                Ok((Vec::new(), None))
            }
        }
    }

    /// Fetch the post's current content, or None if unavailable.
    async fn post_content(&self, post_id: &str) -> Result<Option<PostContent>> {
        let params = [("fields", "message,created_time,permalink_url")];
        match self.get_json::<RawPost>(post_id, &params).await {
            Ok(raw) => Ok(Some(raw.into())),
            Err(e) => {
                error!(error = %e, post_id = post_id, "Failed to fetch post content");
                Ok(None)
            }
        }
    }
}

// --- Graph API wire types ---

/// One page of the `/comments` edge.
#[derive(Debug, Deserialize)]
pub struct CommentsPage {
    #[serde(default)]
    pub data: Vec<RawComment>,
    pub paging: Option<Paging>,
}

impl CommentsPage {
    /// The cursor for the next page, when one exists.
    pub fn next_cursor(&self) -> Option<String> {
        self.paging
            .as_ref()?
            .cursors
            .as_ref()?
            .after
            .clone()
    }
}

#[derive(Debug, Deserialize)]
pub struct RawComment {
    pub id: String,
    pub created_time: String,
    pub message: Option<String>,
    pub from: Option<RawAuthor>,
    pub attachment: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct RawAuthor {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct Paging {
    pub cursors: Option<Cursors>,
}

#[derive(Debug, Deserialize)]
pub struct Cursors {
    pub after: Option<String>,
}

impl From<RawComment> for Comment {
    fn from(raw: RawComment) -> Self {
        let (author_id, author_name) = match raw.from {
            Some(author) => (author.id, author.name),
            None => ("Unknown".to_string(), "Unknown".to_string()),
        };

        Comment {
            id: raw.id,
            author_id,
            author_name,
            created_time: raw.created_time,
            message: raw.message.unwrap_or_else(|| "No message".to_string()),
            attachment: raw.attachment,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RawPost {
    pub message: Option<String>,
    pub created_time: Option<String>,
    pub permalink_url: Option<String>,
}

impl From<RawPost> for PostContent {
    fn from(raw: RawPost) -> Self {
        PostContent {
            message: raw.message.unwrap_or_else(|| "No message content".to_string()),
            created_time: raw
                .created_time
                .unwrap_or_else(|| "Unknown time".to_string()),
            url: raw.permalink_url.unwrap_or_else(|| "Unknown URL".to_string()),
        }
    }
}
