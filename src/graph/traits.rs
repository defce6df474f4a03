// CommentSource trait — the monitor's view of the remote comment feed.
//
// The GraphClient is the production implementor; tests drive the pipeline
// with in-memory fakes instead of a live API.

use anyhow::Result;
use async_trait::async_trait;

use super::comments::{Comment, PostContent};

#[async_trait]
pub trait CommentSource: Send + Sync {
    /// Fetch one page of comments for a post, starting after the given
    /// cursor. Returns the page and the cursor for the next one (None when
    /// the result set is exhausted).
    async fn comments_page(
        &self,
        post_id: &str,
        limit: u32,
        after: Option<&str>,
    ) -> Result<(Vec<Comment>, Option<String>)>;

    /// Fetch the post's current content, or None if it can't be read.
    async fn post_content(&self, post_id: &str) -> Result<Option<PostContent>>;
}
