use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub content: String,
    pub author_id: Uuid,
    pub post_id: Uuid,
    pub parent_comment_id: Option<Uuid>,
    pub upvotes: i32,
    pub downvotes: i32,
    pub score: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(
        author_id: Uuid,
        post_id: Uuid,
        parent_comment_id: Option<Uuid>,
        content: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            content,
            author_id,
            post_id,
            parent_comment_id,
            upvotes: 0,
            downvotes: 0,
            score: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

// Create comment request
#[derive(Debug, Validate, Deserialize)]
pub struct CreateCommentRequest {
    pub user_id: Option<Uuid>,
    pub post_id: Option<Uuid>,
    pub parent_comment_id: Option<Uuid>,
    #[validate(length(min = 1, max = 10000))]
    pub content: String,
}

#[derive(Debug, Validate, Deserialize)]
pub struct UpdateCommentRequest {
    pub user_id: Option<Uuid>,
    #[validate(length(min = 1, max = 10000))]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}

/// One node of a materialized thread, carrying its own counters and replies.
#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    pub id: Uuid,
    pub content: String,
    pub author_id: Uuid,
    pub post_id: Uuid,
    pub parent_comment_id: Option<Uuid>,
    pub upvotes: i32,
    pub downvotes: i32,
    pub score: i32,
    pub reply_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    pub fn new(comment: Comment, replies: Vec<CommentNode>) -> Self {
        Self {
            id: comment.id,
            content: comment.content,
            author_id: comment.author_id,
            post_id: comment.post_id,
            parent_comment_id: comment.parent_comment_id,
            upvotes: comment.upvotes,
            downvotes: comment.downvotes,
            score: comment.score,
            reply_count: replies.len() as i32,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            replies,
        }
    }

    /// Number of comments in this subtree, the node included.
    pub fn subtree_size(&self) -> usize {
        let mut total = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            total += 1;
            stack.extend(node.replies.iter());
        }
        total
    }
}

#[derive(Debug, Serialize)]
pub struct ThreadResponse {
    pub post_id: Uuid,
    pub page: u32,
    pub size: u32,
    pub comments: Vec<CommentNode>,
}

// Comment sorting options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentSort {
    #[default]
    Best,
    New,
    Old,
}
