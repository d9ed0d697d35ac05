//! Transactional persistence contract used by every service.
//!
//! A [`ForumStore`] hands out [`StoreTx`] handles. All reads and writes go
//! through a transaction; [`StoreTx::commit`] publishes the writes and
//! dropping the handle without committing discards them.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{Comment, CommentSort, Community, Post, PostSort, TargetKind, User, VoteType},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait ForumStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;
}

/// Hard ceiling on any listing window, whatever the caller asks for.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Offset/limit window over an ordered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    /// Zero-based `page` of `size` rows, `size` clamped to `1..=MAX_PAGE_SIZE`.
    pub fn new(page: u32, size: u32) -> Self {
        let limit = size.clamp(1, MAX_PAGE_SIZE);
        Self {
            limit,
            offset: page.saturating_mul(limit),
        }
    }
}

#[async_trait]
pub trait StoreTx: Send {
    // users
    async fn get_user(&mut self, user_id: Uuid) -> Result<Option<User>>;
    async fn find_user_by_username(&mut self, username: &str) -> Result<Option<User>>;
    async fn insert_user(&mut self, user: &User) -> Result<()>;
    async fn set_user_karma(&mut self, user_id: Uuid, karma: i32) -> Result<()>;
    async fn list_user_ids(&mut self) -> Result<Vec<Uuid>>;
    /// Members of one community, by username.
    async fn list_members(&mut self, community_id: Uuid, page: Page) -> Result<Vec<User>>;
    async fn list_joined_community_ids(&mut self, user_id: Uuid) -> Result<Vec<Uuid>>;

    // communities
    async fn get_community(&mut self, community_id: Uuid) -> Result<Option<Community>>;
    async fn find_community_by_name(&mut self, name: &str) -> Result<Option<Community>>;
    async fn insert_community(&mut self, community: &Community) -> Result<()>;
    async fn list_communities_by_members(&mut self, page: Page) -> Result<Vec<Community>>;
    async fn list_community_ids(&mut self) -> Result<Vec<Uuid>>;
    /// Case-insensitive substring match on name, display name or description.
    async fn search_communities(&mut self, query: &str, page: Page) -> Result<Vec<Community>>;
    /// Returns false when the user was already a member.
    async fn add_member(&mut self, community_id: Uuid, user_id: Uuid) -> Result<bool>;
    /// Returns false when the user was not a member.
    async fn remove_member(&mut self, community_id: Uuid, user_id: Uuid) -> Result<bool>;
    async fn count_members(&mut self, community_id: Uuid) -> Result<i64>;
    async fn set_member_count(&mut self, community_id: Uuid, member_count: i32) -> Result<()>;

    // posts
    async fn get_post(&mut self, post_id: Uuid) -> Result<Option<Post>>;
    /// Like `get_post`, but holds the row against concurrent writers until commit.
    async fn lock_post(&mut self, post_id: Uuid) -> Result<Option<Post>>;
    async fn insert_post(&mut self, post: &Post) -> Result<()>;
    async fn list_posts(
        &mut self,
        sort: PostSort,
        community_id: Option<Uuid>,
        page: Page,
    ) -> Result<Vec<Post>>;
    /// Newest first, restricted to the given communities.
    async fn list_posts_in_communities(
        &mut self,
        community_ids: &[Uuid],
        page: Page,
    ) -> Result<Vec<Post>>;
    /// Case-insensitive substring match on title or content, best scored first.
    async fn search_posts(&mut self, query: &str, page: Page) -> Result<Vec<Post>>;
    async fn list_post_ids(&mut self) -> Result<Vec<Uuid>>;
    /// Writes title, content, links and type; counters are left alone.
    async fn update_post(&mut self, post: &Post) -> Result<()>;
    async fn set_post_votes(
        &mut self,
        post_id: Uuid,
        upvotes: i32,
        downvotes: i32,
        score: i32,
    ) -> Result<()>;
    async fn set_post_comment_count(&mut self, post_id: Uuid, comment_count: i32) -> Result<()>;
    async fn delete_post(&mut self, post_id: Uuid) -> Result<bool>;
    async fn sum_post_scores_by_author(&mut self, author_id: Uuid) -> Result<i64>;

    // comments
    async fn get_comment(&mut self, comment_id: Uuid) -> Result<Option<Comment>>;
    async fn lock_comment(&mut self, comment_id: Uuid) -> Result<Option<Comment>>;
    async fn insert_comment(&mut self, comment: &Comment) -> Result<()>;
    async fn update_comment_content(&mut self, comment_id: Uuid, content: &str) -> Result<()>;
    async fn list_top_level_comments(
        &mut self,
        post_id: Uuid,
        sort: CommentSort,
        page: Page,
    ) -> Result<Vec<Comment>>;
    /// Direct replies of one comment; `None` means no limit.
    async fn list_replies(
        &mut self,
        parent_comment_id: Uuid,
        sort: CommentSort,
        page: Option<Page>,
    ) -> Result<Vec<Comment>>;
    async fn count_replies(&mut self, parent_comment_id: Uuid) -> Result<i64>;
    async fn count_comments_for_post(&mut self, post_id: Uuid) -> Result<i64>;
    /// The comment and every transitive reply, root first.
    async fn list_subtree_ids(&mut self, comment_id: Uuid) -> Result<Vec<Uuid>>;
    async fn list_comment_ids_for_post(&mut self, post_id: Uuid) -> Result<Vec<Uuid>>;
    async fn list_comment_ids(&mut self) -> Result<Vec<Uuid>>;
    async fn list_comment_authors(&mut self, comment_ids: &[Uuid]) -> Result<Vec<Uuid>>;
    async fn set_comment_votes(
        &mut self,
        comment_id: Uuid,
        upvotes: i32,
        downvotes: i32,
        score: i32,
    ) -> Result<()>;
    async fn delete_comments(&mut self, comment_ids: &[Uuid]) -> Result<u64>;
    async fn sum_comment_scores_by_author(&mut self, author_id: Uuid) -> Result<i64>;

    // vote ledger
    async fn find_vote(
        &mut self,
        kind: TargetKind,
        user_id: Uuid,
        target_id: Uuid,
    ) -> Result<Option<VoteType>>;
    /// Fails with `Conflict` when a row for (user, target) already exists.
    async fn insert_vote(
        &mut self,
        kind: TargetKind,
        user_id: Uuid,
        target_id: Uuid,
        vote_type: VoteType,
    ) -> Result<()>;
    async fn update_vote(
        &mut self,
        kind: TargetKind,
        user_id: Uuid,
        target_id: Uuid,
        vote_type: VoteType,
    ) -> Result<bool>;
    async fn delete_vote(&mut self, kind: TargetKind, user_id: Uuid, target_id: Uuid)
    -> Result<bool>;
    async fn count_votes(
        &mut self,
        kind: TargetKind,
        target_id: Uuid,
        vote_type: VoteType,
    ) -> Result<i64>;
    async fn delete_votes_for_targets(&mut self, kind: TargetKind, target_ids: &[Uuid])
    -> Result<u64>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
