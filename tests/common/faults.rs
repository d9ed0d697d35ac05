//! A `ForumStore` that forwards to a `MemoryStore` but can be told to fail
//! specific calls, for exercising retry and rollback paths.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU32, Ordering},
};

use async_trait::async_trait;
use forum_core::{
    error::{AppError, Result},
    models::{Comment, CommentSort, Community, Post, PostSort, TargetKind, User, VoteType},
    store::{ForumStore, MemoryStore, Page, StoreTx},
};
use uuid::Uuid;

#[derive(Default)]
struct Faults {
    vote_conflicts: AtomicU32,
    post_delete_fails: AtomicBool,
    vote_inserts: AtomicU32,
}

#[derive(Clone)]
pub struct FaultyStore {
    inner: MemoryStore,
    faults: Arc<Faults>,
}

impl FaultyStore {
    /// Shares tables with `inner`, so reads through `inner` see what this store committed.
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            faults: Arc::default(),
        }
    }

    /// The next `count` vote inserts fail with `Conflict` as if another writer won the race.
    pub fn conflict_on_next_vote_inserts(&self, count: u32) {
        self.faults.vote_conflicts.store(count, Ordering::SeqCst);
    }

    /// Every `delete_post` call fails with a storage error.
    pub fn fail_post_deletes(&self) {
        self.faults.post_delete_fails.store(true, Ordering::SeqCst);
    }

    /// Vote inserts attempted so far, injected failures included.
    pub fn vote_inserts(&self) -> u32 {
        self.faults.vote_inserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForumStore for FaultyStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let inner = self.inner.begin().await?;
        Ok(Box::new(FaultyTx {
            inner,
            faults: self.faults.clone(),
        }))
    }
}

struct FaultyTx {
    inner: Box<dyn StoreTx>,
    faults: Arc<Faults>,
}

#[async_trait]
impl StoreTx for FaultyTx {
    async fn get_user(&mut self, user_id: Uuid) -> Result<Option<User>> {
        self.inner.get_user(user_id).await
    }

    async fn find_user_by_username(&mut self, username: &str) -> Result<Option<User>> {
        self.inner.find_user_by_username(username).await
    }

    async fn insert_user(&mut self, user: &User) -> Result<()> {
        self.inner.insert_user(user).await
    }

    async fn set_user_karma(&mut self, user_id: Uuid, karma: i32) -> Result<()> {
        self.inner.set_user_karma(user_id, karma).await
    }

    async fn list_user_ids(&mut self) -> Result<Vec<Uuid>> {
        self.inner.list_user_ids().await
    }

    async fn list_members(&mut self, community_id: Uuid, page: Page) -> Result<Vec<User>> {
        self.inner.list_members(community_id, page).await
    }

    async fn list_joined_community_ids(&mut self, user_id: Uuid) -> Result<Vec<Uuid>> {
        self.inner.list_joined_community_ids(user_id).await
    }

    async fn get_community(&mut self, community_id: Uuid) -> Result<Option<Community>> {
        self.inner.get_community(community_id).await
    }

    async fn find_community_by_name(&mut self, name: &str) -> Result<Option<Community>> {
        self.inner.find_community_by_name(name).await
    }

    async fn insert_community(&mut self, community: &Community) -> Result<()> {
        self.inner.insert_community(community).await
    }

    async fn list_communities_by_members(&mut self, page: Page) -> Result<Vec<Community>> {
        self.inner.list_communities_by_members(page).await
    }

    async fn list_community_ids(&mut self) -> Result<Vec<Uuid>> {
        self.inner.list_community_ids().await
    }

    async fn search_communities(&mut self, query: &str, page: Page) -> Result<Vec<Community>> {
        self.inner.search_communities(query, page).await
    }

    async fn add_member(&mut self, community_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.inner.add_member(community_id, user_id).await
    }

    async fn remove_member(&mut self, community_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.inner.remove_member(community_id, user_id).await
    }

    async fn count_members(&mut self, community_id: Uuid) -> Result<i64> {
        self.inner.count_members(community_id).await
    }

    async fn set_member_count(&mut self, community_id: Uuid, member_count: i32) -> Result<()> {
        self.inner.set_member_count(community_id, member_count).await
    }

    async fn get_post(&mut self, post_id: Uuid) -> Result<Option<Post>> {
        self.inner.get_post(post_id).await
    }

    async fn lock_post(&mut self, post_id: Uuid) -> Result<Option<Post>> {
        self.inner.lock_post(post_id).await
    }

    async fn insert_post(&mut self, post: &Post) -> Result<()> {
        self.inner.insert_post(post).await
    }

    async fn list_posts(
        &mut self,
        sort: PostSort,
        community_id: Option<Uuid>,
        page: Page,
    ) -> Result<Vec<Post>> {
        self.inner.list_posts(sort, community_id, page).await
    }

    async fn list_posts_in_communities(
        &mut self,
        community_ids: &[Uuid],
        page: Page,
    ) -> Result<Vec<Post>> {
        self.inner.list_posts_in_communities(community_ids, page).await
    }

    async fn search_posts(&mut self, query: &str, page: Page) -> Result<Vec<Post>> {
        self.inner.search_posts(query, page).await
    }

    async fn list_post_ids(&mut self) -> Result<Vec<Uuid>> {
        self.inner.list_post_ids().await
    }

    async fn update_post(&mut self, post: &Post) -> Result<()> {
        self.inner.update_post(post).await
    }

    async fn set_post_votes(
        &mut self,
        post_id: Uuid,
        upvotes: i32,
        downvotes: i32,
        score: i32,
    ) -> Result<()> {
        self.inner
            .set_post_votes(post_id, upvotes, downvotes, score)
            .await
    }

    async fn set_post_comment_count(&mut self, post_id: Uuid, comment_count: i32) -> Result<()> {
        self.inner.set_post_comment_count(post_id, comment_count).await
    }

    async fn delete_post(&mut self, post_id: Uuid) -> Result<bool> {
        if self.faults.post_delete_fails.load(Ordering::SeqCst) {
            return Err(AppError::StorageFailure(format!(
                "injected failure deleting post {}",
                post_id
            )));
        }
        self.inner.delete_post(post_id).await
    }

    async fn sum_post_scores_by_author(&mut self, author_id: Uuid) -> Result<i64> {
        self.inner.sum_post_scores_by_author(author_id).await
    }

    async fn get_comment(&mut self, comment_id: Uuid) -> Result<Option<Comment>> {
        self.inner.get_comment(comment_id).await
    }

    async fn lock_comment(&mut self, comment_id: Uuid) -> Result<Option<Comment>> {
        self.inner.lock_comment(comment_id).await
    }

    async fn insert_comment(&mut self, comment: &Comment) -> Result<()> {
        self.inner.insert_comment(comment).await
    }

    async fn update_comment_content(&mut self, comment_id: Uuid, content: &str) -> Result<()> {
        self.inner.update_comment_content(comment_id, content).await
    }

    async fn list_top_level_comments(
        &mut self,
        post_id: Uuid,
        sort: CommentSort,
        page: Page,
    ) -> Result<Vec<Comment>> {
        self.inner.list_top_level_comments(post_id, sort, page).await
    }

    async fn list_replies(
        &mut self,
        parent_comment_id: Uuid,
        sort: CommentSort,
        page: Option<Page>,
    ) -> Result<Vec<Comment>> {
        self.inner.list_replies(parent_comment_id, sort, page).await
    }

    async fn count_replies(&mut self, parent_comment_id: Uuid) -> Result<i64> {
        self.inner.count_replies(parent_comment_id).await
    }

    async fn count_comments_for_post(&mut self, post_id: Uuid) -> Result<i64> {
        self.inner.count_comments_for_post(post_id).await
    }

    async fn list_subtree_ids(&mut self, comment_id: Uuid) -> Result<Vec<Uuid>> {
        self.inner.list_subtree_ids(comment_id).await
    }

    async fn list_comment_ids_for_post(&mut self, post_id: Uuid) -> Result<Vec<Uuid>> {
        self.inner.list_comment_ids_for_post(post_id).await
    }

    async fn list_comment_ids(&mut self) -> Result<Vec<Uuid>> {
        self.inner.list_comment_ids().await
    }

    async fn list_comment_authors(&mut self, comment_ids: &[Uuid]) -> Result<Vec<Uuid>> {
        self.inner.list_comment_authors(comment_ids).await
    }

    async fn set_comment_votes(
        &mut self,
        comment_id: Uuid,
        upvotes: i32,
        downvotes: i32,
        score: i32,
    ) -> Result<()> {
        self.inner
            .set_comment_votes(comment_id, upvotes, downvotes, score)
            .await
    }

    async fn delete_comments(&mut self, comment_ids: &[Uuid]) -> Result<u64> {
        self.inner.delete_comments(comment_ids).await
    }

    async fn sum_comment_scores_by_author(&mut self, author_id: Uuid) -> Result<i64> {
        self.inner.sum_comment_scores_by_author(author_id).await
    }

    async fn find_vote(
        &mut self,
        kind: TargetKind,
        user_id: Uuid,
        target_id: Uuid,
    ) -> Result<Option<VoteType>> {
        self.inner.find_vote(kind, user_id, target_id).await
    }

    async fn insert_vote(
        &mut self,
        kind: TargetKind,
        user_id: Uuid,
        target_id: Uuid,
        vote_type: VoteType,
    ) -> Result<()> {
        self.faults.vote_inserts.fetch_add(1, Ordering::SeqCst);
        let lost_race = self
            .faults
            .vote_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lost_race {
            return Err(AppError::Conflict(format!(
                "Vote already exists for {} {}",
                kind, target_id
            )));
        }
        self.inner
            .insert_vote(kind, user_id, target_id, vote_type)
            .await
    }

    async fn update_vote(
        &mut self,
        kind: TargetKind,
        user_id: Uuid,
        target_id: Uuid,
        vote_type: VoteType,
    ) -> Result<bool> {
        self.inner
            .update_vote(kind, user_id, target_id, vote_type)
            .await
    }

    async fn delete_vote(
        &mut self,
        kind: TargetKind,
        user_id: Uuid,
        target_id: Uuid,
    ) -> Result<bool> {
        self.inner.delete_vote(kind, user_id, target_id).await
    }

    async fn count_votes(
        &mut self,
        kind: TargetKind,
        target_id: Uuid,
        vote_type: VoteType,
    ) -> Result<i64> {
        self.inner.count_votes(kind, target_id, vote_type).await
    }

    async fn delete_votes_for_targets(
        &mut self,
        kind: TargetKind,
        target_ids: &[Uuid],
    ) -> Result<u64> {
        self.inner.delete_votes_for_targets(kind, target_ids).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.inner.commit().await
    }
}
