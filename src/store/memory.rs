//! In-process store: plain tables keyed by id, guarded by one async mutex.
//!
//! `begin` takes the mutex for the lifetime of the transaction, so
//! transactions are serializable. The first write copies the tables and
//! `commit` publishes the copy; read-only transactions never copy, and a
//! dropped transaction leaves no trace. Intended for tests and local
//! development.

use std::{
    cmp::Reverse,
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{ForumStore, Page, StoreTx};
use crate::{
    error::{AppError, Result},
    models::{
        Comment, CommentSort, Community, Post, PostSort, TargetKind, User, VoteRecord, VoteType,
    },
};

/// A row plus its insertion sequence, used to break timestamp ties.
#[derive(Debug, Clone)]
struct Row<T> {
    value: T,
    seq: u64,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    communities: HashMap<Uuid, Community>,
    // (community_id, user_id)
    memberships: HashSet<(Uuid, Uuid)>,
    posts: HashMap<Uuid, Row<Post>>,
    comments: HashMap<Uuid, Row<Comment>>,
    // parent comment id -> direct reply ids
    replies: HashMap<Uuid, Vec<Uuid>>,
    // (user_id, target_id) -> vote
    post_votes: HashMap<(Uuid, Uuid), VoteRecord>,
    comment_votes: HashMap<(Uuid, Uuid), VoteRecord>,
    next_seq: u64,
}

impl Tables {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn votes(&self, kind: TargetKind) -> &HashMap<(Uuid, Uuid), VoteRecord> {
        match kind {
            TargetKind::Post => &self.post_votes,
            TargetKind::Comment => &self.comment_votes,
        }
    }

    fn votes_mut(&mut self, kind: TargetKind) -> &mut HashMap<(Uuid, Uuid), VoteRecord> {
        match kind {
            TargetKind::Post => &mut self.post_votes,
            TargetKind::Comment => &mut self.comment_votes,
        }
    }

    fn target_exists(&self, kind: TargetKind, target_id: Uuid) -> bool {
        match kind {
            TargetKind::Post => self.posts.contains_key(&target_id),
            TargetKind::Comment => self.comments.contains_key(&target_id),
        }
    }

    fn sorted_comments(&self, ids: impl Iterator<Item = Uuid>, sort: CommentSort) -> Vec<Comment> {
        let mut rows: Vec<&Row<Comment>> = ids.filter_map(|id| self.comments.get(&id)).collect();
        match sort {
            CommentSort::Best => rows.sort_by_key(|r| (Reverse(r.value.score), r.value.created_at, r.seq)),
            CommentSort::New => rows.sort_by_key(|r| Reverse((r.value.created_at, r.seq))),
            CommentSort::Old => rows.sort_by_key(|r| (r.value.created_at, r.seq)),
        }
        rows.into_iter().map(|r| r.value.clone()).collect()
    }

    fn posts_where(&self, keep: impl Fn(&Post) -> bool, sort: PostSort) -> Vec<Post> {
        let mut rows: Vec<&Row<Post>> = self.posts.values().filter(|r| keep(&r.value)).collect();
        match sort {
            PostSort::Hot | PostSort::Top => {
                rows.sort_by_key(|r| Reverse((r.value.score, r.value.created_at, r.seq)))
            }
            PostSort::New => rows.sort_by_key(|r| Reverse((r.value.created_at, r.seq))),
        }
        rows.into_iter().map(|r| r.value.clone()).collect()
    }

    /// Removes the comment and, like the foreign key cascade, every reply under it.
    fn remove_comment(&mut self, comment_id: Uuid) -> bool {
        let Some(row) = self.comments.remove(&comment_id) else {
            return false;
        };
        if let Some(parent_id) = row.value.parent_comment_id {
            if let Some(siblings) = self.replies.get_mut(&parent_id) {
                siblings.retain(|id| *id != comment_id);
            }
        }

        let mut removed = vec![comment_id];
        let mut pending = self.replies.remove(&comment_id).unwrap_or_default();
        while let Some(child_id) = pending.pop() {
            if self.comments.remove(&child_id).is_some() {
                removed.push(child_id);
                pending.extend(self.replies.remove(&child_id).unwrap_or_default());
            }
        }

        self.comment_votes
            .retain(|(_, target), _| !removed.contains(target));
        true
    }
}

fn window<T>(items: Vec<T>, page: Page) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .collect()
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ForumStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let guard = self.tables.clone().lock_owned().await;
        Ok(Box::new(MemoryTx {
            guard,
            working: None,
        }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    // private copy, taken on the first write
    working: Option<Tables>,
}

impl MemoryTx {
    fn tables(&self) -> &Tables {
        self.working.as_ref().unwrap_or(&*self.guard)
    }

    fn tables_mut(&mut self) -> &mut Tables {
        let published = &self.guard;
        self.working
            .get_or_insert_with(|| Tables::clone(published))
    }

    fn post_mut(&mut self, post_id: Uuid) -> Result<&mut Post> {
        if !self.tables().posts.contains_key(&post_id) {
            return Err(AppError::NotFound("Post not found".to_string()));
        }
        self.tables_mut()
            .posts
            .get_mut(&post_id)
            .map(|row| &mut row.value)
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
    }

    fn comment_mut(&mut self, comment_id: Uuid) -> Result<&mut Comment> {
        if !self.tables().comments.contains_key(&comment_id) {
            return Err(AppError::NotFound("Comment not found".to_string()));
        }
        self.tables_mut()
            .comments
            .get_mut(&comment_id)
            .map(|row| &mut row.value)
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn get_user(&mut self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.tables().users.get(&user_id).cloned())
    }

    async fn find_user_by_username(&mut self, username: &str) -> Result<Option<User>> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn insert_user(&mut self, user: &User) -> Result<()> {
        if self.tables().users.values().any(|u| u.username == user.username) {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }
        self.tables_mut().users.insert(user.id, user.clone());
        Ok(())
    }

    async fn set_user_karma(&mut self, user_id: Uuid, karma: i32) -> Result<()> {
        if !self.tables().users.contains_key(&user_id) {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        if let Some(user) = self.tables_mut().users.get_mut(&user_id) {
            user.karma = karma;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list_user_ids(&mut self) -> Result<Vec<Uuid>> {
        Ok(self.tables().users.keys().copied().collect())
    }

    async fn list_members(&mut self, community_id: Uuid, page: Page) -> Result<Vec<User>> {
        let tables = self.tables();
        let mut members: Vec<User> = tables
            .memberships
            .iter()
            .filter(|(c, _)| *c == community_id)
            .filter_map(|(_, user_id)| tables.users.get(user_id).cloned())
            .collect();
        members.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(window(members, page))
    }

    async fn list_joined_community_ids(&mut self, user_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .tables()
            .memberships
            .iter()
            .filter(|(_, u)| *u == user_id)
            .map(|(c, _)| *c)
            .collect())
    }

    async fn get_community(&mut self, community_id: Uuid) -> Result<Option<Community>> {
        Ok(self.tables().communities.get(&community_id).cloned())
    }

    async fn find_community_by_name(&mut self, name: &str) -> Result<Option<Community>> {
        Ok(self
            .tables()
            .communities
            .values()
            .find(|c| c.name == name)
            .cloned())
    }

    async fn insert_community(&mut self, community: &Community) -> Result<()> {
        let tables = self.tables();
        if !tables.users.contains_key(&community.created_by) {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        if tables.communities.values().any(|c| c.name == community.name) {
            return Err(AppError::Conflict("Community name already exists".to_string()));
        }
        self.tables_mut()
            .communities
            .insert(community.id, community.clone());
        Ok(())
    }

    async fn list_communities_by_members(&mut self, page: Page) -> Result<Vec<Community>> {
        let mut communities: Vec<Community> = self.tables().communities.values().cloned().collect();
        communities.sort_by(|a, b| {
            b.member_count
                .cmp(&a.member_count)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(window(communities, page))
    }

    async fn list_community_ids(&mut self) -> Result<Vec<Uuid>> {
        Ok(self.tables().communities.keys().copied().collect())
    }

    async fn search_communities(&mut self, query: &str, page: Page) -> Result<Vec<Community>> {
        let needle = query.to_lowercase();
        let mut communities: Vec<Community> = self
            .tables()
            .communities
            .values()
            .filter(|c| {
                contains_ignore_case(&c.name, &needle)
                    || contains_ignore_case(&c.display_name, &needle)
                    || c.description
                        .as_deref()
                        .is_some_and(|d| contains_ignore_case(d, &needle))
            })
            .cloned()
            .collect();
        communities.sort_by(|a, b| {
            b.member_count
                .cmp(&a.member_count)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(window(communities, page))
    }

    async fn add_member(&mut self, community_id: Uuid, user_id: Uuid) -> Result<bool> {
        let tables = self.tables();
        if !tables.communities.contains_key(&community_id) {
            return Err(AppError::NotFound("Community not found".to_string()));
        }
        if !tables.users.contains_key(&user_id) {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        if tables.memberships.contains(&(community_id, user_id)) {
            return Ok(false);
        }
        Ok(self.tables_mut().memberships.insert((community_id, user_id)))
    }

    async fn remove_member(&mut self, community_id: Uuid, user_id: Uuid) -> Result<bool> {
        if !self.tables().memberships.contains(&(community_id, user_id)) {
            return Ok(false);
        }
        Ok(self.tables_mut().memberships.remove(&(community_id, user_id)))
    }

    async fn count_members(&mut self, community_id: Uuid) -> Result<i64> {
        Ok(self
            .tables()
            .memberships
            .iter()
            .filter(|(c, _)| *c == community_id)
            .count() as i64)
    }

    async fn set_member_count(&mut self, community_id: Uuid, member_count: i32) -> Result<()> {
        if !self.tables().communities.contains_key(&community_id) {
            return Err(AppError::NotFound("Community not found".to_string()));
        }
        if let Some(community) = self.tables_mut().communities.get_mut(&community_id) {
            community.member_count = member_count;
            community.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn get_post(&mut self, post_id: Uuid) -> Result<Option<Post>> {
        Ok(self.tables().posts.get(&post_id).map(|r| r.value.clone()))
    }

    async fn lock_post(&mut self, post_id: Uuid) -> Result<Option<Post>> {
        // the whole store is already held by this transaction
        self.get_post(post_id).await
    }

    async fn insert_post(&mut self, post: &Post) -> Result<()> {
        let tables = self.tables();
        if !tables.users.contains_key(&post.author_id) {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        if !tables.communities.contains_key(&post.community_id) {
            return Err(AppError::NotFound("Community not found".to_string()));
        }
        let tables = self.tables_mut();
        let seq = tables.next_seq();
        tables.posts.insert(
            post.id,
            Row {
                value: post.clone(),
                seq,
            },
        );
        Ok(())
    }

    async fn list_posts(
        &mut self,
        sort: PostSort,
        community_id: Option<Uuid>,
        page: Page,
    ) -> Result<Vec<Post>> {
        let posts = self
            .tables()
            .posts_where(|p| community_id.is_none_or(|c| p.community_id == c), sort);
        Ok(window(posts, page))
    }

    async fn list_posts_in_communities(
        &mut self,
        community_ids: &[Uuid],
        page: Page,
    ) -> Result<Vec<Post>> {
        let communities: HashSet<&Uuid> = community_ids.iter().collect();
        let posts = self
            .tables()
            .posts_where(|p| communities.contains(&p.community_id), PostSort::New);
        Ok(window(posts, page))
    }

    async fn search_posts(&mut self, query: &str, page: Page) -> Result<Vec<Post>> {
        let needle = query.to_lowercase();
        let posts = self.tables().posts_where(
            |p| {
                contains_ignore_case(&p.title, &needle)
                    || p.content
                        .as_deref()
                        .is_some_and(|c| contains_ignore_case(c, &needle))
            },
            PostSort::Top,
        );
        Ok(window(posts, page))
    }

    async fn list_post_ids(&mut self) -> Result<Vec<Uuid>> {
        Ok(self.tables().posts.keys().copied().collect())
    }

    async fn update_post(&mut self, post: &Post) -> Result<()> {
        let stored = self.post_mut(post.id)?;
        stored.title = post.title.clone();
        stored.content = post.content.clone();
        stored.url = post.url.clone();
        stored.image_url = post.image_url.clone();
        stored.post_type = post.post_type;
        stored.updated_at = post.updated_at;
        Ok(())
    }

    async fn set_post_votes(
        &mut self,
        post_id: Uuid,
        upvotes: i32,
        downvotes: i32,
        score: i32,
    ) -> Result<()> {
        let post = self.post_mut(post_id)?;
        post.upvotes = upvotes;
        post.downvotes = downvotes;
        post.score = score;
        post.updated_at = Utc::now();
        Ok(())
    }

    async fn set_post_comment_count(&mut self, post_id: Uuid, comment_count: i32) -> Result<()> {
        let post = self.post_mut(post_id)?;
        post.comment_count = comment_count;
        post.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_post(&mut self, post_id: Uuid) -> Result<bool> {
        if !self.tables().posts.contains_key(&post_id) {
            return Ok(false);
        }
        let tables = self.tables_mut();
        tables.posts.remove(&post_id);
        // same effect as the ON DELETE CASCADE foreign keys
        tables.post_votes.retain(|(_, target), _| *target != post_id);
        let orphaned: Vec<Uuid> = tables
            .comments
            .values()
            .filter(|r| r.value.post_id == post_id)
            .map(|r| r.value.id)
            .collect();
        for comment_id in orphaned {
            tables.remove_comment(comment_id);
        }
        Ok(true)
    }

    async fn sum_post_scores_by_author(&mut self, author_id: Uuid) -> Result<i64> {
        Ok(self
            .tables()
            .posts
            .values()
            .filter(|r| r.value.author_id == author_id)
            .map(|r| i64::from(r.value.score))
            .sum())
    }

    async fn get_comment(&mut self, comment_id: Uuid) -> Result<Option<Comment>> {
        Ok(self.tables().comments.get(&comment_id).map(|r| r.value.clone()))
    }

    async fn lock_comment(&mut self, comment_id: Uuid) -> Result<Option<Comment>> {
        self.get_comment(comment_id).await
    }

    async fn insert_comment(&mut self, comment: &Comment) -> Result<()> {
        let tables = self.tables();
        if !tables.users.contains_key(&comment.author_id) {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        if !tables.posts.contains_key(&comment.post_id) {
            return Err(AppError::NotFound("Post not found".to_string()));
        }
        if let Some(parent_id) = comment.parent_comment_id {
            if !tables.comments.contains_key(&parent_id) {
                return Err(AppError::NotFound("Parent comment not found".to_string()));
            }
        }

        let tables = self.tables_mut();
        if let Some(parent_id) = comment.parent_comment_id {
            tables.replies.entry(parent_id).or_default().push(comment.id);
        }
        let seq = tables.next_seq();
        tables.comments.insert(
            comment.id,
            Row {
                value: comment.clone(),
                seq,
            },
        );
        Ok(())
    }

    async fn update_comment_content(&mut self, comment_id: Uuid, content: &str) -> Result<()> {
        let comment = self.comment_mut(comment_id)?;
        comment.content = content.to_string();
        comment.updated_at = Utc::now();
        Ok(())
    }

    async fn list_top_level_comments(
        &mut self,
        post_id: Uuid,
        sort: CommentSort,
        page: Page,
    ) -> Result<Vec<Comment>> {
        let tables = self.tables();
        let ids = tables
            .comments
            .values()
            .filter(|r| r.value.post_id == post_id && r.value.parent_comment_id.is_none())
            .map(|r| r.value.id);
        Ok(window(tables.sorted_comments(ids, sort), page))
    }

    async fn list_replies(
        &mut self,
        parent_comment_id: Uuid,
        sort: CommentSort,
        page: Option<Page>,
    ) -> Result<Vec<Comment>> {
        let tables = self.tables();
        let ids = tables
            .replies
            .get(&parent_comment_id)
            .into_iter()
            .flatten()
            .copied();
        let replies = tables.sorted_comments(ids, sort);
        Ok(match page {
            Some(page) => window(replies, page),
            None => replies,
        })
    }

    async fn count_replies(&mut self, parent_comment_id: Uuid) -> Result<i64> {
        Ok(self
            .tables()
            .replies
            .get(&parent_comment_id)
            .map_or(0, |ids| ids.len() as i64))
    }

    async fn count_comments_for_post(&mut self, post_id: Uuid) -> Result<i64> {
        Ok(self
            .tables()
            .comments
            .values()
            .filter(|r| r.value.post_id == post_id)
            .count() as i64)
    }

    async fn list_subtree_ids(&mut self, comment_id: Uuid) -> Result<Vec<Uuid>> {
        let tables = self.tables();
        if !tables.comments.contains_key(&comment_id) {
            return Ok(Vec::new());
        }
        let mut ids = vec![comment_id];
        let mut next = 0;
        while next < ids.len() {
            if let Some(children) = tables.replies.get(&ids[next]) {
                ids.extend(children.iter().copied());
            }
            next += 1;
        }
        Ok(ids)
    }

    async fn list_comment_ids_for_post(&mut self, post_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .tables()
            .comments
            .values()
            .filter(|r| r.value.post_id == post_id)
            .map(|r| r.value.id)
            .collect())
    }

    async fn list_comment_ids(&mut self) -> Result<Vec<Uuid>> {
        Ok(self.tables().comments.keys().copied().collect())
    }

    async fn list_comment_authors(&mut self, comment_ids: &[Uuid]) -> Result<Vec<Uuid>> {
        let tables = self.tables();
        let authors: HashSet<Uuid> = comment_ids
            .iter()
            .filter_map(|id| tables.comments.get(id))
            .map(|r| r.value.author_id)
            .collect();
        Ok(authors.into_iter().collect())
    }

    async fn set_comment_votes(
        &mut self,
        comment_id: Uuid,
        upvotes: i32,
        downvotes: i32,
        score: i32,
    ) -> Result<()> {
        let comment = self.comment_mut(comment_id)?;
        comment.upvotes = upvotes;
        comment.downvotes = downvotes;
        comment.score = score;
        comment.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_comments(&mut self, comment_ids: &[Uuid]) -> Result<u64> {
        // counts the rows named, not the replies that cascade with them
        let deleted = comment_ids
            .iter()
            .filter(|id| self.tables().comments.contains_key(*id))
            .count() as u64;
        if deleted == 0 {
            return Ok(0);
        }
        let tables = self.tables_mut();
        for comment_id in comment_ids {
            tables.remove_comment(*comment_id);
        }
        Ok(deleted)
    }

    async fn sum_comment_scores_by_author(&mut self, author_id: Uuid) -> Result<i64> {
        Ok(self
            .tables()
            .comments
            .values()
            .filter(|r| r.value.author_id == author_id)
            .map(|r| i64::from(r.value.score))
            .sum())
    }

    async fn find_vote(
        &mut self,
        kind: TargetKind,
        user_id: Uuid,
        target_id: Uuid,
    ) -> Result<Option<VoteType>> {
        Ok(self
            .tables()
            .votes(kind)
            .get(&(user_id, target_id))
            .map(|v| v.vote_type))
    }

    async fn insert_vote(
        &mut self,
        kind: TargetKind,
        user_id: Uuid,
        target_id: Uuid,
        vote_type: VoteType,
    ) -> Result<()> {
        let tables = self.tables();
        if !tables.users.contains_key(&user_id) {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        if !tables.target_exists(kind, target_id) {
            return Err(AppError::NotFound(format!("{} not found", kind)));
        }
        if tables.votes(kind).contains_key(&(user_id, target_id)) {
            return Err(AppError::Conflict(format!(
                "Vote already exists for {} {}",
                kind, target_id
            )));
        }
        let now = Utc::now();
        self.tables_mut().votes_mut(kind).insert(
            (user_id, target_id),
            VoteRecord {
                id: Uuid::new_v4(),
                user_id,
                target_id,
                vote_type,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(())
    }

    async fn update_vote(
        &mut self,
        kind: TargetKind,
        user_id: Uuid,
        target_id: Uuid,
        vote_type: VoteType,
    ) -> Result<bool> {
        if !self.tables().votes(kind).contains_key(&(user_id, target_id)) {
            return Ok(false);
        }
        match self.tables_mut().votes_mut(kind).get_mut(&(user_id, target_id)) {
            Some(vote) => {
                vote.vote_type = vote_type;
                vote.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_vote(
        &mut self,
        kind: TargetKind,
        user_id: Uuid,
        target_id: Uuid,
    ) -> Result<bool> {
        if !self.tables().votes(kind).contains_key(&(user_id, target_id)) {
            return Ok(false);
        }
        Ok(self
            .tables_mut()
            .votes_mut(kind)
            .remove(&(user_id, target_id))
            .is_some())
    }

    async fn count_votes(
        &mut self,
        kind: TargetKind,
        target_id: Uuid,
        vote_type: VoteType,
    ) -> Result<i64> {
        Ok(self
            .tables()
            .votes(kind)
            .values()
            .filter(|v| v.target_id == target_id && v.vote_type == vote_type)
            .count() as i64)
    }

    async fn delete_votes_for_targets(
        &mut self,
        kind: TargetKind,
        target_ids: &[Uuid],
    ) -> Result<u64> {
        let targets: HashSet<&Uuid> = target_ids.iter().collect();
        let doomed = self
            .tables()
            .votes(kind)
            .keys()
            .filter(|(_, target)| targets.contains(target))
            .count();
        if doomed == 0 {
            return Ok(0);
        }
        self.tables_mut()
            .votes_mut(kind)
            .retain(|(_, target), _| !targets.contains(target));
        Ok(doomed as u64)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx { mut guard, working } = *self;
        if let Some(working) = working {
            *guard = working;
        }
        Ok(())
    }
}
