use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{ForumStore, Page, StoreTx};
use crate::{
    error::{AppError, Result},
    models::{Comment, CommentSort, Community, Post, PostSort, TargetKind, User, VoteType},
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ForumStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

/// Table and target column of one vote ledger.
fn vote_table(kind: TargetKind) -> (&'static str, &'static str) {
    match kind {
        TargetKind::Post => ("post_votes", "post_id"),
        TargetKind::Comment => ("comment_votes", "comment_id"),
    }
}

/// `%query%` for ILIKE, with the pattern metacharacters in `query` escaped.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn comment_order(sort: CommentSort) -> &'static str {
    match sort {
        CommentSort::Best => "score DESC, created_at ASC, id ASC",
        CommentSort::New => "created_at DESC, id DESC",
        CommentSort::Old => "created_at ASC, id ASC",
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn get_user(&mut self, user_id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(user)
    }

    async fn find_user_by_username(&mut self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(user)
    }

    async fn insert_user(&mut self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, karma, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(user.karma)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn set_user_karma(&mut self, user_id: Uuid, karma: i32) -> Result<()> {
        let result = sqlx::query("UPDATE users SET karma = $1, updated_at = $2 WHERE id = $3")
            .bind(karma)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        Ok(())
    }

    async fn list_user_ids(&mut self) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users")
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(ids)
    }

    async fn list_members(&mut self, community_id: Uuid, page: Page) -> Result<Vec<User>> {
        let members = sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            JOIN community_memberships cm ON cm.user_id = u.id
            WHERE cm.community_id = $1
            ORDER BY u.username ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(community_id)
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(members)
    }

    async fn list_joined_community_ids(&mut self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT community_id FROM community_memberships WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(ids)
    }

    async fn get_community(&mut self, community_id: Uuid) -> Result<Option<Community>> {
        let community = sqlx::query_as::<_, Community>("SELECT * FROM communities WHERE id = $1")
            .bind(community_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(community)
    }

    async fn find_community_by_name(&mut self, name: &str) -> Result<Option<Community>> {
        let community = sqlx::query_as::<_, Community>("SELECT * FROM communities WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(community)
    }

    async fn insert_community(&mut self, community: &Community) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO communities (
                id, name, display_name, description, member_count,
                created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(community.id)
        .bind(&community.name)
        .bind(&community.display_name)
        .bind(&community.description)
        .bind(community.member_count)
        .bind(community.created_by)
        .bind(community.created_at)
        .bind(community.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn list_communities_by_members(&mut self, page: Page) -> Result<Vec<Community>> {
        let communities = sqlx::query_as::<_, Community>(
            r#"
            SELECT * FROM communities
            ORDER BY member_count DESC, name ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(communities)
    }

    async fn list_community_ids(&mut self) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM communities")
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(ids)
    }

    async fn search_communities(&mut self, query: &str, page: Page) -> Result<Vec<Community>> {
        let communities = sqlx::query_as::<_, Community>(
            r#"
            SELECT * FROM communities
            WHERE name ILIKE $1 OR display_name ILIKE $1 OR description ILIKE $1
            ORDER BY member_count DESC, name ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(like_pattern(query))
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(communities)
    }

    async fn add_member(&mut self, community_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO community_memberships (community_id, user_id, joined_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (community_id, user_id) DO NOTHING
            "#,
        )
        .bind(community_id)
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_member(&mut self, community_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM community_memberships WHERE community_id = $1 AND user_id = $2",
        )
        .bind(community_id)
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_members(&mut self, community_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM community_memberships WHERE community_id = $1",
        )
        .bind(community_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count)
    }

    async fn set_member_count(&mut self, community_id: Uuid, member_count: i32) -> Result<()> {
        sqlx::query("UPDATE communities SET member_count = $1, updated_at = $2 WHERE id = $3")
            .bind(member_count)
            .bind(Utc::now())
            .bind(community_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn get_post(&mut self, post_id: Uuid) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1")
            .bind(post_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(post)
    }

    async fn lock_post(&mut self, post_id: Uuid) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1 FOR UPDATE")
            .bind(post_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(post)
    }

    async fn insert_post(&mut self, post: &Post) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (
                id, title, content, url, image_url, post_type, author_id, community_id,
                upvotes, downvotes, score, comment_count, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.url)
        .bind(&post.image_url)
        .bind(post.post_type)
        .bind(post.author_id)
        .bind(post.community_id)
        .bind(post.upvotes)
        .bind(post.downvotes)
        .bind(post.score)
        .bind(post.comment_count)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn list_posts(
        &mut self,
        sort: PostSort,
        community_id: Option<Uuid>,
        page: Page,
    ) -> Result<Vec<Post>> {
        let order_clause = match sort {
            PostSort::Hot | PostSort::Top => "score DESC, created_at DESC",
            PostSort::New => "created_at DESC",
        };

        let query = format!(
            r#"
            SELECT * FROM posts
            WHERE ($1::UUID IS NULL OR community_id = $1)
            ORDER BY {}, id DESC
            LIMIT $2 OFFSET $3
            "#,
            order_clause
        );

        let posts = sqlx::query_as::<_, Post>(&query)
            .bind(community_id)
            .bind(page.limit as i64)
            .bind(page.offset as i64)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(posts)
    }

    async fn list_posts_in_communities(
        &mut self,
        community_ids: &[Uuid],
        page: Page,
    ) -> Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT * FROM posts
            WHERE community_id = ANY($1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(community_ids)
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(posts)
    }

    async fn search_posts(&mut self, query: &str, page: Page) -> Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT * FROM posts
            WHERE title ILIKE $1 OR content ILIKE $1
            ORDER BY score DESC, created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(like_pattern(query))
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(posts)
    }

    async fn list_post_ids(&mut self) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM posts")
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(ids)
    }

    async fn update_post(&mut self, post: &Post) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET title = $1, content = $2, url = $3, image_url = $4,
                post_type = $5, updated_at = $6
            WHERE id = $7
            "#,
        )
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.url)
        .bind(&post.image_url)
        .bind(post.post_type)
        .bind(post.updated_at)
        .bind(post.id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Post not found".to_string()));
        }
        Ok(())
    }

    async fn set_post_votes(
        &mut self,
        post_id: Uuid,
        upvotes: i32,
        downvotes: i32,
        score: i32,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET upvotes = $1, downvotes = $2, score = $3, updated_at = $4
            WHERE id = $5
            "#,
        )
        .bind(upvotes)
        .bind(downvotes)
        .bind(score)
        .bind(Utc::now())
        .bind(post_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Post not found".to_string()));
        }
        Ok(())
    }

    async fn set_post_comment_count(&mut self, post_id: Uuid, comment_count: i32) -> Result<()> {
        sqlx::query("UPDATE posts SET comment_count = $1, updated_at = $2 WHERE id = $3")
            .bind(comment_count)
            .bind(Utc::now())
            .bind(post_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn delete_post(&mut self, post_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(post_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn sum_post_scores_by_author(&mut self, author_id: Uuid) -> Result<i64> {
        let sum = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(score), 0)::BIGINT FROM posts WHERE author_id = $1",
        )
        .bind(author_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(sum)
    }

    async fn get_comment(&mut self, comment_id: Uuid) -> Result<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1")
            .bind(comment_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(comment)
    }

    async fn lock_comment(&mut self, comment_id: Uuid) -> Result<Option<Comment>> {
        let comment =
            sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1 FOR UPDATE")
                .bind(comment_id)
                .fetch_optional(&mut *self.tx)
                .await?;

        Ok(comment)
    }

    async fn insert_comment(&mut self, comment: &Comment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO comments (
                id, content, author_id, post_id, parent_comment_id,
                upvotes, downvotes, score, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(comment.id)
        .bind(&comment.content)
        .bind(comment.author_id)
        .bind(comment.post_id)
        .bind(comment.parent_comment_id)
        .bind(comment.upvotes)
        .bind(comment.downvotes)
        .bind(comment.score)
        .bind(comment.created_at)
        .bind(comment.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_comment_content(&mut self, comment_id: Uuid, content: &str) -> Result<()> {
        let result =
            sqlx::query("UPDATE comments SET content = $1, updated_at = $2 WHERE id = $3")
                .bind(content)
                .bind(Utc::now())
                .bind(comment_id)
                .execute(&mut *self.tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Comment not found".to_string()));
        }
        Ok(())
    }

    async fn list_top_level_comments(
        &mut self,
        post_id: Uuid,
        sort: CommentSort,
        page: Page,
    ) -> Result<Vec<Comment>> {
        let query = format!(
            r#"
            SELECT * FROM comments
            WHERE post_id = $1 AND parent_comment_id IS NULL
            ORDER BY {}
            LIMIT $2 OFFSET $3
            "#,
            comment_order(sort)
        );

        let comments = sqlx::query_as::<_, Comment>(&query)
            .bind(post_id)
            .bind(page.limit as i64)
            .bind(page.offset as i64)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(comments)
    }

    async fn list_replies(
        &mut self,
        parent_comment_id: Uuid,
        sort: CommentSort,
        page: Option<Page>,
    ) -> Result<Vec<Comment>> {
        // NULL limit means ALL in Postgres
        let (limit, offset) = match page {
            Some(page) => (Some(page.limit as i64), page.offset as i64),
            None => (None, 0),
        };

        let query = format!(
            r#"
            SELECT * FROM comments
            WHERE parent_comment_id = $1
            ORDER BY {}
            LIMIT $2 OFFSET $3
            "#,
            comment_order(sort)
        );

        let replies = sqlx::query_as::<_, Comment>(&query)
            .bind(parent_comment_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(replies)
    }

    async fn count_replies(&mut self, parent_comment_id: Uuid) -> Result<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments WHERE parent_comment_id = $1")
                .bind(parent_comment_id)
                .fetch_one(&mut *self.tx)
                .await?;

        Ok(count)
    }

    async fn count_comments_for_post(&mut self, post_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(count)
    }

    async fn list_subtree_ids(&mut self, comment_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            WITH RECURSIVE subtree AS (
                SELECT id, 0 AS depth FROM comments WHERE id = $1
                UNION ALL
                SELECT c.id, s.depth + 1
                FROM comments c
                JOIN subtree s ON c.parent_comment_id = s.id
            )
            SELECT id FROM subtree ORDER BY depth
            "#,
        )
        .bind(comment_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(ids)
    }

    async fn list_comment_ids_for_post(&mut self, post_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(ids)
    }

    async fn list_comment_ids(&mut self) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM comments")
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(ids)
    }

    async fn list_comment_authors(&mut self, comment_ids: &[Uuid]) -> Result<Vec<Uuid>> {
        let authors = sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT author_id FROM comments WHERE id = ANY($1)",
        )
        .bind(comment_ids)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(authors)
    }

    async fn set_comment_votes(
        &mut self,
        comment_id: Uuid,
        upvotes: i32,
        downvotes: i32,
        score: i32,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE comments
            SET upvotes = $1, downvotes = $2, score = $3, updated_at = $4
            WHERE id = $5
            "#,
        )
        .bind(upvotes)
        .bind(downvotes)
        .bind(score)
        .bind(Utc::now())
        .bind(comment_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Comment not found".to_string()));
        }
        Ok(())
    }

    async fn delete_comments(&mut self, comment_ids: &[Uuid]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ANY($1)")
            .bind(comment_ids)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn sum_comment_scores_by_author(&mut self, author_id: Uuid) -> Result<i64> {
        let sum = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(score), 0)::BIGINT FROM comments WHERE author_id = $1",
        )
        .bind(author_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(sum)
    }

    async fn find_vote(
        &mut self,
        kind: TargetKind,
        user_id: Uuid,
        target_id: Uuid,
    ) -> Result<Option<VoteType>> {
        let (table, column) = vote_table(kind);
        let query = format!(
            "SELECT vote_type FROM {} WHERE user_id = $1 AND {} = $2",
            table, column
        );

        let vote_type = sqlx::query_scalar::<_, i16>(&query)
            .bind(user_id)
            .bind(target_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        vote_type.map(VoteType::try_from).transpose()
    }

    async fn insert_vote(
        &mut self,
        kind: TargetKind,
        user_id: Uuid,
        target_id: Uuid,
        vote_type: VoteType,
    ) -> Result<()> {
        let (table, column) = vote_table(kind);
        // no ON CONFLICT: a racing duplicate must surface as a unique violation
        let query = format!(
            r#"
            INSERT INTO {} (id, user_id, {}, vote_type, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            "#,
            table, column
        );

        sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(target_id)
            .bind(vote_type.as_i16())
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn update_vote(
        &mut self,
        kind: TargetKind,
        user_id: Uuid,
        target_id: Uuid,
        vote_type: VoteType,
    ) -> Result<bool> {
        let (table, column) = vote_table(kind);
        let query = format!(
            "UPDATE {} SET vote_type = $1, updated_at = NOW() WHERE user_id = $2 AND {} = $3",
            table, column
        );

        let result = sqlx::query(&query)
            .bind(vote_type.as_i16())
            .bind(user_id)
            .bind(target_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_vote(
        &mut self,
        kind: TargetKind,
        user_id: Uuid,
        target_id: Uuid,
    ) -> Result<bool> {
        let (table, column) = vote_table(kind);
        let query = format!(
            "DELETE FROM {} WHERE user_id = $1 AND {} = $2",
            table, column
        );

        let result = sqlx::query(&query)
            .bind(user_id)
            .bind(target_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_votes(
        &mut self,
        kind: TargetKind,
        target_id: Uuid,
        vote_type: VoteType,
    ) -> Result<i64> {
        let (table, column) = vote_table(kind);
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = $1 AND vote_type = $2",
            table, column
        );

        let count = sqlx::query_scalar::<_, i64>(&query)
            .bind(target_id)
            .bind(vote_type.as_i16())
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(count)
    }

    async fn delete_votes_for_targets(
        &mut self,
        kind: TargetKind,
        target_ids: &[Uuid],
    ) -> Result<u64> {
        let (table, column) = vote_table(kind);
        let query = format!("DELETE FROM {} WHERE {} = ANY($1)", table, column);

        let result = sqlx::query(&query)
            .bind(target_ids)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
