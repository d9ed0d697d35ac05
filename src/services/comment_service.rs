use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{Comment, CommentNode, CommentSort, DeleteSummary, TargetKind},
    services::score_service,
    store::{ForumStore, Page, StoreTx},
};

/// A fetched comment plus the arena indices of its direct replies.
struct Slot {
    comment: Comment,
    children: Vec<usize>,
}

impl Slot {
    fn new(comment: Comment) -> Self {
        Self {
            comment,
            children: Vec::new(),
        }
    }
}

/// One page of top-level comments for a post, each with its full reply tree.
/// `size` is clamped to `1..=MAX_PAGE_SIZE`.
pub async fn get_thread(
    store: &dyn ForumStore,
    post_id: Uuid,
    page: u32,
    size: u32,
    sort: CommentSort,
) -> Result<Vec<CommentNode>> {
    let mut tx = store.begin().await?;

    if tx.get_post(post_id).await?.is_none() {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    let roots = tx
        .list_top_level_comments(post_id, sort, Page::new(page, size))
        .await?;
    let root_count = roots.len();

    // Breadth-first fill: every child lands after its parent in the arena.
    let mut arena: Vec<Slot> = roots.into_iter().map(Slot::new).collect();
    let mut cursor = 0;
    while cursor < arena.len() {
        let parent_id = arena[cursor].comment.id;
        for reply in tx.list_replies(parent_id, sort, None).await? {
            let index = arena.len();
            arena.push(Slot::new(reply));
            arena[cursor].children.push(index);
        }
        cursor += 1;
    }

    tracing::debug!(
        "Loaded thread for post {}: {} top-level, {} total",
        post_id,
        root_count,
        arena.len()
    );

    Ok(assemble(arena, root_count))
}

/// Builds nodes from the leaves up; the first `root_count` slots are the roots.
fn assemble(arena: Vec<Slot>, root_count: usize) -> Vec<CommentNode> {
    let mut built: Vec<Option<CommentNode>> = Vec::with_capacity(arena.len());
    built.resize_with(arena.len(), || None);

    for (index, slot) in arena.into_iter().enumerate().rev() {
        let replies = slot
            .children
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();
        built[index] = Some(CommentNode::new(slot.comment, replies));
    }

    built.into_iter().take(root_count).flatten().collect()
}

pub async fn add_comment(
    store: &dyn ForumStore,
    author_id: Uuid,
    post_id: Uuid,
    content: &str,
    parent_comment_id: Option<Uuid>,
) -> Result<Comment> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::InvalidInput(
            "Comment content cannot be empty".to_string(),
        ));
    }

    let mut tx = store.begin().await?;

    if tx.get_user(author_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    if tx.lock_post(post_id).await?.is_none() {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    if let Some(parent_id) = parent_comment_id {
        let parent = tx
            .get_comment(parent_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Parent comment not found".to_string()))?;
        if parent.post_id != post_id {
            return Err(AppError::InvalidInput(
                "Parent comment belongs to a different post".to_string(),
            ));
        }
    }

    let comment = Comment::new(author_id, post_id, parent_comment_id, content.to_string());
    tx.insert_comment(&comment).await?;
    let comment_count = score_service::recompute_comment_count(tx.as_mut(), post_id).await?;
    tx.commit().await?;

    tracing::info!(
        "Comment {} added to post {} by {} ({} comments)",
        comment.id,
        post_id,
        author_id,
        comment_count
    );

    Ok(comment)
}

/// Replaces the text of a comment. Only its author may edit it.
pub async fn update_comment(
    store: &dyn ForumStore,
    comment_id: Uuid,
    editor_id: Uuid,
    content: &str,
) -> Result<Comment> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::InvalidInput(
            "Comment content cannot be empty".to_string(),
        ));
    }

    let mut tx = store.begin().await?;

    let comment = tx
        .lock_comment(comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;
    if comment.author_id != editor_id {
        return Err(AppError::Authorization(
            "You can only edit your own comments".to_string(),
        ));
    }

    tx.update_comment_content(comment_id, content).await?;
    let updated = tx
        .get_comment(comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;
    tx.commit().await?;

    tracing::debug!("Comment {} edited by {}", comment_id, editor_id);

    Ok(updated)
}

/// Removes the comment, every reply under it and all their votes.
pub async fn delete_comment(store: &dyn ForumStore, comment_id: Uuid) -> Result<DeleteSummary> {
    let mut tx = store.begin().await?;

    let post_id = tx
        .get_comment(comment_id)
        .await?
        .map(|c| c.post_id)
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    // Post before comment, the same order add_comment and delete_post take.
    tx.lock_post(post_id).await?;
    if tx.lock_comment(comment_id).await?.is_none() {
        return Err(AppError::NotFound("Comment not found".to_string()));
    }

    let ids = tx.list_subtree_ids(comment_id).await?;
    let authors = tx.list_comment_authors(&ids).await?;

    let votes_deleted = tx
        .delete_votes_for_targets(TargetKind::Comment, &ids)
        .await?;
    let comments_deleted = tx.delete_comments(&ids).await?;

    score_service::recompute_comment_count(tx.as_mut(), post_id).await?;
    let authors_recomputed = recompute_authors(tx.as_mut(), authors).await?;
    tx.commit().await?;

    tracing::info!(
        "Deleted comment {} with {} comments and {} votes",
        comment_id,
        comments_deleted,
        votes_deleted
    );

    Ok(DeleteSummary {
        posts_deleted: 0,
        comments_deleted,
        votes_deleted,
        authors_recomputed,
    })
}

/// Recomputes karma once per distinct author. Returns the authors in sorted order.
pub(crate) async fn recompute_authors(
    tx: &mut dyn StoreTx,
    mut authors: Vec<Uuid>,
) -> Result<Vec<Uuid>> {
    authors.sort();
    authors.dedup();
    for author_id in &authors {
        score_service::recompute_karma(tx, *author_id).await?;
    }
    Ok(authors)
}

pub async fn get_comment(store: &dyn ForumStore, comment_id: Uuid) -> Result<Comment> {
    let mut tx = store.begin().await?;
    tx.get_comment(comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
}

/// Direct replies of one comment, a page at a time.
pub async fn get_replies(
    store: &dyn ForumStore,
    comment_id: Uuid,
    page: u32,
    size: u32,
    sort: CommentSort,
) -> Result<Vec<Comment>> {
    let mut tx = store.begin().await?;
    if tx.get_comment(comment_id).await?.is_none() {
        return Err(AppError::NotFound("Comment not found".to_string()));
    }
    tx.list_replies(comment_id, sort, Some(Page::new(page, size)))
        .await
}

/// Live count of every comment on the post, replies included.
pub async fn count_comments(store: &dyn ForumStore, post_id: Uuid) -> Result<i64> {
    let mut tx = store.begin().await?;
    if tx.get_post(post_id).await?.is_none() {
        return Err(AppError::NotFound("Post not found".to_string()));
    }
    tx.count_comments_for_post(post_id).await
}

pub async fn count_replies(store: &dyn ForumStore, comment_id: Uuid) -> Result<i64> {
    let mut tx = store.begin().await?;
    if tx.get_comment(comment_id).await?.is_none() {
        return Err(AppError::NotFound("Comment not found".to_string()));
    }
    tx.count_replies(comment_id).await
}
