//! Bulk recomputation of every cached aggregate from its source of truth.
//!
//! Each item is recomputed in its own short transaction, so a sweep never
//! holds locks across the whole dataset. Rows deleted while the sweep runs
//! are skipped.

use uuid::Uuid;

use crate::{
    error::Result,
    models::{ReconcileReport, VoteTarget},
    services::score_service,
    store::ForumStore,
};

#[derive(Debug, Clone, Copy)]
enum Item {
    PostScore(Uuid),
    CommentScore(Uuid),
    CommentCount(Uuid),
    MemberCount(Uuid),
    Karma(Uuid),
}

/// Scores first, then per-post and per-community counters, then karma,
/// which reads the scores written by the earlier phases.
pub async fn reconcile_all(store: &dyn ForumStore) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();

    let post_ids = store.begin().await?.list_post_ids().await?;
    for &id in &post_ids {
        tally(
            store,
            Item::PostScore(id),
            &mut report.posts,
            &mut report.failures,
        )
        .await;
    }

    let comment_ids = store.begin().await?.list_comment_ids().await?;
    for &id in &comment_ids {
        tally(
            store,
            Item::CommentScore(id),
            &mut report.comments,
            &mut report.failures,
        )
        .await;
    }

    for &id in &post_ids {
        tally(
            store,
            Item::CommentCount(id),
            &mut report.comment_counts,
            &mut report.failures,
        )
        .await;
    }

    let community_ids = store.begin().await?.list_community_ids().await?;
    for id in community_ids {
        tally(
            store,
            Item::MemberCount(id),
            &mut report.member_counts,
            &mut report.failures,
        )
        .await;
    }

    let user_ids = store.begin().await?.list_user_ids().await?;
    for id in user_ids {
        tally(
            store,
            Item::Karma(id),
            &mut report.users,
            &mut report.failures,
        )
        .await;
    }

    tracing::info!(
        "Reconciled {} posts, {} comments, {} comment counts, {} member counts, {} users ({} failures)",
        report.posts,
        report.comments,
        report.comment_counts,
        report.member_counts,
        report.users,
        report.failures
    );

    Ok(report)
}

async fn tally(store: &dyn ForumStore, item: Item, done: &mut u64, failures: &mut u64) {
    match reconcile_item(store, item).await {
        Ok(true) => *done += 1,
        Ok(false) => tracing::debug!("Skipping {:?}: row no longer exists", item),
        Err(e) => {
            tracing::warn!("Failed to reconcile {:?}: {}", item, e);
            *failures += 1;
        }
    }
}

/// Returns false when the row vanished before its transaction started.
async fn reconcile_item(store: &dyn ForumStore, item: Item) -> Result<bool> {
    let mut tx = store.begin().await?;

    match item {
        Item::PostScore(id) => {
            if tx.lock_post(id).await?.is_none() {
                return Ok(false);
            }
            score_service::recompute_score(tx.as_mut(), VoteTarget::Post(id)).await?;
        }
        Item::CommentScore(id) => {
            if tx.lock_comment(id).await?.is_none() {
                return Ok(false);
            }
            score_service::recompute_score(tx.as_mut(), VoteTarget::Comment(id)).await?;
        }
        Item::CommentCount(id) => {
            if tx.lock_post(id).await?.is_none() {
                return Ok(false);
            }
            score_service::recompute_comment_count(tx.as_mut(), id).await?;
        }
        Item::MemberCount(id) => {
            if tx.get_community(id).await?.is_none() {
                return Ok(false);
            }
            score_service::recompute_member_count(tx.as_mut(), id).await?;
        }
        Item::Karma(id) => {
            if tx.get_user(id).await?.is_none() {
                return Ok(false);
            }
            score_service::recompute_karma(tx.as_mut(), id).await?;
        }
    }

    tx.commit().await?;
    Ok(true)
}
