//! Vote state machine: interprets a request against the ledger and keeps
//! score and karma in step with it inside the same transaction.

use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{VoteAction, VoteResponse, VoteTarget, VoteType},
    services::{
        score_service,
        vote_ledger::{self, UpsertOutcome},
    },
    store::{ForumStore, StoreTx},
};

/// Attempts per vote request before a ledger race is reported as `Conflict`.
pub const MAX_VOTE_ATTEMPTS: u32 = 3;

/// Applies `requested` on top of the current vote:
/// a new vote is inserted, the same type toggles off, the other type overwrites.
pub async fn cast_vote(
    store: &dyn ForumStore,
    voter_id: Uuid,
    target: VoteTarget,
    requested: VoteType,
) -> Result<VoteResponse> {
    let mut attempt = 1;
    loop {
        match try_cast_vote(store, voter_id, target, requested).await {
            Err(e) if e.is_conflict() && attempt < MAX_VOTE_ATTEMPTS => {
                tracing::warn!(
                    "Vote by {} on {} raced a concurrent write (attempt {}), retrying: {}",
                    voter_id,
                    target,
                    attempt,
                    e
                );
                attempt += 1;
            }
            result => return result,
        }
    }
}

async fn try_cast_vote(
    store: &dyn ForumStore,
    voter_id: Uuid,
    target: VoteTarget,
    requested: VoteType,
) -> Result<VoteResponse> {
    let mut tx = store.begin().await?;
    lock_target(tx.as_mut(), target).await?;

    let current = vote_ledger::find_vote(tx.as_mut(), voter_id, target).await?;

    let (action, user_vote) = match current {
        Some(existing) if existing == requested => {
            vote_ledger::delete_vote(tx.as_mut(), voter_id, target).await?;
            (VoteAction::Removed, None)
        }
        _ => {
            let outcome =
                vote_ledger::upsert_vote(tx.as_mut(), voter_id, target, requested).await?;
            let action = match outcome {
                UpsertOutcome::Created => VoteAction::Created,
                UpsertOutcome::Changed => VoteAction::Changed,
                UpsertOutcome::Unchanged => VoteAction::Unchanged,
            };
            (action, Some(requested))
        }
    };

    let response = finish(tx, target, action, user_vote).await?;
    tracing::debug!(
        "User {} {:?} vote {} on {} (score now {})",
        voter_id,
        action,
        requested,
        target,
        response.score
    );
    Ok(response)
}

/// Deletes any vote the user holds on the target. Recomputes either way.
pub async fn remove_vote(
    store: &dyn ForumStore,
    voter_id: Uuid,
    target: VoteTarget,
) -> Result<VoteResponse> {
    let mut tx = store.begin().await?;
    lock_target(tx.as_mut(), target).await?;

    let existed = vote_ledger::delete_vote(tx.as_mut(), voter_id, target).await?;
    let action = if existed {
        VoteAction::Removed
    } else {
        VoteAction::Unchanged
    };

    let response = finish(tx, target, action, None).await?;
    tracing::debug!(
        "User {} removed vote on {} (existed: {})",
        voter_id,
        target,
        existed
    );
    Ok(response)
}

pub async fn get_user_vote(
    store: &dyn ForumStore,
    voter_id: Uuid,
    target: VoteTarget,
) -> Result<Option<VoteType>> {
    let mut tx = store.begin().await?;
    vote_ledger::ensure_participants(tx.as_mut(), voter_id, target).await?;
    vote_ledger::find_vote(tx.as_mut(), voter_id, target).await
}

/// Serializes writers on the target row; a target deleted in the meantime is `NotFound`.
async fn lock_target(tx: &mut dyn StoreTx, target: VoteTarget) -> Result<()> {
    let found = match target {
        VoteTarget::Post(id) => tx.lock_post(id).await?.is_some(),
        VoteTarget::Comment(id) => tx.lock_comment(id).await?.is_some(),
    };
    if !found {
        return Err(AppError::NotFound(format!("{} not found", target)));
    }
    Ok(())
}

async fn finish(
    mut tx: Box<dyn StoreTx>,
    target: VoteTarget,
    action: VoteAction,
    user_vote: Option<VoteType>,
) -> Result<VoteResponse> {
    let (snapshot, author_karma) = score_service::refresh_target(tx.as_mut(), target).await?;
    tx.commit().await?;

    Ok(VoteResponse {
        target_kind: target.kind(),
        target_id: target.id(),
        action,
        user_vote,
        upvotes: snapshot.upvotes,
        downvotes: snapshot.downvotes,
        score: snapshot.score,
        author_karma,
    })
}
