//! At most one vote per (voter, target), for posts and comments.

use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{VoteTarget, VoteType},
    store::StoreTx,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Changed,
    /// A row of the requested type was already there.
    Unchanged,
}

/// Fails with `NotFound` unless both the voter and the target exist.
pub async fn ensure_participants(tx: &mut dyn StoreTx, voter_id: Uuid, target: VoteTarget) -> Result<()> {
    if tx.get_user(voter_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    let exists = match target {
        VoteTarget::Post(id) => tx.get_post(id).await?.is_some(),
        VoteTarget::Comment(id) => tx.get_comment(id).await?.is_some(),
    };
    if !exists {
        return Err(AppError::NotFound(format!("{} not found", target)));
    }
    Ok(())
}

pub async fn find_vote(
    tx: &mut dyn StoreTx,
    voter_id: Uuid,
    target: VoteTarget,
) -> Result<Option<VoteType>> {
    tx.find_vote(target.kind(), voter_id, target.id()).await
}

/// Writes `vote_type` for the pair. A racing insert that slipped in between
/// the read and the write comes back as `Conflict`.
pub async fn upsert_vote(
    tx: &mut dyn StoreTx,
    voter_id: Uuid,
    target: VoteTarget,
    vote_type: VoteType,
) -> Result<UpsertOutcome> {
    ensure_participants(tx, voter_id, target).await?;

    match tx.find_vote(target.kind(), voter_id, target.id()).await? {
        None => {
            tx.insert_vote(target.kind(), voter_id, target.id(), vote_type)
                .await?;
            Ok(UpsertOutcome::Created)
        }
        Some(current) if current == vote_type => Ok(UpsertOutcome::Unchanged),
        Some(_) => {
            if !tx
                .update_vote(target.kind(), voter_id, target.id(), vote_type)
                .await?
            {
                return Err(AppError::Conflict(format!(
                    "Vote on {} changed concurrently",
                    target
                )));
            }
            Ok(UpsertOutcome::Changed)
        }
    }
}

/// Returns true if a row existed.
pub async fn delete_vote(tx: &mut dyn StoreTx, voter_id: Uuid, target: VoteTarget) -> Result<bool> {
    ensure_participants(tx, voter_id, target).await?;
    tx.delete_vote(target.kind(), voter_id, target.id()).await
}

pub async fn count_by_type(
    tx: &mut dyn StoreTx,
    target: VoteTarget,
    vote_type: VoteType,
) -> Result<i64> {
    tx.count_votes(target.kind(), target.id(), vote_type).await
}
