use uuid::Uuid;

use crate::{
    error::{AppError, Result, to_counter},
    models::{VoteTarget, VoteType},
    services::vote_ledger,
    store::StoreTx,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreSnapshot {
    pub upvotes: i32,
    pub downvotes: i32,
    pub score: i32,
}

/// Recounts the ledger for one target and stores upvotes, downvotes and score.
pub async fn recompute_score(tx: &mut dyn StoreTx, target: VoteTarget) -> Result<ScoreSnapshot> {
    let upvotes = vote_ledger::count_by_type(tx, target, VoteType::Upvote).await?;
    let downvotes = vote_ledger::count_by_type(tx, target, VoteType::Downvote).await?;

    let snapshot = ScoreSnapshot {
        upvotes: to_counter(upvotes, "upvotes")?,
        downvotes: to_counter(downvotes, "downvotes")?,
        score: to_counter(upvotes - downvotes, "score")?,
    };

    match target {
        VoteTarget::Post(id) => {
            tx.set_post_votes(id, snapshot.upvotes, snapshot.downvotes, snapshot.score)
                .await?
        }
        VoteTarget::Comment(id) => {
            tx.set_comment_votes(id, snapshot.upvotes, snapshot.downvotes, snapshot.score)
                .await?
        }
    }

    Ok(snapshot)
}

/// Karma is the sum of scores over every post and comment the user wrote.
pub async fn recompute_karma(tx: &mut dyn StoreTx, user_id: Uuid) -> Result<i32> {
    let post_karma = tx.sum_post_scores_by_author(user_id).await?;
    let comment_karma = tx.sum_comment_scores_by_author(user_id).await?;

    let karma = to_counter(post_karma + comment_karma, "karma")?;
    tx.set_user_karma(user_id, karma).await?;

    Ok(karma)
}

pub async fn author_of(tx: &mut dyn StoreTx, target: VoteTarget) -> Result<Uuid> {
    let author = match target {
        VoteTarget::Post(id) => tx.get_post(id).await?.map(|p| p.author_id),
        VoteTarget::Comment(id) => tx.get_comment(id).await?.map(|c| c.author_id),
    };
    author.ok_or_else(|| AppError::NotFound(format!("{} not found", target)))
}

/// Score for the target, then karma for its author.
pub async fn refresh_target(tx: &mut dyn StoreTx, target: VoteTarget) -> Result<(ScoreSnapshot, i32)> {
    let snapshot = recompute_score(tx, target).await?;
    let author_id = author_of(tx, target).await?;
    let karma = recompute_karma(tx, author_id).await?;

    tracing::debug!(
        "Refreshed {}: score {} ({}/{}), author {} karma {}",
        target,
        snapshot.score,
        snapshot.upvotes,
        snapshot.downvotes,
        author_id,
        karma
    );

    Ok((snapshot, karma))
}

/// Recounts the comments on a post, replies at every depth included.
pub async fn recompute_comment_count(tx: &mut dyn StoreTx, post_id: Uuid) -> Result<i32> {
    let count = to_counter(tx.count_comments_for_post(post_id).await?, "comment_count")?;
    tx.set_post_comment_count(post_id, count).await?;
    Ok(count)
}

pub async fn recompute_member_count(tx: &mut dyn StoreTx, community_id: Uuid) -> Result<i32> {
    let count = to_counter(tx.count_members(community_id).await?, "member_count")?;
    tx.set_member_count(community_id, count).await?;
    Ok(count)
}
