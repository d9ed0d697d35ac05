use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteType {
    Upvote,
    Downvote,
}

impl VoteType {
    /// Storage representation: 1 for upvote, -1 for downvote.
    pub fn as_i16(self) -> i16 {
        match self {
            VoteType::Upvote => 1,
            VoteType::Downvote => -1,
        }
    }
}

impl TryFrom<i16> for VoteType {
    type Error = AppError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(VoteType::Upvote),
            -1 => Ok(VoteType::Downvote),
            other => Err(AppError::InvalidInput(format!(
                "Unknown stored vote type: {}",
                other
            ))),
        }
    }
}

impl FromStr for VoteType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            s if s.eq_ignore_ascii_case("UPVOTE") => Ok(VoteType::Upvote),
            s if s.eq_ignore_ascii_case("DOWNVOTE") => Ok(VoteType::Downvote),
            _ => Err(AppError::InvalidInput(
                "Vote type must be UPVOTE or DOWNVOTE".to_string(),
            )),
        }
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteType::Upvote => f.write_str("UPVOTE"),
            VoteType::Downvote => f.write_str("DOWNVOTE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Post,
    Comment,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Post => f.write_str("post"),
            TargetKind::Comment => f.write_str("comment"),
        }
    }
}

/// A votable entity: a post or a comment, by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteTarget {
    Post(Uuid),
    Comment(Uuid),
}

impl VoteTarget {
    pub fn new(kind: TargetKind, id: Uuid) -> Self {
        match kind {
            TargetKind::Post => VoteTarget::Post(id),
            TargetKind::Comment => VoteTarget::Comment(id),
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            VoteTarget::Post(_) => TargetKind::Post,
            VoteTarget::Comment(_) => TargetKind::Comment,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            VoteTarget::Post(id) | VoteTarget::Comment(id) => *id,
        }
    }
}

impl fmt::Display for VoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.id())
    }
}

/// One ledger row. Post and comment votes share the shape; the table decides the kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub target_id: Uuid,
    pub vote_type: VoteType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Vote request
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub user_id: Option<Uuid>,
    pub vote_type: Option<String>, // "UPVOTE" or "DOWNVOTE"
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteAction {
    Created,
    Changed,
    Removed,
    Unchanged,
}

// Vote response
#[derive(Debug, Clone, Serialize)]
pub struct VoteResponse {
    pub target_kind: TargetKind,
    pub target_id: Uuid,
    pub action: VoteAction,
    pub user_vote: Option<VoteType>,
    pub upvotes: i32,
    pub downvotes: i32,
    pub score: i32,
    pub author_karma: i32,
}

#[derive(Debug, Serialize)]
pub struct VoteStatusResponse {
    pub vote_type: Option<VoteType>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vote_types_case_insensitively() {
        assert_eq!("UPVOTE".parse::<VoteType>().unwrap(), VoteType::Upvote);
        assert_eq!(" downvote ".parse::<VoteType>().unwrap(), VoteType::Downvote);
        assert!(matches!(
            "SIDEWAYS".parse::<VoteType>(),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn storage_representation() {
        assert_eq!(VoteType::Upvote.as_i16(), 1);
        assert_eq!(VoteType::try_from(-1i16).unwrap(), VoteType::Downvote);
        assert!(VoteType::try_from(0i16).is_err());
    }

    #[test]
    fn serializes_as_screaming_case() {
        assert_eq!(
            serde_json::to_string(&VoteType::Downvote).unwrap(),
            "\"DOWNVOTE\""
        );
    }

    #[test]
    fn target_round_trips_kind_and_id() {
        let id = Uuid::new_v4();
        let target = VoteTarget::new(TargetKind::Comment, id);
        assert_eq!(target, VoteTarget::Comment(id));
        assert_eq!(target.kind(), TargetKind::Comment);
        assert_eq!(target.id(), id);
    }
}
