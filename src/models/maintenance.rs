use serde::Serialize;
use uuid::Uuid;

/// What a cascading delete removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteSummary {
    pub posts_deleted: u64,
    pub comments_deleted: u64,
    pub votes_deleted: u64,
    /// Authors whose karma was recomputed after the delete.
    pub authors_recomputed: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub posts: u64,
    pub comments: u64,
    pub comment_counts: u64,
    pub member_counts: u64,
    pub users: u64,
    /// Items that failed and were skipped; the sweep carries on past them.
    pub failures: u64,
}

impl ReconcileReport {
    pub fn total(&self) -> u64 {
        self.posts + self.comments + self.comment_counts + self.member_counts + self.users
    }
}
