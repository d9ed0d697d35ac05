pub mod admin;
pub mod comments;
pub mod communities;
pub mod posts;
pub mod users;
pub mod votes;
