pub mod comment;
pub mod community;
pub mod maintenance;
pub mod post;
pub mod search;
pub mod user;
pub mod vote;

pub use comment::*;
pub use community::*;
pub use maintenance::*;
pub use post::*;
pub use search::*;
pub use user::*;
pub use vote::*;
