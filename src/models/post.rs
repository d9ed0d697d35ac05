use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "post_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    #[default]
    Text,
    Link,
    Image,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub post_type: PostType,
    pub author_id: Uuid,
    pub community_id: Uuid,
    pub upvotes: i32,
    pub downvotes: i32,
    pub score: i32,
    pub comment_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Create post request
#[derive(Debug, Validate, Deserialize)]
pub struct CreatePostRequest {
    pub user_id: Option<Uuid>,
    pub community_id: Option<Uuid>,
    #[validate(length(min = 1, max = 300))]
    pub title: String,
    #[validate(length(max = 40000))]
    pub content: Option<String>,
    #[validate(url)]
    pub url: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    pub post_type: Option<PostType>,
}

// Update post request; absent fields keep their current value
#[derive(Debug, Default, Validate, Deserialize)]
pub struct UpdatePostRequest {
    pub user_id: Option<Uuid>,
    #[validate(length(min = 1, max = 300))]
    pub title: Option<String>,
    #[validate(length(max = 40000))]
    pub content: Option<String>,
    #[validate(url)]
    pub url: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    pub post_type: Option<PostType>,
}

// Sorting options for posts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostSort {
    /// Static order: score, then recency. No time decay.
    #[default]
    Hot,
    Top,
    New,
}

#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub posts: Vec<Post>,
    pub page: u32,
    pub size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_sort_deserializes_lowercase() {
        let sort: PostSort = serde_json::from_str("\"top\"").unwrap();
        assert_eq!(sort, PostSort::Top);
        assert_eq!(PostSort::default(), PostSort::Hot);
        assert!(serde_json::from_str::<PostSort>("\"rising\"").is_err());
    }

    #[test]
    fn post_type_defaults_to_text() {
        assert_eq!(PostType::default(), PostType::Text);
        let image: PostType = serde_json::from_str("\"image\"").unwrap();
        assert_eq!(image, PostType::Image);
    }

    #[test]
    fn update_request_rejects_blank_title_and_bad_urls() {
        let update = |title: Option<&str>, url: Option<&str>| UpdatePostRequest {
            user_id: None,
            title: title.map(str::to_string),
            content: None,
            url: url.map(str::to_string),
            image_url: None,
            post_type: None,
        };
        assert!(update(None, None).validate().is_ok());
        assert!(update(Some("Better title"), Some("https://example.com")).validate().is_ok());
        assert!(update(Some(""), None).validate().is_err());
        assert!(update(None, Some("not a url")).validate().is_err());
    }
}
