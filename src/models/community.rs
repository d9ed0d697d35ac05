use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Community {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub member_count: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn validate_community_name(name: &str) -> Result<(), ValidationError> {
    // Only allow alphanumeric characters, underscores, and hyphens
    // No spaces, must start with letter
    let valid = name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        && name.chars().next().is_some_and(|c| c.is_alphabetic());

    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("community_name").with_message(
            "Community name must start with a letter and contain only letters, numbers, underscores, or hyphens".into(),
        ))
    }
}

// Create community request
#[derive(Debug, Validate, Deserialize)]
pub struct CreateCommunityRequest {
    pub user_id: Option<Uuid>,
    #[validate(
        length(min = 3, max = 50),
        custom(function = "validate_community_name")
    )]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub display_name: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MembershipRequest {
    pub user_id: Option<Uuid>,
}
