use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Validate, Deserialize)]
pub struct SearchQuery {
    #[validate(length(min = 1, max = 200))]
    pub q: String,
    pub page: Option<u32>,
    pub size: Option<u32>,
}
