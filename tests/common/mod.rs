#![allow(dead_code)]

pub mod faults;

use std::sync::Arc;

use forum_core::{
    models::{Comment, Community, CreateCommunityRequest, CreatePostRequest, Post, User},
    services::{comment_service, community_service, post_service, user_service},
    store::MemoryStore,
};
use uuid::Uuid;

pub fn store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

pub async fn user(store: &MemoryStore, username: &str) -> User {
    user_service::create_user(store, username).await.unwrap()
}

pub async fn community(store: &MemoryStore, creator: &User, name: &str) -> Community {
    let payload = CreateCommunityRequest {
        user_id: Some(creator.id),
        name: name.to_string(),
        display_name: None,
        description: None,
    };
    community_service::create_community(store, creator.id, payload)
        .await
        .unwrap()
}

pub async fn post(store: &MemoryStore, author: &User, community: &Community, title: &str) -> Post {
    let payload = CreatePostRequest {
        user_id: Some(author.id),
        community_id: Some(community.id),
        title: title.to_string(),
        content: Some(format!("body of {}", title)),
        url: None,
        image_url: None,
        post_type: None,
    };
    post_service::create_post(store, author.id, community.id, payload)
        .await
        .unwrap()
}

pub async fn comment(
    store: &MemoryStore,
    author: &User,
    post_id: Uuid,
    parent: Option<Uuid>,
    content: &str,
) -> Comment {
    comment_service::add_comment(store, author.id, post_id, content, parent)
        .await
        .unwrap()
}

/// One author with a community and a post in it.
pub struct Forum {
    pub store: Arc<MemoryStore>,
    pub author: User,
    pub community: Community,
    pub post: Post,
}

pub async fn forum() -> Forum {
    let store = store();
    let author = user(&store, "author").await;
    let community = community(&store, &author, "general").await;
    let post = post(&store, &author, &community, "first post").await;
    Forum {
        store,
        author,
        community,
        post,
    }
}

impl Forum {
    pub async fn karma(&self, user_id: Uuid) -> i32 {
        user_service::get_user(&*self.store, user_id)
            .await
            .unwrap()
            .karma
    }

    pub async fn reload_post(&self) -> Post {
        post_service::get_post(&*self.store, self.post.id)
            .await
            .unwrap()
    }
}
