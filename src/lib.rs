pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod store;

use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{ACCEPT, CONTENT_TYPE},
    },
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{config::Config, store::ForumStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ForumStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn ForumStore>, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid allowed origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([ACCEPT, CONTENT_TYPE]);

    let user_routes = Router::new()
        .route("/api/users", post(handlers::users::create_user))
        .route("/api/users/{user_id}", get(handlers::users::get_user));

    let community_routes = Router::new()
        .route(
            "/api/communities",
            post(handlers::communities::create_community),
        )
        .route(
            "/api/communities/popular",
            get(handlers::communities::get_popular_communities),
        )
        .route(
            "/api/communities/search",
            get(handlers::communities::search_communities),
        )
        .route(
            "/api/communities/name/{name}",
            get(handlers::communities::get_community_by_name),
        )
        .route(
            "/api/communities/name/{name}/members",
            get(handlers::communities::get_community_members_by_name),
        )
        .route(
            "/api/communities/{community_id}/members",
            get(handlers::communities::get_community_members),
        )
        .route(
            "/api/communities/{community_id}",
            get(handlers::communities::get_community),
        )
        .route(
            "/api/communities/{community_id}/join",
            post(handlers::communities::join_community),
        )
        .route(
            "/api/communities/{community_id}/leave",
            post(handlers::communities::leave_community),
        );

    let post_routes = Router::new()
        .route(
            "/api/posts",
            get(handlers::posts::get_posts).post(handlers::posts::create_post),
        )
        .route("/api/posts/search", get(handlers::posts::search_posts))
        .route(
            "/api/posts/feed/{user_id}",
            get(handlers::posts::get_user_feed),
        )
        .route(
            "/api/posts/{post_id}",
            get(handlers::posts::get_post)
                .put(handlers::posts::update_post)
                .delete(handlers::posts::delete_post),
        )
        .route(
            "/api/posts/{post_id}/comments",
            get(handlers::comments::get_post_comments),
        )
        .route(
            "/api/posts/{post_id}/comments/count",
            get(handlers::comments::get_post_comment_count),
        )
        .route("/api/posts/{post_id}/vote", post(handlers::votes::vote_post))
        .route(
            "/api/posts/{post_id}/vote/{user_id}",
            get(handlers::votes::get_post_vote).delete(handlers::votes::remove_post_vote),
        );

    let comment_routes = Router::new()
        .route("/api/comments", post(handlers::comments::create_comment))
        .route(
            "/api/comments/{comment_id}",
            get(handlers::comments::get_comment)
                .put(handlers::comments::update_comment)
                .delete(handlers::comments::delete_comment),
        )
        .route(
            "/api/comments/{comment_id}/replies",
            get(handlers::comments::get_comment_replies),
        )
        .route(
            "/api/comments/{comment_id}/replies/count",
            get(handlers::comments::get_reply_count),
        )
        .route(
            "/api/comments/{comment_id}/vote",
            post(handlers::votes::vote_comment),
        )
        .route(
            "/api/comments/{comment_id}/vote/{user_id}",
            get(handlers::votes::get_comment_vote).delete(handlers::votes::remove_comment_vote),
        );

    let admin_routes =
        Router::new().route("/api/admin/reconcile", post(handlers::admin::reconcile));

    Router::new()
        .merge(user_routes)
        .merge(community_routes)
        .merge(post_routes)
        .merge(comment_routes)
        .merge(admin_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
