use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use forum_core::{AppState, config::Config, create_app, store::MemoryStore};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> Router {
    let state = AppState::new(Arc::new(MemoryStore::new()), Config::default());
    create_app(state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn id(value: &Value) -> String {
    value["id"].as_str().unwrap().to_string()
}

/// Creates a user, a community and a post; returns (author_id, post_id).
async fn seed(app: &Router) -> (String, String) {
    let (status, author) = send(app, Method::POST, "/api/users", Some(json!({"username": "author"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let author_id = id(&author);

    let (status, community) = send(
        app,
        Method::POST,
        "/api/communities",
        Some(json!({"user_id": author_id, "name": "general"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(community["member_count"], 1);

    let (status, post) = send(
        app,
        Method::POST,
        "/api/posts",
        Some(json!({
            "user_id": author_id,
            "community_id": id(&community),
            "title": "Hello",
            "content": "First!"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post["post_type"], "text");

    (author_id, id(&post))
}

#[tokio::test]
async fn vote_round_trip_over_http() {
    let app = app();
    let (author_id, post_id) = seed(&app).await;
    let (_, voter) = send(&app, Method::POST, "/api/users", Some(json!({"username": "voter"}))).await;
    let voter_id = id(&voter);

    let (status, vote) = send(
        &app,
        Method::POST,
        &format!("/api/posts/{}/vote", post_id),
        Some(json!({"user_id": voter_id, "vote_type": "upvote"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(vote["action"], "created");
    assert_eq!(vote["user_vote"], "UPVOTE");
    assert_eq!(vote["score"], 1);
    assert_eq!(vote["author_karma"], 1);

    let (status, current) = send(
        &app,
        Method::GET,
        &format!("/api/posts/{}/vote/{}", post_id, voter_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["vote_type"], "UPVOTE");

    let (status, removed) = send(
        &app,
        Method::DELETE,
        &format!("/api/posts/{}/vote/{}", post_id, voter_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed["action"], "removed");
    assert_eq!(removed["score"], 0);

    let (_, author) = send(&app, Method::GET, &format!("/api/users/{}", author_id), None).await;
    assert_eq!(author["karma"], 0);
}

#[tokio::test]
async fn bad_votes_are_rejected_with_json_errors() {
    let app = app();
    let (author_id, post_id) = seed(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/posts/{}/vote", post_id),
        Some(json!({"user_id": author_id, "vote_type": "SIDEWAYS"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert_eq!(body["error"], "Vote type must be UPVOTE or DOWNVOTE");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/posts/{}/vote", post_id),
        Some(json!({"vote_type": "UPVOTE"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "user_id is required");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/posts/{}/vote", uuid::Uuid::new_v4()),
        Some(json!({"user_id": author_id, "vote_type": "UPVOTE"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn comment_thread_over_http() {
    let app = app();
    let (author_id, post_id) = seed(&app).await;

    let (status, parent) = send(
        &app,
        Method::POST,
        "/api/comments",
        Some(json!({"user_id": author_id, "post_id": post_id, "content": "parent"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, child) = send(
        &app,
        Method::POST,
        "/api/comments",
        Some(json!({
            "user_id": author_id,
            "post_id": post_id,
            "parent_comment_id": id(&parent),
            "content": "child"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, vote) = send(
        &app,
        Method::POST,
        &format!("/api/comments/{}/vote", id(&child)),
        Some(json!({"user_id": author_id, "vote_type": "DOWNVOTE"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(vote["target_kind"], "comment");
    assert_eq!(vote["score"], -1);

    let (status, thread) = send(
        &app,
        Method::GET,
        &format!("/api/posts/{}/comments?page=0&size=5&sort=old", post_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thread["size"], 5);
    let comments = thread["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["reply_count"], 1);
    assert_eq!(comments[0]["replies"][0]["content"], "child");
    assert_eq!(comments[0]["replies"][0]["score"], -1);

    let (_, post) = send(&app, Method::GET, &format!("/api/posts/{}", post_id), None).await;
    assert_eq!(post["comment_count"], 2);

    let (status, summary) = send(
        &app,
        Method::DELETE,
        &format!("/api/comments/{}", id(&parent)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["comments_deleted"], 2);
    assert_eq!(summary["votes_deleted"], 1);

    let (_, post) = send(&app, Method::GET, &format!("/api/posts/{}", post_id), None).await;
    assert_eq!(post["comment_count"], 0);
}

#[tokio::test]
async fn thread_of_unknown_post_is_not_found() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/posts/{}/comments", uuid::Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Post not found");
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
    let app = app();
    seed(&app).await;
    let (status, body) = send(&app, Method::POST, "/api/users", Some(json!({"username": "author"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], 409);
}

#[tokio::test]
async fn admin_reconcile_reports_work_done() {
    let app = app();
    let (_, post_id) = seed(&app).await;

    let (status, report) = send(&app, Method::POST, "/api/admin/reconcile", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["posts"], 1);
    assert_eq!(report["users"], 1);
    assert_eq!(report["failures"], 0);

    let (status, summary) = send(&app, Method::DELETE, &format!("/api/posts/{}", post_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["posts_deleted"], 1);

    let (_, listing) = send(&app, Method::GET, "/api/posts?sort=new", None).await;
    assert!(listing["posts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn edits_over_http_are_author_only() {
    let app = app();
    let (author_id, post_id) = seed(&app).await;
    let (_, stranger) = send(&app, Method::POST, "/api/users", Some(json!({"username": "stranger"}))).await;

    let (status, post) = send(
        &app,
        Method::PUT,
        &format!("/api/posts/{}", post_id),
        Some(json!({"user_id": author_id, "title": "Hello again"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(post["title"], "Hello again");
    assert_eq!(post["content"], "First!");

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/posts/{}", post_id),
        Some(json!({"user_id": id(&stranger), "title": "mine"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], 403);

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/posts/{}", post_id),
        Some(json!({"title": "anonymous"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, comment) = send(
        &app,
        Method::POST,
        "/api/comments",
        Some(json!({"user_id": author_id, "post_id": post_id, "content": "draft"})),
    )
    .await;
    let (status, edited) = send(
        &app,
        Method::PUT,
        &format!("/api/comments/{}", id(&comment)),
        Some(json!({"user_id": author_id, "content": "final"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["content"], "final");

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/comments/{}", id(&comment)),
        Some(json!({"user_id": id(&stranger), "content": "hijack"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn discovery_routes_over_http() {
    let app = app();
    let (author_id, post_id) = seed(&app).await;

    let (status, community) = send(&app, Method::GET, "/api/communities/name/general", None).await;
    assert_eq!(status, StatusCode::OK);
    let community_id = id(&community);

    let (status, members) = send(
        &app,
        Method::GET,
        &format!("/api/communities/{}/members", community_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(members[0]["id"], author_id.as_str());
    let (status, members) = send(&app, Method::GET, "/api/communities/name/general/members", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(members.as_array().unwrap().len(), 1);

    let (status, found) = send(&app, Method::GET, "/api/communities/search?q=GEN", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found[0]["id"], community_id.as_str());
    let (status, _) = send(&app, Method::GET, "/api/communities/search?q=", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, hits) = send(&app, Method::GET, "/api/posts/search?q=hello&size=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hits["size"], 5);
    assert_eq!(hits["posts"][0]["id"], post_id.as_str());

    let (status, feed) = send(&app, Method::GET, &format!("/api/posts/feed/{}", author_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed["posts"][0]["id"], post_id.as_str());
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/posts/feed/{}", uuid::Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, parent) = send(
        &app,
        Method::POST,
        "/api/comments",
        Some(json!({"user_id": author_id, "post_id": post_id, "content": "parent"})),
    )
    .await;
    send(
        &app,
        Method::POST,
        "/api/comments",
        Some(json!({
            "user_id": author_id,
            "post_id": post_id,
            "parent_comment_id": id(&parent),
            "content": "child"
        })),
    )
    .await;

    let (status, count) = send(
        &app,
        Method::GET,
        &format!("/api/posts/{}/comments/count", post_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count["count"], 2);
    let (status, count) = send(
        &app,
        Method::GET,
        &format!("/api/comments/{}/replies/count", id(&parent)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count["count"], 1);
}
