mod common;

use forum_core::{
    error::AppError,
    models::{PostType, UpdatePostRequest, VoteTarget, VoteType},
    services::{comment_service, post_service, voting_service},
};
use uuid::Uuid;

use common::{comment, forum, user};

#[tokio::test]
async fn author_edits_keep_votes_and_counters() {
    let forum = forum().await;
    let store = &*forum.store;
    let voter = user(store, "voter").await;
    comment(store, &voter, forum.post.id, None, "first!").await;
    voting_service::cast_vote(store, voter.id, VoteTarget::Post(forum.post.id), VoteType::Upvote)
        .await
        .unwrap();

    let edit = UpdatePostRequest {
        title: Some("  renamed  ".to_string()),
        content: Some("new body".to_string()),
        ..Default::default()
    };
    let edited = post_service::update_post(store, forum.post.id, forum.author.id, edit)
        .await
        .unwrap();
    assert_eq!(edited.title, "renamed");
    assert_eq!(edited.content.as_deref(), Some("new body"));
    assert!(edited.updated_at >= forum.post.updated_at);

    let post = forum.reload_post().await;
    assert_eq!(post.title, "renamed");
    assert_eq!((post.upvotes, post.score, post.comment_count), (1, 1, 1));
    assert_eq!(post.created_at, forum.post.created_at);
    assert_eq!(forum.karma(forum.author.id).await, 1);
}

#[tokio::test]
async fn only_the_author_may_edit_a_post() {
    let forum = forum().await;
    let stranger = user(&forum.store, "stranger").await;

    let edit = UpdatePostRequest {
        title: Some("hijacked".to_string()),
        ..Default::default()
    };
    let err = post_service::update_post(&*forum.store, forum.post.id, stranger.id, edit)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));
    assert_eq!(forum.reload_post().await.title, "first post");

    let missing = post_service::update_post(
        &*forum.store,
        Uuid::new_v4(),
        forum.author.id,
        UpdatePostRequest::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(missing, AppError::NotFound(_)));
}

#[tokio::test]
async fn post_edits_must_leave_a_valid_post() {
    let forum = forum().await;
    let store = &*forum.store;

    let blank_title = UpdatePostRequest {
        title: Some("   ".to_string()),
        ..Default::default()
    };
    let err = post_service::update_post(store, forum.post.id, forum.author.id, blank_title)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let link_without_url = UpdatePostRequest {
        post_type: Some(PostType::Link),
        ..Default::default()
    };
    let err = post_service::update_post(store, forum.post.id, forum.author.id, link_without_url)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let link = UpdatePostRequest {
        post_type: Some(PostType::Link),
        url: Some("https://example.com/story".to_string()),
        ..Default::default()
    };
    let edited = post_service::update_post(store, forum.post.id, forum.author.id, link)
        .await
        .unwrap();
    assert_eq!(edited.post_type, PostType::Link);
    assert_eq!(edited.url.as_deref(), Some("https://example.com/story"));

    let post = forum.reload_post().await;
    assert_eq!(post.title, "first post");
    assert_eq!(post.post_type, PostType::Link);
}

#[tokio::test]
async fn comment_edits_are_author_only_and_non_empty() {
    let forum = forum().await;
    let store = &*forum.store;
    let replier = user(store, "replier").await;
    let voter = user(store, "voter").await;
    let c = comment(store, &replier, forum.post.id, None, "tpyo").await;
    voting_service::cast_vote(store, voter.id, VoteTarget::Comment(c.id), VoteType::Upvote)
        .await
        .unwrap();

    let edited = comment_service::update_comment(store, c.id, replier.id, " typo ")
        .await
        .unwrap();
    assert_eq!(edited.content, "typo");
    assert_eq!(edited.score, 1);
    assert_eq!(edited.parent_comment_id, None);

    let err = comment_service::update_comment(store, c.id, forum.author.id, "mine now")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));

    let err = comment_service::update_comment(store, c.id, replier.id, "  ")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let err = comment_service::update_comment(store, Uuid::new_v4(), replier.id, "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let stored = comment_service::get_comment(store, c.id).await.unwrap();
    assert_eq!(stored.content, "typo");
    assert_eq!(forum.karma(replier.id).await, 1);
}
