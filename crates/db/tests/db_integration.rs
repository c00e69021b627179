//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `pollcast_test`)
//!   `TEST_DB_PASSWORD` (default: `pollcast_test`)
//!   `TEST_DB_NAME` (default: `pollcast_test`)

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use chrono::Utc;
use pollcast_db::entities::{comment, poll};
use pollcast_db::repositories::{CommentRepository, PollRepository, UserStatsRepository};
use pollcast_db::test_utils::{TestDatabase, TestDbConfig};
use sea_orm::Set;
use serde_json::json;

fn new_poll(id: &str) -> poll::ActiveModel {
    poll::ActiveModel {
        id: Set(id.to_string()),
        title: Set("Favourite colour".to_string()),
        description: Set("Pick one".to_string()),
        options: Set(json!([
            {"id": "option_0", "text": "Red"},
            {"id": "option_1", "text": "Blue"},
        ])),
        created_by: Set("creator".to_string()),
        category: Set(poll::PollCategory::Other),
        image: Set(None),
        total_votes: Set(0),
        created_at: Set(Utc::now().into()),
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_poll_round_trip_and_vote_total() {
    let db = TestDatabase::new().await.expect("Failed to connect");
    db.cleanup().await.unwrap();
    let conn = Arc::new(db.conn);

    let repo = PollRepository::new(conn);
    repo.create(new_poll("itest-poll")).await.unwrap();
    repo.increment_total_votes("itest-poll").await.unwrap();
    repo.increment_total_votes("itest-poll").await.unwrap();

    let stored = repo.get_by_id("itest-poll").await.unwrap();
    assert_eq!(stored.total_votes, 2);
    assert_eq!(stored.parsed_options().unwrap()[1].text, "Blue");
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_comments_listed_oldest_first() {
    let db = TestDatabase::new().await.expect("Failed to connect");
    db.cleanup().await.unwrap();
    let conn = Arc::new(db.conn);

    PollRepository::new(conn.clone())
        .create(new_poll("itest-comments"))
        .await
        .unwrap();

    let repo = CommentRepository::new(conn);
    for (i, text) in ["first", "second"].iter().enumerate() {
        repo.create(comment::ActiveModel {
            id: Set(format!("c{i}")),
            poll_id: Set("itest-comments".to_string()),
            user_id: Set("user1".to_string()),
            user_name: Set(None),
            text: Set((*text).to_string()),
            created_at: Set((Utc::now() + chrono::Duration::seconds(i as i64)).into()),
        })
        .await
        .unwrap();
    }

    let comments = repo.find_by_poll("itest-comments").await.unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].text, "first");
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_user_stats_upsert() {
    let db = TestDatabase::new().await.expect("Failed to connect");
    db.cleanup().await.unwrap();
    let conn = Arc::new(db.conn);

    let repo = UserStatsRepository::new(conn);
    repo.increment_polls_created("user1").await.unwrap();
    repo.increment_polls_created("user1").await.unwrap();
    repo.increment_polls_voted("user1").await.unwrap();

    let stats = repo.find_by_user_id("user1").await.unwrap().unwrap();
    assert_eq!(stats.polls_created, 2);
    assert_eq!(stats.polls_voted, 1);
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.username.is_empty());
    assert!(!config.database.is_empty());
}
