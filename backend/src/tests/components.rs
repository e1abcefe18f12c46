use std::collections::HashMap;
use time::OffsetDateTime;
use super::*;
use crate::config::{ConfigError, VOTES_SECRET_KEY};
use crate::rate_limiter::{RateLimited, RateLimiter};
use crate::store::bounded;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let values: HashMap<String, String> = pairs.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| values.get(key).cloned()
}

#[test]
fn config_requires_the_vote_secret() {
    assert_eq!(
        AppConfig::from_lookup(lookup_from(&[])),
        Err(ConfigError::MissingSecret(VOTES_SECRET_KEY))
    );
    assert_eq!(
        AppConfig::from_lookup(lookup_from(&[(VOTES_SECRET_KEY, "   ")])),
        Err(ConfigError::MissingSecret(VOTES_SECRET_KEY))
    );
}

#[test]
fn config_defaults() {
    init_tracing();
    let config = AppConfig::from_lookup(lookup_from(&[(VOTES_SECRET_KEY, "s3cret")])).unwrap();
    assert_eq!(config.votes_secret, "s3cret");
    assert_eq!(config.storage_timeout, Duration::from_millis(5_000));
    assert_eq!(config.vote_rate_limit, 10);
    assert_eq!(config.vote_rate_window_minutes, 1);
    assert_eq!(config.tally_audit_interval, Duration::from_secs(300));
    assert_eq!(config.allowed_origin, "http://localhost");
    assert!(!format!("{config:?}").contains("s3cret"));
}

#[test]
fn config_rejects_unparseable_values() {
    let result = AppConfig::from_lookup(lookup_from(&[
        (VOTES_SECRET_KEY, "s3cret"),
        ("STORAGE_TIMEOUT_MS", "soon"),
    ]));
    assert!(matches!(
        result,
        Err(ConfigError::InvalidValue { key: "STORAGE_TIMEOUT_MS", ref value, .. }) if value == "soon"
    ));

    let config = AppConfig::from_lookup(lookup_from(&[
        (VOTES_SECRET_KEY, "s3cret"),
        ("VOTE_RATE_LIMIT", " 3 "),
        ("ALLOWED_ORIGIN", "https://polls.example"),
    ]))
    .unwrap();
    assert_eq!(config.vote_rate_limit, 3);
    assert_eq!(config.allowed_origin, "https://polls.example");
}

#[test]
fn voter_keys_are_stable_and_opaque() {
    let hasher = VoterKeyHasher::new("first-secret");
    let key = hasher.voter_key("alice");

    assert_eq!(key, hasher.voter_key("alice"));
    assert_ne!(key, hasher.voter_key("bob"));
    assert_ne!(key, VoterKeyHasher::new("second-secret").voter_key("alice"));
    assert!(!key.contains("alice"));
    // 32 byte tag, unpadded base64
    assert_eq!(key.len(), 43);
    assert_eq!(format!("{hasher:?}"), "VoterKeyHasher { .. }");
}

#[test]
fn rate_limiter_blocks_within_the_window() {
    let limiter = RateLimiter::new(2, 1);
    let start = OffsetDateTime::now_utc();

    assert!(limiter.check_at("cast_vote:a", start).is_ok());
    assert!(limiter.check_at("cast_vote:a", start).is_ok());
    assert_eq!(limiter.check_at("cast_vote:a", start), Err(RateLimited { retry_in_minutes: 1 }));
    assert!(limiter.check_at("cast_vote:b", start).is_ok());

    let later = start + time::Duration::seconds(61);
    assert!(limiter.check_at("cast_vote:a", later).is_ok());
}

#[tokio::test]
async fn bounded_calls_time_out() {
    let slow = bounded(Duration::from_millis(10), async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok::<_, StoreError>(1)
    });
    assert_eq!(slow.await, Err(StoreError::Timeout));

    let quick = bounded(Duration::from_millis(100), async { Ok::<_, StoreError>(2) });
    assert_eq!(quick.await, Ok(2));
}

#[tokio::test]
async fn memory_store_rejects_a_second_vote_for_the_same_poll() {
    let store = MemoryStore::new();
    let poll = seed_poll(&store, &["Yes", "No"]).await;

    store.create_vote("key-1", poll.id, poll.options[0].id, VoteVisibility::Public).await.unwrap();
    let again = store.create_vote("key-1", poll.id, poll.options[1].id, VoteVisibility::Private).await;
    assert_eq!(again, Err(StoreError::DuplicateVote));

    store.create_vote("key-2", poll.id, poll.options[1].id, VoteVisibility::Private).await.unwrap();
    let filter = VoteFilter { poll_id: Some(poll.id), ..VoteFilter::default() };
    assert_eq!(store.count_votes(&filter).await, Ok(2));
}

#[tokio::test]
async fn memory_store_update_only_touches_given_fields() {
    let store = MemoryStore::new();
    let poll = seed_poll(&store, &["Yes", "No"]).await;
    let created = store.create_vote("key-1", poll.id, poll.options[0].id, VoteVisibility::Public).await.unwrap();

    let changes = VoteChanges { vote_visibility: Some(VoteVisibility::Private), ..VoteChanges::default() };
    let updated = store.update_vote("key-1", poll.id, changes).await.unwrap();
    assert_eq!(updated.option_id, created.option_id);
    assert_eq!(updated.vote_visibility, VoteVisibility::Private);
    assert!(updated.updated_at >= created.updated_at);

    let missing = store.update_vote("key-2", poll.id, changes).await;
    assert_eq!(missing, Err(StoreError::NotFound));
}

#[tokio::test]
async fn memory_store_conditional_update_checks_the_current_option() {
    let store = MemoryStore::new();
    let poll = seed_poll(&store, &["Yes", "No"]).await;
    let (yes, no) = (poll.options[0].id, poll.options[1].id);
    store.create_vote("key-1", poll.id, yes, VoteVisibility::Public).await.unwrap();

    let stale = VoteChanges { option_id: Some(yes), expected_option_id: Some(no), ..VoteChanges::default() };
    assert_eq!(store.update_vote("key-1", poll.id, stale).await, Err(StoreError::NotFound));

    let current = VoteChanges { option_id: Some(no), expected_option_id: Some(yes), ..VoteChanges::default() };
    assert_eq!(store.update_vote("key-1", poll.id, current).await.unwrap().option_id, no);
}

#[tokio::test]
async fn memory_store_increment_is_scoped_to_the_poll() {
    let store = MemoryStore::new();
    let poll = seed_poll(&store, &["Yes", "No"]).await;
    let other = seed_poll(&store, &["Up", "Down"]).await;

    let updated = store.increment_tally(poll.id, poll.options[1].id, 1).await.unwrap();
    assert_eq!(updated.options[1].vote_quantity, 1);
    assert_eq!(updated.vote_quantity, 1);

    let foreign = store.increment_tally(poll.id, other.options[0].id, 1).await;
    assert_eq!(foreign, Err(StoreError::NotFound));
    assert_eq!(store.find_poll(poll.id).await.unwrap().vote_quantity, 1);
}

#[tokio::test]
async fn reconcile_repairs_drifted_counters() {
    let store = MemoryStore::new();
    let poll = seed_poll(&store, &["Yes", "No"]).await;
    store.create_vote("key-1", poll.id, poll.options[0].id, VoteVisibility::Public).await.unwrap();

    // Counter moved without a matching vote.
    store.increment_tally(poll.id, poll.options[1].id, 3).await.unwrap();

    // Yes is short by one, No is over by three, the aggregate is off too.
    assert_eq!(store.reconcile_tallies(), Ok(3));

    let repaired = store.find_poll(poll.id).await.unwrap();
    assert_eq!(repaired.options[0].vote_quantity, 1);
    assert_eq!(repaired.options[1].vote_quantity, 0);
    assert_eq!(repaired.vote_quantity, 1);
    assert_eq!(store.reconcile_tallies(), Ok(0));
}

#[tokio::test]
async fn deleting_a_poll_removes_its_votes() {
    let store = MemoryStore::new();
    let poll = seed_poll(&store, &["Yes", "No"]).await;
    let kept = seed_poll(&store, &["Up", "Down"]).await;
    store.create_vote("key-1", poll.id, poll.options[0].id, VoteVisibility::Public).await.unwrap();
    store.create_vote("key-1", kept.id, kept.options[0].id, VoteVisibility::Public).await.unwrap();

    store.delete_poll(poll.id).await.unwrap();
    assert_eq!(store.find_poll(poll.id).await, Err(StoreError::NotFound));
    assert_eq!(store.find_vote_for("key-1", poll.id).await, Ok(None));
    assert!(store.find_vote_for("key-1", kept.id).await.unwrap().is_some());
    assert_eq!(store.delete_poll(poll.id).await, Err(StoreError::NotFound));
}

#[tokio::test]
async fn listings_are_paged_newest_first() {
    let store = MemoryStore::new();
    let mut created = Vec::new();
    for _ in 0..3 {
        created.push(seed_poll(&store, &["Yes", "No"]).await);
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    assert_eq!(store.count_polls().await, Ok(3));
    let page = store.list_polls(1, 5).await.unwrap();
    let ids: Vec<Uuid> = page.iter().map(|poll| poll.id).collect();
    assert_eq!(ids, [created[1].id, created[0].id]);

    let found = store.find_polls(&[created[2].id, created[2].id, Uuid::new_v4()]).await.unwrap();
    assert_eq!(found.len(), 1);
}
