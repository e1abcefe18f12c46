use std::future::Future;
use std::time::Duration;
use uuid::Uuid;
use shared::models::*;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,
    #[error("A vote already exists for this voter and poll")]
    DuplicateVote,
    #[error("Storage call timed out")]
    Timeout,
    #[error("Failed to acquire store lock")]
    LockFailed,
    #[error("Database error: {0}")]
    Database(String),
}

/// Fields of an existing vote to overwrite. `None` leaves the field as is.
///
/// With `expected_option_id` set, the update only applies while the stored
/// vote still points at that option and reports `NotFound` otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VoteChanges {
    pub option_id: Option<Uuid>,
    pub vote_visibility: Option<VoteVisibility>,
    pub expected_option_id: Option<Uuid>,
}

/// Narrows vote lookups and listings. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoteFilter {
    pub vote_id: Option<Uuid>,
    pub ids: Option<Vec<Uuid>>,
    pub poll_id: Option<Uuid>,
    pub visibility: Option<VoteVisibility>,
    pub voter_key: Option<String>,
}

impl VoteFilter {
    pub fn public_by_ids(ids: Vec<Uuid>) -> Self {
        Self { ids: Some(ids), visibility: Some(VoteVisibility::Public), ..Self::default() }
    }

    pub fn public_by_id(vote_id: Uuid) -> Self {
        Self { vote_id: Some(vote_id), visibility: Some(VoteVisibility::Public), ..Self::default() }
    }

    pub fn private_of(voter_key: &str) -> Self {
        Self {
            visibility: Some(VoteVisibility::Private),
            voter_key: Some(voter_key.to_string()),
            ..Self::default()
        }
    }
}

#[rocket::async_trait]
pub trait PollStore: Send + Sync {
    async fn create_poll(&self, poll: &Poll) -> Result<Poll, StoreError>;

    async fn find_poll(&self, poll_id: Uuid) -> Result<Poll, StoreError>;

    /// Fails with `NotFound` unless the poll exists and owns the option.
    async fn find_poll_with_option(&self, poll_id: Uuid, option_id: Uuid) -> Result<Poll, StoreError>;

    async fn find_polls(&self, ids: &[Uuid]) -> Result<Vec<Poll>, StoreError>;

    async fn count_polls(&self) -> Result<u64, StoreError>;

    /// Newest first.
    async fn list_polls(&self, offset: u64, limit: u64) -> Result<Vec<Poll>, StoreError>;

    /// Deletes the poll together with every vote cast on it.
    async fn delete_poll(&self, poll_id: Uuid) -> Result<(), StoreError>;

    /// Adds `delta` to the option counter and the poll aggregate as one atomic step.
    async fn increment_tally(&self, poll_id: Uuid, option_id: Uuid, delta: i64) -> Result<Poll, StoreError>;
}

#[rocket::async_trait]
pub trait VoteStore: Send + Sync {
    async fn find_vote_for(&self, voter_key: &str, poll_id: Uuid) -> Result<Option<Vote>, StoreError>;

    /// Fails with `DuplicateVote` when the voter already has a vote on the poll.
    async fn create_vote(
        &self,
        voter_key: &str,
        poll_id: Uuid,
        option_id: Uuid,
        visibility: VoteVisibility,
    ) -> Result<Vote, StoreError>;

    async fn update_vote(&self, voter_key: &str, poll_id: Uuid, changes: VoteChanges) -> Result<Vote, StoreError>;

    async fn delete_vote(&self, voter_key: &str, poll_id: Uuid) -> Result<Vote, StoreError>;

    async fn find_vote(&self, filter: &VoteFilter) -> Result<Vote, StoreError>;

    async fn count_votes(&self, filter: &VoteFilter) -> Result<u64, StoreError>;

    /// Most recently updated first.
    async fn list_votes(&self, filter: &VoteFilter, offset: u64, limit: u64) -> Result<Vec<Vote>, StoreError>;
}

/// Runs a storage call, failing with `StoreError::Timeout` once `limit` elapses.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(StoreError::Timeout))
}
