use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;
use shared::models::*;
use shared::pagination::{Page, PageQuery, PageWindow};
use shared::validation::{parse_id_list, validate_poll_request};
use crate::error::ApiError;
use crate::store::{bounded, PollStore, StoreError, VoteFilter, VoteStore};

/// Poll management and read-only vote listings around the voting engine.
pub struct PollProcessor {
    polls: Arc<dyn PollStore>,
    votes: Arc<dyn VoteStore>,
    storage_timeout: Duration,
}

fn not_found(what: &'static str) -> impl Fn(StoreError) -> ApiError {
    move |e| match e {
        StoreError::NotFound => ApiError::NotFound(format!("{what} not found")),
        other => other.into(),
    }
}

impl PollProcessor {
    pub fn new(polls: Arc<dyn PollStore>, votes: Arc<dyn VoteStore>, storage_timeout: Duration) -> Self {
        Self { polls, votes, storage_timeout }
    }

    async fn call<T>(&self, call: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
        bounded(self.storage_timeout, call).await
    }

    pub fn build_poll(request: &CreatePollRequest, creator: &str) -> Poll {
        Poll {
            id: Uuid::new_v4(),
            title: request.title.clone(),
            options: request.options.iter()
                .map(|option| PollOption {
                    id: Uuid::new_v4(),
                    content: option.content.clone(),
                    vote_quantity: 0,
                })
                .collect(),
            vote_quantity: 0,
            creator: creator.to_string(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub async fn create_poll(&self, request: &CreatePollRequest, creator: &str) -> Result<Poll, ApiError> {
        validate_poll_request(request)?;
        let poll = Self::build_poll(request, creator);
        let created = self.call(self.polls.create_poll(&poll)).await?;
        info!(poll_id = %created.id, options = created.options.len(), "Created poll");
        Ok(created)
    }

    pub async fn find_poll(&self, poll_id: Uuid) -> Result<Poll, ApiError> {
        self.call(self.polls.find_poll(poll_id)).await.map_err(not_found("Poll"))
    }

    pub async fn find_polls(&self, ids: Option<&str>) -> Result<Vec<Poll>, ApiError> {
        let ids = parse_id_list(ids)?;
        let polls = self.call(self.polls.find_polls(&ids)).await?;
        if polls.is_empty() {
            return Err(ApiError::NotFound("Polls not found".into()));
        }
        Ok(polls)
    }

    pub async fn paginate_polls(&self, page: Option<u32>, limit: Option<u32>) -> Result<Page<Poll>, ApiError> {
        let query = PageQuery::parse(page, limit)?;
        let total = self.call(self.polls.count_polls()).await?;
        let window = PageWindow::new(query, total, "Polls")?;
        let polls = self.call(self.polls.list_polls(window.offset(), window.limit())).await?;
        Ok(Page::new(polls, &window))
    }

    /// Only the creator may delete a poll. Its votes go with it.
    pub async fn delete_poll(&self, poll_id: Uuid, user_id: &str) -> Result<Poll, ApiError> {
        let poll = self.find_poll(poll_id).await?;
        if poll.creator != user_id {
            return Err(ApiError::Forbidden("You are not allowed to delete this poll".into()));
        }
        self.call(self.polls.delete_poll(poll_id)).await.map_err(not_found("Poll"))?;
        info!(%poll_id, "Deleted poll");
        Ok(poll)
    }

    async fn paginate_votes(&self, filter: VoteFilter, page: Option<u32>, limit: Option<u32>) -> Result<Page<Vote>, ApiError> {
        let query = PageQuery::parse(page, limit)?;
        let total = self.call(self.votes.count_votes(&filter)).await?;
        let window = PageWindow::new(query, total, "Votes")?;
        let votes = self.call(self.votes.list_votes(&filter, window.offset(), window.limit())).await?;
        Ok(Page::new(votes, &window))
    }

    pub async fn paginate_public_votes(
        &self,
        ids: Option<&str>,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Page<Vote>, ApiError> {
        let ids = parse_id_list(ids)?;
        self.paginate_votes(VoteFilter::public_by_ids(ids), page, limit).await
    }

    pub async fn paginate_private_votes(
        &self,
        voter_key: &str,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Page<Vote>, ApiError> {
        self.paginate_votes(VoteFilter::private_of(voter_key), page, limit).await
    }

    pub async fn find_public_vote(&self, vote_id: Uuid) -> Result<Vote, ApiError> {
        self.call(self.votes.find_vote(&VoteFilter::public_by_id(vote_id)))
            .await
            .map_err(not_found("Vote"))
    }

    /// Someone else's private vote looks exactly like a missing one.
    pub async fn find_private_vote(&self, vote_id: Uuid, voter_key: &str) -> Result<Vote, ApiError> {
        let filter = VoteFilter { vote_id: Some(vote_id), ..VoteFilter::private_of(voter_key) };
        self.call(self.votes.find_vote(&filter))
            .await
            .map_err(not_found("Vote"))
    }
}
