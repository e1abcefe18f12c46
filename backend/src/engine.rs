use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;
use shared::models::*;
use crate::store::{bounded, PollStore, StoreError, VoteChanges, VoteStore};
use crate::voter_key::VoterKeyHasher;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VoteError {
    #[error("Poll or option does not exist")]
    PollOrOptionNotFound,
    #[error("Vote not found")]
    VoteNotFound,
    #[error("Your vote has already been accounted")]
    AlreadyAccounted,
    #[error("Vote was modified concurrently, please retry")]
    Contended,
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Casts, changes and withdraws votes while keeping the poll tallies equal
/// to the recorded votes. Nothing else writes tally counters.
pub struct VotingEngine {
    polls: Arc<dyn PollStore>,
    votes: Arc<dyn VoteStore>,
    hasher: VoterKeyHasher,
    storage_timeout: Duration,
}

impl VotingEngine {
    pub fn new(
        polls: Arc<dyn PollStore>,
        votes: Arc<dyn VoteStore>,
        hasher: VoterKeyHasher,
        storage_timeout: Duration,
    ) -> Self {
        Self { polls, votes, hasher, storage_timeout }
    }

    pub fn voter_key(&self, user_id: &str) -> String {
        self.hasher.voter_key(user_id)
    }

    async fn call<T>(&self, call: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
        bounded(self.storage_timeout, call).await
    }

    pub async fn cast_vote(
        &self,
        poll_id: Uuid,
        option_id: Uuid,
        user_id: &str,
        visibility: VoteVisibility,
    ) -> Result<Vote, VoteError> {
        self.call(self.polls.find_poll_with_option(poll_id, option_id))
            .await
            .map_err(|e| match e {
                StoreError::NotFound => VoteError::PollOrOptionNotFound,
                other => VoteError::Storage(other),
            })?;

        let voter_key = self.voter_key(user_id);
        let existing = match self.call(self.votes.find_vote_for(&voter_key, poll_id)).await? {
            Some(existing) => existing,
            None => match self.record_new_vote(&voter_key, poll_id, option_id, visibility).await {
                Err(VoteError::Storage(StoreError::DuplicateVote)) => {
                    debug!(%poll_id, "Lost insert race, switching to the update path");
                    self.call(self.votes.find_vote_for(&voter_key, poll_id))
                        .await?
                        .ok_or(VoteError::Contended)?
                }
                recorded => return recorded,
            },
        };

        self.change_vote(&voter_key, existing, option_id, visibility).await
    }

    async fn record_new_vote(
        &self,
        voter_key: &str,
        poll_id: Uuid,
        option_id: Uuid,
        visibility: VoteVisibility,
    ) -> Result<Vote, VoteError> {
        let vote = self.call(self.votes.create_vote(voter_key, poll_id, option_id, visibility))
            .await
            .map_err(|e| match e {
                StoreError::NotFound => VoteError::PollOrOptionNotFound,
                other => VoteError::Storage(other),
            })?;

        if let Err(e) = self.call(self.polls.increment_tally(poll_id, option_id, 1)).await {
            warn!(%poll_id, %option_id, "Tally increment failed after insert, removing vote: {}", e);
            if let Err(undo) = self.call(self.votes.delete_vote(voter_key, poll_id)).await {
                error!(%poll_id, "Failed to remove untallied vote: {}", undo);
            }
            return Err(e.into());
        }

        Ok(vote)
    }

    async fn change_vote(
        &self,
        voter_key: &str,
        existing: Vote,
        option_id: Uuid,
        visibility: VoteVisibility,
    ) -> Result<Vote, VoteError> {
        let poll_id = existing.poll_id;
        let option_changed = existing.option_id != option_id;
        let visibility_changed = existing.vote_visibility != visibility;

        if !option_changed && !visibility_changed {
            return Err(VoteError::AlreadyAccounted);
        }

        // The old option is released before the record moves so that a
        // failure here leaves the record matching the tally.
        if option_changed {
            self.call(self.polls.increment_tally(poll_id, existing.option_id, -1)).await?;
        }

        // Conditional on the option read above, so a concurrent change to
        // the same vote cannot release the old option twice.
        let changes = VoteChanges {
            option_id: option_changed.then_some(option_id),
            vote_visibility: visibility_changed.then_some(visibility),
            expected_option_id: Some(existing.option_id),
        };
        let updated = match self.call(self.votes.update_vote(voter_key, poll_id, changes)).await {
            Ok(updated) => updated,
            Err(e) => {
                if option_changed {
                    self.restore_tally(poll_id, existing.option_id).await;
                }
                return Err(match e {
                    StoreError::NotFound => {
                        debug!(%poll_id, "Vote changed concurrently, update skipped");
                        VoteError::Contended
                    }
                    other => other.into(),
                });
            }
        };

        if option_changed {
            if let Err(e) = self.call(self.polls.increment_tally(poll_id, option_id, 1)).await {
                warn!(%poll_id, %option_id, "Tally increment failed after update, reverting vote: {}", e);
                let revert = VoteChanges {
                    option_id: Some(existing.option_id),
                    vote_visibility: None,
                    expected_option_id: Some(option_id),
                };
                match self.call(self.votes.update_vote(voter_key, poll_id, revert)).await {
                    Ok(_) => self.restore_tally(poll_id, existing.option_id).await,
                    Err(undo) => error!(%poll_id, "Failed to revert vote option: {}", undo),
                }
                return Err(e.into());
            }
        }

        Ok(updated)
    }

    async fn restore_tally(&self, poll_id: Uuid, option_id: Uuid) {
        if let Err(e) = self.call(self.polls.increment_tally(poll_id, option_id, 1)).await {
            error!(%poll_id, %option_id, "Failed to restore tally: {}", e);
        }
    }

    pub async fn unvote(&self, user_id: &str, poll_id: Uuid) -> Result<Vote, VoteError> {
        let voter_key = self.voter_key(user_id);
        let deleted = self.call(self.votes.delete_vote(&voter_key, poll_id))
            .await
            .map_err(|e| match e {
                StoreError::NotFound => VoteError::VoteNotFound,
                other => VoteError::Storage(other),
            })?;

        if let Err(e) = self.call(self.polls.increment_tally(poll_id, deleted.option_id, -1)).await {
            warn!(
                %poll_id,
                option_id = %deleted.option_id,
                "Tally decrement failed after removing vote, counter left for the audit: {}", e
            );
            return Err(e.into());
        }
        Ok(deleted)
    }
}
