use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use time::OffsetDateTime;
use uuid::Uuid;
use shared::models::*;
use crate::store::{PollStore, StoreError, VoteChanges, VoteFilter, VoteStore};

struct VoteRow {
    voter_key: String,
    vote: Vote,
}

impl VoteRow {
    fn matches(&self, filter: &VoteFilter) -> bool {
        filter.vote_id.map_or(true, |id| self.vote.id == id)
            && filter.ids.as_ref().map_or(true, |ids| ids.contains(&self.vote.id))
            && filter.poll_id.map_or(true, |id| self.vote.poll_id == id)
            && filter.visibility.map_or(true, |v| self.vote.vote_visibility == v)
            && filter.voter_key.as_ref().map_or(true, |key| &self.voter_key == key)
    }
}

type VoteKey = (String, Uuid);

/// Process-local poll and vote storage. Votes are keyed by
/// (voter key, poll id), which makes a second vote for the same pair
/// impossible to insert.
#[derive(Default)]
pub struct MemoryStore {
    polls: Mutex<HashMap<Uuid, Poll>>,
    votes: Mutex<HashMap<VoteKey, VoteRow>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex.lock().map_err(|_| StoreError::LockFailed)
}

fn page<T: Clone>(items: &[T], offset: u64, limit: u64) -> Vec<T> {
    items.iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .cloned()
        .collect()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes every counter from the stored votes and returns how many
    /// counters had drifted.
    pub fn reconcile_tallies(&self) -> Result<u64, StoreError> {
        let mut polls = lock(&self.polls)?;
        let votes = lock(&self.votes)?;

        let mut counts: HashMap<(Uuid, Uuid), i64> = HashMap::new();
        for row in votes.values() {
            *counts.entry((row.vote.poll_id, row.vote.option_id)).or_insert(0) += 1;
        }

        let mut repaired = 0;
        for poll in polls.values_mut() {
            for option in poll.options.iter_mut() {
                let actual = counts.get(&(poll.id, option.id)).copied().unwrap_or(0);
                if option.vote_quantity != actual {
                    option.vote_quantity = actual;
                    repaired += 1;
                }
            }
            let total: i64 = poll.options.iter().map(|option| option.vote_quantity).sum();
            if poll.vote_quantity != total {
                poll.vote_quantity = total;
                repaired += 1;
            }
        }
        Ok(repaired)
    }
}

#[rocket::async_trait]
impl PollStore for MemoryStore {
    async fn create_poll(&self, poll: &Poll) -> Result<Poll, StoreError> {
        lock(&self.polls)?.insert(poll.id, poll.clone());
        Ok(poll.clone())
    }

    async fn find_poll(&self, poll_id: Uuid) -> Result<Poll, StoreError> {
        lock(&self.polls)?.get(&poll_id).cloned().ok_or(StoreError::NotFound)
    }

    async fn find_poll_with_option(&self, poll_id: Uuid, option_id: Uuid) -> Result<Poll, StoreError> {
        lock(&self.polls)?
            .get(&poll_id)
            .filter(|poll| poll.has_option(option_id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_polls(&self, ids: &[Uuid]) -> Result<Vec<Poll>, StoreError> {
        let polls = lock(&self.polls)?;
        let mut found: Vec<Poll> = polls.values()
            .filter(|poll| ids.contains(&poll.id))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn count_polls(&self) -> Result<u64, StoreError> {
        Ok(lock(&self.polls)?.len() as u64)
    }

    async fn list_polls(&self, offset: u64, limit: u64) -> Result<Vec<Poll>, StoreError> {
        let mut polls: Vec<Poll> = lock(&self.polls)?.values().cloned().collect();
        polls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(&polls, offset, limit))
    }

    async fn delete_poll(&self, poll_id: Uuid) -> Result<(), StoreError> {
        let mut polls = lock(&self.polls)?;
        if polls.remove(&poll_id).is_none() {
            return Err(StoreError::NotFound);
        }
        lock(&self.votes)?.retain(|(_, voted_poll), _| *voted_poll != poll_id);
        Ok(())
    }

    async fn increment_tally(&self, poll_id: Uuid, option_id: Uuid, delta: i64) -> Result<Poll, StoreError> {
        let mut polls = lock(&self.polls)?;
        let poll = polls.get_mut(&poll_id).ok_or(StoreError::NotFound)?;
        let option = poll.options.iter_mut()
            .find(|option| option.id == option_id)
            .ok_or(StoreError::NotFound)?;

        option.vote_quantity += delta;
        poll.vote_quantity += delta;
        Ok(poll.clone())
    }
}

#[rocket::async_trait]
impl VoteStore for MemoryStore {
    async fn find_vote_for(&self, voter_key: &str, poll_id: Uuid) -> Result<Option<Vote>, StoreError> {
        Ok(lock(&self.votes)?
            .get(&(voter_key.to_string(), poll_id))
            .map(|row| row.vote.clone()))
    }

    async fn create_vote(
        &self,
        voter_key: &str,
        poll_id: Uuid,
        option_id: Uuid,
        visibility: VoteVisibility,
    ) -> Result<Vote, StoreError> {
        let mut votes = lock(&self.votes)?;
        let key = (voter_key.to_string(), poll_id);
        if votes.contains_key(&key) {
            return Err(StoreError::DuplicateVote);
        }

        let now = OffsetDateTime::now_utc();
        let vote = Vote {
            id: Uuid::new_v4(),
            poll_id,
            option_id,
            vote_visibility: visibility,
            created_at: now,
            updated_at: now,
        };
        votes.insert(key, VoteRow { voter_key: voter_key.to_string(), vote: vote.clone() });
        Ok(vote)
    }

    async fn update_vote(&self, voter_key: &str, poll_id: Uuid, changes: VoteChanges) -> Result<Vote, StoreError> {
        let mut votes = lock(&self.votes)?;
        let row = votes.get_mut(&(voter_key.to_string(), poll_id))
            .filter(|row| changes.expected_option_id.map_or(true, |expected| row.vote.option_id == expected))
            .ok_or(StoreError::NotFound)?;

        if let Some(option_id) = changes.option_id {
            row.vote.option_id = option_id;
        }
        if let Some(visibility) = changes.vote_visibility {
            row.vote.vote_visibility = visibility;
        }
        row.vote.updated_at = OffsetDateTime::now_utc();
        Ok(row.vote.clone())
    }

    async fn delete_vote(&self, voter_key: &str, poll_id: Uuid) -> Result<Vote, StoreError> {
        lock(&self.votes)?
            .remove(&(voter_key.to_string(), poll_id))
            .map(|row| row.vote)
            .ok_or(StoreError::NotFound)
    }

    async fn find_vote(&self, filter: &VoteFilter) -> Result<Vote, StoreError> {
        lock(&self.votes)?
            .values()
            .find(|row| row.matches(filter))
            .map(|row| row.vote.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn count_votes(&self, filter: &VoteFilter) -> Result<u64, StoreError> {
        Ok(lock(&self.votes)?.values().filter(|row| row.matches(filter)).count() as u64)
    }

    async fn list_votes(&self, filter: &VoteFilter, offset: u64, limit: u64) -> Result<Vec<Vote>, StoreError> {
        let mut votes: Vec<Vote> = lock(&self.votes)?
            .values()
            .filter(|row| row.matches(filter))
            .map(|row| row.vote.clone())
            .collect();
        votes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(page(&votes, offset, limit))
    }
}
