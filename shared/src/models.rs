use serde::{Serialize, Deserialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "backend", derive(sqlx::Type))]
#[cfg_attr(feature = "backend", sqlx(type_name = "vote_visibility", rename_all = "lowercase"))]
pub enum VoteVisibility {
    Public,
    Private,
}

impl fmt::Display for VoteVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteVisibility::Public => f.write_str("public"),
            VoteVisibility::Private => f.write_str("private"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PollOption {
    pub id: Uuid,
    pub content: String,
    pub vote_quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: Uuid,
    pub title: String,
    pub options: Vec<PollOption>,
    pub vote_quantity: i64,
    pub creator: String,
    pub created_at: OffsetDateTime,
}

impl Poll {
    pub fn option(&self, option_id: Uuid) -> Option<&PollOption> {
        self.options.iter().find(|option| option.id == option_id)
    }

    pub fn has_option(&self, option_id: Uuid) -> bool {
        self.option(option_id).is_some()
    }

    /// Whether the aggregate counter equals the sum of the option counters.
    pub fn tally_is_consistent(&self) -> bool {
        self.vote_quantity == self.options.iter().map(|option| option.vote_quantity).sum::<i64>()
    }
}

/// A recorded vote as seen by API callers. The voter key it is stored under
/// never leaves the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "backend", derive(sqlx::FromRow))]
pub struct Vote {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub option_id: Uuid,
    pub vote_visibility: VoteVisibility,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CastVoteRequest {
    pub poll_id: Uuid,
    pub option_id: Uuid,
    pub vote_visibility: VoteVisibility,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreatePollOption {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreatePollRequest {
    pub title: String,
    pub options: Vec<CreatePollOption>,
}
