use std::sync::Arc;
use rocket::{State, delete, get, post, http::Status, serde::json::Json};
use tracing::{debug, instrument};
use shared::{caller::Caller, models::*, pagination::Page};
use crate::{
    config::AppConfig,
    engine::VotingEngine,
    error::ApiError,
    processor::PollProcessor,
    rate_limiter::RateLimiter,
    store::{PollStore, VoteStore},
    utils::parse_id,
    voter_key::VoterKeyHasher,
};

pub struct AppState {
    pub engine: VotingEngine,
    pub processor: PollProcessor,
    pub vote_limiter: RateLimiter,
}

impl AppState {
    pub fn new(polls: Arc<dyn PollStore>, votes: Arc<dyn VoteStore>, config: &AppConfig) -> Self {
        Self {
            engine: VotingEngine::new(
                polls.clone(),
                votes.clone(),
                VoterKeyHasher::new(&config.votes_secret),
                config.storage_timeout,
            ),
            processor: PollProcessor::new(polls, votes, config.storage_timeout),
            vote_limiter: RateLimiter::new(config.vote_rate_limit, config.vote_rate_window_minutes),
        }
    }
}

#[rocket::options("/<_..>")]
pub async fn all_options() -> Status {
    Status::Ok
}

#[instrument(skip(state, request, caller), fields(poll_id = %request.poll_id))]
#[post("/votes", format = "json", data = "<request>")]
pub async fn cast_vote(
    state: &State<AppState>,
    request: Json<CastVoteRequest>,
    caller: Caller,
) -> Result<(Status, Json<Vote>), ApiError> {
    let request = request.into_inner();
    let voter_key = state.engine.voter_key(&caller.user_id);
    state.vote_limiter.check(&format!("cast_vote:{voter_key}"))?;

    let vote = state.engine
        .cast_vote(request.poll_id, request.option_id, &caller.user_id, request.vote_visibility)
        .await?;

    debug!(vote_id = %vote.id, visibility = %vote.vote_visibility, "Vote recorded");
    Ok((Status::Created, Json(vote)))
}

#[instrument(skip(state, caller))]
#[delete("/votes/<poll_id>")]
pub async fn unvote(state: &State<AppState>, poll_id: &str, caller: Caller) -> Result<Json<Vote>, ApiError> {
    let poll_id = parse_id(poll_id)?;
    let vote = state.engine.unvote(&caller.user_id, poll_id).await?;
    debug!(vote_id = %vote.id, "Vote withdrawn");
    Ok(Json(vote))
}

#[get("/votes/public?<ids>&<page>&<limit>")]
pub async fn public_votes(
    state: &State<AppState>,
    ids: Option<&str>,
    page: Option<u32>,
    limit: Option<u32>,
) -> Result<Json<Page<Vote>>, ApiError> {
    state.processor.paginate_public_votes(ids, page, limit).await.map(Json)
}

#[get("/votes/public/<id>")]
pub async fn public_vote(state: &State<AppState>, id: &str) -> Result<Json<Vote>, ApiError> {
    let vote_id = parse_id(id)?;
    state.processor.find_public_vote(vote_id).await.map(Json)
}

#[get("/votes/private?<page>&<limit>")]
pub async fn private_votes(
    state: &State<AppState>,
    page: Option<u32>,
    limit: Option<u32>,
    caller: Caller,
) -> Result<Json<Page<Vote>>, ApiError> {
    let voter_key = state.engine.voter_key(&caller.user_id);
    state.processor.paginate_private_votes(&voter_key, page, limit).await.map(Json)
}

#[get("/votes/private/<id>")]
pub async fn private_vote(state: &State<AppState>, id: &str, caller: Caller) -> Result<Json<Vote>, ApiError> {
    let vote_id = parse_id(id)?;
    let voter_key = state.engine.voter_key(&caller.user_id);
    state.processor.find_private_vote(vote_id, &voter_key).await.map(Json)
}

#[instrument(skip(state, request, caller))]
#[post("/polls", format = "json", data = "<request>")]
pub async fn create_poll(
    state: &State<AppState>,
    request: Json<CreatePollRequest>,
    caller: Caller,
) -> Result<(Status, Json<Poll>), ApiError> {
    let poll = state.processor.create_poll(&request, &caller.user_id).await?;
    Ok((Status::Created, Json(poll)))
}

#[get("/polls/all?<page>&<limit>")]
pub async fn all_polls(
    state: &State<AppState>,
    page: Option<u32>,
    limit: Option<u32>,
) -> Result<Json<Page<Poll>>, ApiError> {
    state.processor.paginate_polls(page, limit).await.map(Json)
}

#[get("/polls?<ids>")]
pub async fn list_polls(state: &State<AppState>, ids: Option<&str>) -> Result<Json<Vec<Poll>>, ApiError> {
    state.processor.find_polls(ids).await.map(Json)
}

#[get("/polls/<id>")]
pub async fn get_poll(state: &State<AppState>, id: &str) -> Result<Json<Poll>, ApiError> {
    let poll_id = parse_id(id)?;
    state.processor.find_poll(poll_id).await.map(Json)
}

#[instrument(skip(state, caller))]
#[delete("/polls/<id>")]
pub async fn delete_poll(state: &State<AppState>, id: &str, caller: Caller) -> Result<Json<Poll>, ApiError> {
    let poll_id = parse_id(id)?;
    state.processor.delete_poll(poll_id, &caller.user_id).await.map(Json)
}
