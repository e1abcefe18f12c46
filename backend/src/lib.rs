pub mod config;
pub mod engine;
pub mod processor;
pub mod routes;
pub mod store;
pub mod memory_store;
pub mod pg_store;
pub mod voter_key;
pub mod cors;
pub mod error;
pub mod utils;
pub mod rate_limiter;
pub mod catchers;
pub use shared::{models::*, error::{Error, ErrorCode}, caller::Caller};

use rocket::{catchers, routes, Build, Rocket};
use crate::{
    catchers::{bad_request, conflict, forbidden, internal_error, not_found, too_many_requests, unauthorized, unprocessable},
    cors::CORS,
    routes::{
        all_options, all_polls, cast_vote, create_poll, delete_poll, get_poll, list_polls, private_vote,
        private_votes, public_vote, public_votes, unvote, AppState,
    },
};

/// Assembles the API around an already constructed application state.
pub fn build_rocket(state: AppState, cors: CORS) -> Rocket<Build> {
    rocket::build()
        .attach(cors)
        .manage(state)
        .mount(
            "/api",
            routes![
                cast_vote,
                unvote,
                public_votes,
                public_vote,
                private_votes,
                private_vote,
                create_poll,
                all_polls,
                list_polls,
                get_poll,
                delete_poll,
                all_options
            ],
        )
        .register(
            "/",
            catchers![
                bad_request,
                unauthorized,
                forbidden,
                not_found,
                conflict,
                unprocessable,
                too_many_requests,
                internal_error
            ],
        )
}
