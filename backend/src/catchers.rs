use rocket::{Request, catch, serde::json::Json};
use shared::error::{Error, ErrorCode};

#[catch(400)]
pub fn bad_request(_req: &Request) -> Json<Error> {
    Json(Error::new(ErrorCode::InvalidInput, "Invalid request parameters."))
}

#[catch(401)]
pub fn unauthorized(_req: &Request) -> Json<Error> {
    Json(Error::new(ErrorCode::Unauthorized, "You must be signed in to do that."))
}

#[catch(403)]
pub fn forbidden(_req: &Request) -> Json<Error> {
    Json(Error::new(ErrorCode::Forbidden, "You are not allowed to access this resource."))
}

#[catch(404)]
pub fn not_found(_req: &Request) -> Json<Error> {
    Json(Error::new(ErrorCode::NotFound, "The requested resource was not found."))
}

#[catch(409)]
pub fn conflict(_req: &Request) -> Json<Error> {
    Json(Error::new(ErrorCode::Conflict, "The request conflicts with the current state."))
}

#[catch(422)]
pub fn unprocessable(req: &Request) -> Json<Error> {
    let message = match req.uri().path().segments().last() {
        Some("votes") => "Expected pollId, optionId and voteVisibility (public or private).",
        Some("polls") => "Expected a title and a list of options with content only.",
        _ => "The request body could not be parsed.",
    };
    Json(Error::new(ErrorCode::InvalidInput, message))
}

#[catch(429)]
pub fn too_many_requests(_req: &Request) -> Json<Error> {
    Json(Error::new(ErrorCode::RateLimited, "Rate limit exceeded. Please wait before trying again."))
}

#[catch(500)]
pub fn internal_error(_req: &Request) -> Json<Error> {
    Json(Error::new(ErrorCode::SystemError, "An internal server error occurred."))
}
