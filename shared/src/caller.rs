use serde::{Serialize, Deserialize};

/// Header carrying the user id authenticated by the upstream session layer.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// The authenticated user behind a request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Caller {
    pub user_id: String,
}

impl Caller {
    pub fn from_header(user_id: Option<&str>) -> Option<Self> {
        let user_id = user_id.map(str::trim).filter(|id| !id.is_empty())?;
        Some(Self { user_id: user_id.to_string() })
    }
}

// Backend-specific Rocket implementation
#[cfg(feature = "backend")]
mod backend_impl {
    use super::*;
    use rocket::http::Status;
    use rocket::request::{FromRequest, Outcome};
    use rocket::Request;

    #[rocket::async_trait]
    impl<'r> FromRequest<'r> for Caller {
        type Error = ();

        async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
            match Caller::from_header(req.headers().get_one(USER_ID_HEADER)) {
                Some(caller) => Outcome::Success(caller),
                None => Outcome::Error((Status::Unauthorized, ())),
            }
        }
    }
}
