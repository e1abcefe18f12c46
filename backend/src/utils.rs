use crate::error::ApiError;
use uuid::Uuid;

pub fn parse_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::InvalidId(id.to_string()))
}
