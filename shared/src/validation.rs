use std::collections::HashSet;
use uuid::Uuid;
use crate::models::CreatePollRequest;

pub const MAX_TITLE_LENGTH: usize = 50;
pub const MAX_OPTION_LENGTH: usize = 50;
pub const MIN_OPTIONS: usize = 1;
pub const MAX_OPTIONS: usize = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;
pub const MAX_IDS_PER_QUERY: usize = 100;

const ALLOWED_SYMBOLS: &str = " @#$%^&*()_+-=;:,.?";
const ALLOWED_ACCENTS: &str = "áàâãéèêíïóôõöúçñÁÀÂÃÉÈÊÍÏÓÒÖÚÇÑ";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Title must be between 1 and {MAX_TITLE_LENGTH} characters")]
    InvalidTitleLength,
    #[error("Title contains unsupported characters")]
    InvalidTitleCharacters,
    #[error("Too few options (minimum {MIN_OPTIONS})")]
    TooFewOptions,
    #[error("Too many options (maximum {MAX_OPTIONS})")]
    TooManyOptions,
    #[error("Option text must be between 1 and {MAX_OPTION_LENGTH} characters")]
    InvalidOptionLength,
    #[error("Option contains unsupported characters: {0}")]
    InvalidOptionCharacters(String),
    #[error("Duplicate option: {0}")]
    DuplicateOption(String),
    #[error("You must provide at least one ID")]
    MissingIds,
    #[error("You cannot query more than {MAX_IDS_PER_QUERY} IDs at once")]
    TooManyIds,
    #[error("Invalid ID: {0}")]
    InvalidId(String),
}

fn allowed_text(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii_alphanumeric() || ALLOWED_SYMBOLS.contains(c) || ALLOWED_ACCENTS.contains(c))
}

fn within_length(text: &str, max: usize) -> bool {
    let length = text.chars().count();
    length >= 1 && length <= max
}

pub fn validate_poll_request(request: &CreatePollRequest) -> Result<(), ValidationError> {
    if !within_length(&request.title, MAX_TITLE_LENGTH) { return Err(ValidationError::InvalidTitleLength); }
    if !allowed_text(&request.title) { return Err(ValidationError::InvalidTitleCharacters); }
    if request.options.len() < MIN_OPTIONS { return Err(ValidationError::TooFewOptions); }
    if request.options.len() > MAX_OPTIONS { return Err(ValidationError::TooManyOptions); }

    let mut seen = HashSet::with_capacity(request.options.len());
    for option in &request.options {
        if !within_length(&option.content, MAX_OPTION_LENGTH) {
            return Err(ValidationError::InvalidOptionLength);
        }
        if !allowed_text(&option.content) {
            return Err(ValidationError::InvalidOptionCharacters(option.content.clone()));
        }
        if !seen.insert(option.content.to_lowercase()) {
            return Err(ValidationError::DuplicateOption(option.content.clone()));
        }
    }

    Ok(())
}

/// Parses a comma separated `?ids=` query value.
pub fn parse_id_list(ids: Option<&str>) -> Result<Vec<Uuid>, ValidationError> {
    let raw = ids.map(str::trim).filter(|ids| !ids.is_empty()).ok_or(ValidationError::MissingIds)?;
    let parts: Vec<&str> = raw.split(',').map(str::trim).filter(|id| !id.is_empty()).collect();

    if parts.is_empty() { return Err(ValidationError::MissingIds); }
    if parts.len() > MAX_IDS_PER_QUERY { return Err(ValidationError::TooManyIds); }

    parts.into_iter()
        .map(|id| Uuid::parse_str(id).map_err(|_| ValidationError::InvalidId(id.to_string())))
        .collect()
}
