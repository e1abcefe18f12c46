pub mod error;
pub mod models;
pub mod pagination;
pub mod validation;
pub mod caller;

pub use error::{Error, ErrorCode, Result};
pub use models::*;
pub use pagination::{Page, PageQuery, PageRef, PageWindow};
pub use validation::*;
pub use caller::*;

#[cfg(test)]
mod tests;
