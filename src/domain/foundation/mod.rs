//! Foundation types shared across the domain.

mod errors;
mod ids;
mod timestamp;

pub use errors::{StoreError, ValidationError};
pub use ids::UserId;
pub use timestamp::Timestamp;
