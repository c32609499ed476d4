//! Shared types and result types for the database layer

pub mod errors;

pub use errors::{DatabaseError, MessagingError};

pub type DatabaseResult<T> = Result<T, DatabaseError>;
pub type MessagingResult<T> = Result<T, MessagingError>;
