mod coordinator;
mod errors;

pub use coordinator::{issue_book, return_book, withdraw_book};
pub use errors::{LendingError, Result};
