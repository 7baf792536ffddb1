pub mod caller;
pub mod error;
pub mod handlers;
pub mod router;
pub mod types;

pub use caller::{Caller, Role};
pub use error::ApiError;
pub use router::create_router;
pub use types::*;
