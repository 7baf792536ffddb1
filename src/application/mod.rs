pub mod catalog;
pub mod dependencies;
pub mod lending;
pub mod query;

pub use dependencies::{RetryPolicy, ServiceDependencies};
