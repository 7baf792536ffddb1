pub mod catalog_store;
pub mod ledger_store;
pub mod store_error;
pub mod unit_of_work;

pub use catalog_store::*;
pub use ledger_store::*;
pub use store_error::StoreError;
pub use unit_of_work::*;
