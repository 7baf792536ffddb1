pub mod catalog_store;
pub mod ledger_store;
mod rows;
pub mod unit_of_work;

// パブリックに型を再エクスポート
pub use catalog_store::CatalogStore as PostgresCatalogStore;
pub use ledger_store::LedgerStore as PostgresLedgerStore;
pub use unit_of_work::UnitOfWork as PostgresUnitOfWork;
