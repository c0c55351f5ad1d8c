//! Infrastructure layer: storage adapters and the services that run the stock
//! ledger on top of them.

pub mod catalog;
pub mod error;
pub mod ledger;
pub mod reporting;
pub mod store;


pub use catalog::Catalog;
pub use error::{LedgerError, LedgerResult, StoreError};
pub use ledger::{Ledger, LedgerWrite};
pub use reporting::{
    Dashboard, MAX_WINDOW_DAYS, MonthlySnapshot, ReportSettings, Reporting, XLSX_CONTENT_TYPE,
};
pub use store::{
    InMemoryLedgerStore, LedgerStore, PostgresLedgerStore, ProductQuery, StockTransaction,
};
