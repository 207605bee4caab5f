pub mod catalog;
pub mod company_queries;
pub mod holding_queries;
pub mod portfolio_queries;
pub mod snapshot_store;
